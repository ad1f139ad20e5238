//! Pure lifecycle rules — no I/O, no side effects.
//!
//! The stored status on a [`Trial`] is only a cache. Every caller that needs
//! to know whether a trial is usable *right now* goes through
//! [`effective_status`]; nothing else in the workspace re-implements the
//! date comparison. The sweeper folds the derived value back into storage,
//! but the derivation itself lives here and only here.

use crate::error::{TrialError, TrialResult};
use algomart_types::{ProductId, Trial, TrialId, TrialStatus, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Derives the authoritative status of a trial at `now`.
///
/// `Converted` is terminal and returned as stored (it is not time-derived).
/// Otherwise the trial is `Expired` iff `now >= end_at`, else `Active`.
/// Idempotent and monotonic: once a trial derives `Expired` it derives
/// `Expired` for every later instant.
#[must_use]
pub fn effective_status(trial: &Trial, now: DateTime<Utc>) -> TrialStatus {
    if trial.status == TrialStatus::Converted {
        return TrialStatus::Converted;
    }
    if now >= trial.end_at {
        TrialStatus::Expired
    } else {
        TrialStatus::Active
    }
}

/// Whole days of access remaining at `now`, rounding partial days up.
///
/// Any remainder counts as a full day, down to the millisecond: a trial
/// with time left reports at least 1, never 0; 0 means `now >= end_at`.
#[must_use]
pub fn days_remaining(trial: &Trial, now: DateTime<Utc>) -> u32 {
    let millis = (trial.end_at - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    ((millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY) as u32
}

/// Creates a new trial starting at `now` and running `trial_duration_days`.
#[must_use]
pub fn start(
    user_id: UserId,
    product_id: ProductId,
    trial_duration_days: u32,
    now: DateTime<Utc>,
) -> Trial {
    Trial {
        id: TrialId::new(),
        user_id,
        product_id,
        start_at: now,
        end_at: now + Duration::days(i64::from(trial_duration_days)),
        status: TrialStatus::Active,
        reminders_sent: BTreeSet::new(),
    }
}

/// Returns a converted copy of the trial.
///
/// Legal only while the trial is effectively active: converting a trial that
/// has already run out (even if the sweeper has not caught up with it) fails
/// with [`TrialError::InvalidTransition`].
pub fn convert(trial: &Trial, now: DateTime<Utc>) -> TrialResult<Trial> {
    match effective_status(trial, now) {
        TrialStatus::Active => Ok(Trial {
            status: TrialStatus::Converted,
            ..trial.clone()
        }),
        from => Err(TrialError::InvalidTransition { from }),
    }
}
