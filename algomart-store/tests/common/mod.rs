//! Shared test helpers for the SQLite trial store tests.

#![allow(dead_code)]

use algomart_types::{ProductId, Trial, TrialId, TrialStatus, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// Parses a fixed RFC 3339 instant; panics on bad input (test-only).
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Builds a trial starting at `start` and running `days` days.
pub fn make_trial(user: UserId, product: ProductId, start: DateTime<Utc>, days: i64) -> Trial {
    Trial {
        id: TrialId::new(),
        user_id: user,
        product_id: product,
        start_at: start,
        end_at: start + Duration::days(days),
        status: TrialStatus::Active,
        reminders_sent: BTreeSet::new(),
    }
}
