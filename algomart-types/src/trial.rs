//! The trial record and its status enumeration.

use crate::ids::{ProductId, TrialId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The lifecycle status of a trial.
///
/// The stored value is a cache: the authoritative answer to "is this trial
/// usable right now" is always derived from `end_at` and the current time
/// (see `algomart_trials::lifecycle::effective_status`). `Expired` and
/// `Converted` are terminal; nothing ever returns to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    /// The trial grants access (subject to time-based re-derivation).
    Active,
    /// The trial ran out without a purchase.
    Expired,
    /// The user purchased the product while the trial was active.
    Converted,
}

impl TrialStatus {
    /// Returns the exact persisted string for this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Converted => "converted",
        }
    }

    /// Returns true if no further transition is possible out of this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Converted)
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "converted" => Ok(Self::Converted),
            other => Err(format!("unknown trial status: {other}")),
        }
    }
}

/// One user's time-boxed access grant to one product.
///
/// Invariants:
/// - `end_at > start_at`
/// - at most one `Active` trial exists per `(user_id, product_id)` pair,
///   enforced by the storage layer
/// - `reminders_sent` only grows; a recorded threshold is never re-notified
///
/// Trials are never deleted; terminated trials remain as audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    /// Unique identifier.
    pub id: TrialId,
    /// The owning account.
    pub user_id: UserId,
    /// The granted product.
    pub product_id: ProductId,
    /// When the grant began.
    pub start_at: DateTime<Utc>,
    /// When the grant ends (exclusive: the trial is expired at this instant).
    pub end_at: DateTime<Utc>,
    /// Cached status; reconciled against the clock by the sweeper.
    pub status: TrialStatus,
    /// Days-remaining thresholds already notified.
    pub reminders_sent: BTreeSet<u32>,
}

impl Trial {
    /// Returns true if the stored (cached) status is `Active`.
    ///
    /// This does not consult the clock; callers deciding whether the trial
    /// is usable right now must derive the effective status instead.
    #[must_use]
    pub fn stored_active(&self) -> bool {
        self.status == TrialStatus::Active
    }
}
