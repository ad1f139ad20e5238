//! Error types for the trial engine.

use algomart_types::TrialStatus;
use std::fmt;
use thiserror::Error;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced by a [`crate::TrialRepository`] implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// An active trial already exists for the `(user, product)` pair.
    /// Raised by the storage-level uniqueness constraint.
    #[error("an active trial already exists for this user and product")]
    DuplicateActive,

    /// No trial with the given id.
    #[error("trial not found")]
    NotFound,

    /// A conditional status update found a different stored status.
    /// The caller lost a race against another transition.
    #[error("stored status changed concurrently")]
    Conflict,

    /// The backing store failed. Retryable infrastructure error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for engine operations.
pub type TrialResult<T> = Result<T, TrialError>;

/// Why the anti-abuse guard denied a trial-start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The product does not offer a trial.
    NotEligible,
    /// An active trial already exists for this user and product.
    AlreadyActive,
    /// The user already holds an active paid grant for this product.
    AlreadySubscribed,
    /// Too many trial-start attempts from this origin within the window.
    RateLimited,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotEligible => "product is not eligible for a trial",
            Self::AlreadyActive => "an active trial already exists",
            Self::AlreadySubscribed => "an active subscription already exists",
            Self::RateLimited => "too many trial attempts, try again later",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in trial lifecycle operations.
#[derive(Debug, Error)]
pub enum TrialError {
    /// The trial-start request was rejected. Not retried.
    #[error("trial request denied: {0}")]
    Denied(DenyReason),

    /// The requested transition is illegal for the trial's effective status.
    #[error("invalid transition: trial is {from}")]
    InvalidTransition {
        /// Effective status at evaluation time.
        from: TrialStatus,
    },

    /// The transition lost a race against a concurrent status change.
    /// `current` is the status that won.
    #[error("transition conflict: trial is no longer active (now {current})")]
    TransitionConflict {
        /// The stored status after the losing write was rejected.
        current: TrialStatus,
    },

    /// No trial exists for the requested user/product or id.
    #[error("no matching trial")]
    NotFound,

    /// Persistence failure; retryable.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
