//! The persistence seam for trial records.

use crate::error::RepositoryResult;
use algomart_types::{ProductId, Trial, TrialId, TrialStatus, UserId};

/// Persistence-agnostic access to trial records.
///
/// Implementations must uphold two guarantees the engine builds on:
///
/// - **Uniqueness**: [`insert`](Self::insert) fails with
///   `RepositoryError::DuplicateActive` when an active trial already exists
///   for the `(user, product)` pair. This is the real duplicate protection;
///   the guard's read-then-check is only a fast-fail optimization.
/// - **Conditional writes**: status mutations are compare-and-swap, keyed by
///   trial id and expected prior status, never blind overwrites of a record
///   read earlier. This is what lets the sweeper run concurrently with live
///   conversions without any subsystem-wide lock.
///
/// Trials are never deleted; terminated trials remain as audit records.
pub trait TrialRepository: Send + Sync {
    /// Persists a new trial.
    fn insert(&self, trial: &Trial) -> RepositoryResult<()>;

    /// Looks up a trial by id.
    fn find(&self, id: &TrialId) -> RepositoryResult<Option<Trial>>;

    /// Returns the user's trial for a product: the active one if it exists,
    /// otherwise the most recently started.
    fn find_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> RepositoryResult<Option<Trial>>;

    /// Returns every trial whose *stored* status is `Active`.
    fn find_active(&self) -> RepositoryResult<Vec<Trial>>;

    /// Bulk-corrects stored status to `Expired` for the given ids, touching
    /// only rows whose stored status is still `Active`. Returns the number
    /// of rows changed; ids that lost a race to a conversion are skipped,
    /// not failed.
    fn mark_expired(&self, ids: &[TrialId]) -> RepositoryResult<usize>;

    /// Compare-and-swap on the stored status. Fails with
    /// `RepositoryError::Conflict` when the stored status no longer equals
    /// `from`, and `RepositoryError::NotFound` when the id is unknown.
    fn set_status(
        &self,
        id: &TrialId,
        from: TrialStatus,
        to: TrialStatus,
    ) -> RepositoryResult<()>;

    /// Records a reminder threshold as sent. Returns `true` if the threshold
    /// was newly recorded, `false` if it was already present (no-op).
    fn record_reminder(&self, id: &TrialId, threshold: u32) -> RepositoryResult<bool>;
}
