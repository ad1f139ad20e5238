//! Periodic reconciliation of stored trial status against the clock.

use crate::config::TrialConfig;
use crate::error::TrialResult;
use crate::lifecycle;
use crate::repository::TrialRepository;
use algomart_types::{TrialId, TrialStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stored-active trials examined.
    pub scanned: usize,
    /// Trials whose stored status was corrected to `Expired`.
    pub expired: usize,
}

/// Corrects stored trial status for trials whose time has run out.
///
/// The sweeper never decides expiry itself — it asks
/// [`lifecycle::effective_status`] and folds the answer back into storage
/// through conditional updates. Because every write only touches rows still
/// stored `active`, a conversion that lands between the scan and the update
/// simply wins; the sweeper skips it without error. Re-running immediately
/// after a complete run changes nothing.
pub struct ExpirationSweeper {
    repo: Arc<dyn TrialRepository>,
    batch_size: usize,
}

impl ExpirationSweeper {
    /// Creates a sweeper over the given repository.
    pub fn new(repo: Arc<dyn TrialRepository>, config: &TrialConfig) -> Self {
        Self {
            repo,
            batch_size: config.sweep_batch_size.max(1),
        }
    }

    /// Runs one sweep evaluated at `now`. Sends no notifications.
    ///
    /// A batch that fails to persist is logged and skipped; the run
    /// continues with the remaining batches rather than aborting.
    pub fn run_once(&self, now: DateTime<Utc>) -> TrialResult<SweepReport> {
        let active = self.repo.find_active()?;
        let scanned = active.len();

        let due: Vec<TrialId> = active
            .iter()
            .filter(|t| lifecycle::effective_status(t, now) == TrialStatus::Expired)
            .map(|t| t.id)
            .collect();

        let mut expired = 0;
        for batch in due.chunks(self.batch_size) {
            match self.repo.mark_expired(batch) {
                Ok(n) => expired += n,
                Err(e) => warn!("expiration batch of {} trials failed: {e}", batch.len()),
            }
        }

        if expired > 0 {
            info!("sweep corrected {expired} of {scanned} stored-active trials");
        } else {
            debug!("sweep found nothing to correct ({scanned} stored-active trials)");
        }
        Ok(SweepReport { scanned, expired })
    }
}
