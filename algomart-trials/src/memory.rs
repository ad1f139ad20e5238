//! In-memory trial repository.
//!
//! Reference implementation of [`TrialRepository`] semantics, used by the
//! engine's own tests and by hosts that want an isolated instance without a
//! database file. Enforces the same uniqueness and compare-and-swap rules as
//! the SQLite store.

use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::TrialRepository;
use algomart_types::{ProductId, Trial, TrialId, TrialStatus, UserId};
use std::collections::HashMap;
use std::sync::Mutex;

/// HashMap-backed repository guarded by a single mutex.
#[derive(Default)]
pub struct MemoryTrialRepository {
    trials: Mutex<HashMap<TrialId, Trial>>,
}

impl MemoryTrialRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trials held (all statuses).
    #[must_use]
    pub fn len(&self) -> usize {
        self.trials.lock().unwrap().len()
    }

    /// Returns true if no trials are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrialRepository for MemoryTrialRepository {
    fn insert(&self, trial: &Trial) -> RepositoryResult<()> {
        let mut trials = self.trials.lock().unwrap();
        let duplicate = trials.values().any(|t| {
            t.user_id == trial.user_id
                && t.product_id == trial.product_id
                && t.status == TrialStatus::Active
        });
        if duplicate {
            return Err(RepositoryError::DuplicateActive);
        }
        trials.insert(trial.id, trial.clone());
        Ok(())
    }

    fn find(&self, id: &TrialId) -> RepositoryResult<Option<Trial>> {
        Ok(self.trials.lock().unwrap().get(id).cloned())
    }

    fn find_for_user_product(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> RepositoryResult<Option<Trial>> {
        let trials = self.trials.lock().unwrap();
        let mut matches: Vec<&Trial> = trials
            .values()
            .filter(|t| t.user_id == *user_id && t.product_id == *product_id)
            .collect();
        // active first, then most recent start
        matches.sort_by_key(|t| (t.status != TrialStatus::Active, std::cmp::Reverse(t.start_at)));
        Ok(matches.first().map(|t| (*t).clone()))
    }

    fn find_active(&self) -> RepositoryResult<Vec<Trial>> {
        let trials = self.trials.lock().unwrap();
        Ok(trials
            .values()
            .filter(|t| t.status == TrialStatus::Active)
            .cloned()
            .collect())
    }

    fn mark_expired(&self, ids: &[TrialId]) -> RepositoryResult<usize> {
        let mut trials = self.trials.lock().unwrap();
        let mut changed = 0;
        for id in ids {
            if let Some(trial) = trials.get_mut(id) {
                if trial.status == TrialStatus::Active {
                    trial.status = TrialStatus::Expired;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn set_status(
        &self,
        id: &TrialId,
        from: TrialStatus,
        to: TrialStatus,
    ) -> RepositoryResult<()> {
        let mut trials = self.trials.lock().unwrap();
        let trial = trials.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if trial.status != from {
            return Err(RepositoryError::Conflict);
        }
        trial.status = to;
        Ok(())
    }

    fn record_reminder(&self, id: &TrialId, threshold: u32) -> RepositoryResult<bool> {
        let mut trials = self.trials.lock().unwrap();
        let trial = trials.get_mut(id).ok_or(RepositoryError::NotFound)?;
        Ok(trial.reminders_sent.insert(threshold))
    }
}
