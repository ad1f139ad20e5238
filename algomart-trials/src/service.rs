//! Request-facing trial operations: start, status check, conversion.

use crate::catalog::{ProductCatalog, SubscriptionSource};
use crate::config::TrialConfig;
use crate::error::{DenyReason, RepositoryError, TrialError, TrialResult};
use crate::guard::AntiAbuseGuard;
use crate::lifecycle;
use crate::notify::{NotificationGateway, NotificationTemplate};
use crate::repository::TrialRepository;
use algomart_types::{ProductId, TrialId, TrialStatus, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confirmation returned to the routing layer after a trial starts.
#[derive(Debug, Clone, Serialize)]
pub struct TrialReceipt {
    /// Identifier of the created trial.
    pub trial_id: TrialId,
    /// Grant start.
    pub start_at: DateTime<Utc>,
    /// Grant end (exclusive).
    pub end_at: DateTime<Utc>,
}

/// Answer to a status-check request, derived from the clock.
#[derive(Debug, Clone, Serialize)]
pub struct TrialStatusView {
    /// Whether the trial is usable right now.
    pub is_active: bool,
    /// Whole days of access remaining, partial days rounded up.
    pub days_remaining: u32,
    /// Effective status at the evaluation instant.
    pub status: TrialStatus,
}

/// The synchronous, request-scoped entry points into the engine.
///
/// Constructed once at startup from explicitly injected collaborators;
/// nothing here is a process-wide singleton. Every operation has an
/// `*_at(now)` variant so tests can evaluate at arbitrary instants; the
/// plain variants read the wall clock.
pub struct TrialService {
    repo: Arc<dyn TrialRepository>,
    guard: AntiAbuseGuard,
    gateway: Arc<dyn NotificationGateway>,
}

impl TrialService {
    /// Wires a service from its collaborators.
    pub fn new(
        repo: Arc<dyn TrialRepository>,
        catalog: Arc<dyn ProductCatalog>,
        subscriptions: Arc<dyn SubscriptionSource>,
        gateway: Arc<dyn NotificationGateway>,
        config: &TrialConfig,
    ) -> Self {
        let guard = AntiAbuseGuard::new(Arc::clone(&repo), catalog, subscriptions, config);
        Self {
            repo,
            guard,
            gateway,
        }
    }

    /// Starts a trial for `user_id` on `product_id`, evaluated at the
    /// current time. See [`start_trial_at`](Self::start_trial_at).
    pub async fn start_trial(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        origin: &str,
    ) -> TrialResult<TrialReceipt> {
        self.start_trial_at(user_id, product_id, origin, Utc::now())
            .await
    }

    /// Starts a trial, evaluated at `now`.
    ///
    /// Flow: guard authorization, trial creation, persist, then a
    /// best-effort welcome notification. The welcome is attempted at most
    /// once — a failed send is logged and never retried, and never rolls
    /// back the created trial.
    pub async fn start_trial_at(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        origin: &str,
        now: DateTime<Utc>,
    ) -> TrialResult<TrialReceipt> {
        let product = self.guard.authorize(user_id, product_id, origin, now)?;
        let trial = lifecycle::start(*user_id, *product_id, product.trial_duration_days, now);

        match self.repo.insert(&trial) {
            Ok(()) => {}
            // the blocking row may be a ran-out trial the sweeper has not
            // corrected yet; fold its expiry into storage and retry once
            Err(RepositoryError::DuplicateActive) => {
                if !self.expire_stale_blocker(user_id, product_id, now)? {
                    return Err(TrialError::Denied(DenyReason::AlreadyActive));
                }
                match self.repo.insert(&trial) {
                    Ok(()) => {}
                    // lost the check-then-create race to a genuinely live trial
                    Err(RepositoryError::DuplicateActive) => {
                        return Err(TrialError::Denied(DenyReason::AlreadyActive));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }

        let context = serde_json::json!({
            "product_id": product_id.to_string(),
            "trial_ends_at": trial.end_at.to_rfc3339(),
            "trial_duration_days": product.trial_duration_days,
        });
        if let Err(e) = self
            .gateway
            .send(user_id, NotificationTemplate::TrialStarted, &context)
            .await
        {
            warn!("trial-started notification failed for user {user_id}: {e}");
        }

        info!(
            "trial {} started for user {user_id} on product {product_id}, ends {}",
            trial.id, trial.end_at
        );
        Ok(TrialReceipt {
            trial_id: trial.id,
            start_at: trial.start_at,
            end_at: trial.end_at,
        })
    }

    /// Expires the stored-active trial blocking an insert for the pair, if
    /// its effective status says it has already run out. Returns whether the
    /// insert is worth retrying.
    fn expire_stale_blocker(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> TrialResult<bool> {
        let Some(blocker) = self.repo.find_for_user_product(user_id, product_id)? else {
            return Ok(false);
        };
        if !blocker.stored_active()
            || lifecycle::effective_status(&blocker, now) != TrialStatus::Expired
        {
            return Ok(false);
        }
        match self
            .repo
            .set_status(&blocker.id, TrialStatus::Active, TrialStatus::Expired)
        {
            Ok(()) => {
                debug!("expired stale trial {} ahead of a restart for user {user_id}", blocker.id);
                Ok(true)
            }
            // a sweep or conversion got there first; the pair may be free now
            Err(RepositoryError::Conflict | RepositoryError::NotFound) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Reports the user's trial status for a product at the current time.
    pub fn status(&self, user_id: &UserId, product_id: &ProductId) -> TrialResult<TrialStatusView> {
        self.status_at(user_id, product_id, Utc::now())
    }

    /// Reports the user's trial status for a product, evaluated at `now`.
    ///
    /// The answer is derived from timestamps, never read from the cached
    /// status column, so it is correct even before the sweeper catches up.
    pub fn status_at(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> TrialResult<TrialStatusView> {
        let trial = self
            .repo
            .find_for_user_product(user_id, product_id)?
            .ok_or(TrialError::NotFound)?;
        let status = lifecycle::effective_status(&trial, now);
        Ok(TrialStatusView {
            is_active: status == TrialStatus::Active,
            days_remaining: lifecycle::days_remaining(&trial, now),
            status,
        })
    }

    /// Converts a trial after a completed purchase, evaluated at the
    /// current time. See [`convert_at`](Self::convert_at).
    pub fn convert(&self, trial_id: &TrialId) -> TrialResult<()> {
        self.convert_at(trial_id, Utc::now())
    }

    /// Converts a trial after a completed purchase, evaluated at `now`.
    ///
    /// Legal only while the trial is effectively active. The write is a
    /// compare-and-swap against the stored `active` status; losing that
    /// race (typically to the sweeper) surfaces as
    /// [`TrialError::TransitionConflict`] carrying the status that won, so
    /// the purchase collaborator can report "trial no longer active" rather
    /// than a generic failure.
    pub fn convert_at(&self, trial_id: &TrialId, now: DateTime<Utc>) -> TrialResult<()> {
        let trial = self.repo.find(trial_id)?.ok_or(TrialError::NotFound)?;
        let converted = lifecycle::convert(&trial, now)?;

        match self
            .repo
            .set_status(trial_id, TrialStatus::Active, converted.status)
        {
            Ok(()) => {
                info!("trial {trial_id} converted for user {}", trial.user_id);
                Ok(())
            }
            Err(RepositoryError::Conflict) => {
                let current = self
                    .repo
                    .find(trial_id)?
                    .map(|t| t.status)
                    .unwrap_or(TrialStatus::Expired);
                debug!("conversion of trial {trial_id} lost to a concurrent {current} transition");
                Err(TrialError::TransitionConflict { current })
            }
            Err(RepositoryError::NotFound) => Err(TrialError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}
