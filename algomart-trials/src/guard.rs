//! Anti-abuse checks applied before a trial is created.

use crate::catalog::{ProductCatalog, SubscriptionSource};
use crate::config::TrialConfig;
use crate::error::{DenyReason, TrialError, TrialResult};
use crate::lifecycle;
use crate::repository::TrialRepository;
use algomart_types::{ProductId, ProductInfo, TrialStatus, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Sliding-window counter keyed by request origin.
///
/// Every evaluation registers an attempt — that is the limiter's only side
/// effect. Entries older than the window are pruned on each evaluation, so
/// the map stays bounded by recent traffic.
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_attempts` per origin per window.
    #[must_use]
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window: Duration::seconds(window_secs as i64),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an attempt at `now` and returns whether the origin is
    /// still within its budget (the registered attempt included).
    pub fn register(&self, origin: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut attempts = self.attempts.lock().unwrap();
        attempts.retain(|_, times| {
            while times.front().is_some_and(|t| *t <= cutoff) {
                times.pop_front();
            }
            !times.is_empty()
        });
        let entry = attempts.entry(origin.to_string()).or_default();
        entry.push_back(now);
        entry.len() <= self.max_attempts
    }
}

/// Validates a trial-start request against rate limits, catalog eligibility,
/// and existing grants.
///
/// The duplicate-active check here is advisory — it exists to fail early
/// with a precise reason. The storage-level uniqueness constraint remains
/// the actual protection when two requests race past this check.
pub struct AntiAbuseGuard {
    repo: Arc<dyn TrialRepository>,
    catalog: Arc<dyn ProductCatalog>,
    subscriptions: Arc<dyn SubscriptionSource>,
    limiter: RateLimiter,
}

impl AntiAbuseGuard {
    /// Creates a guard over the given collaborators.
    pub fn new(
        repo: Arc<dyn TrialRepository>,
        catalog: Arc<dyn ProductCatalog>,
        subscriptions: Arc<dyn SubscriptionSource>,
        config: &TrialConfig,
    ) -> Self {
        Self {
            repo,
            catalog,
            subscriptions,
            limiter: RateLimiter::new(
                config.rate_limit_max_attempts,
                config.rate_limit_window_secs,
            ),
        }
    }

    /// Authorizes a trial-start request, returning the product summary the
    /// trial will be built from, or a typed denial.
    ///
    /// The rate limit is evaluated first and counts every request from the
    /// origin, whatever product or identity it names.
    pub fn authorize(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        origin: &str,
        now: DateTime<Utc>,
    ) -> TrialResult<ProductInfo> {
        if !self.limiter.register(origin, now) {
            return Err(TrialError::Denied(DenyReason::RateLimited));
        }

        let Some(product) = self.catalog.product(product_id) else {
            return Err(TrialError::Denied(DenyReason::NotEligible));
        };
        if !product.trial_eligible || product.trial_duration_days == 0 {
            return Err(TrialError::Denied(DenyReason::NotEligible));
        }

        if let Some(existing) = self.repo.find_for_user_product(user_id, product_id)? {
            if lifecycle::effective_status(&existing, now) == TrialStatus::Active {
                return Err(TrialError::Denied(DenyReason::AlreadyActive));
            }
        }

        if self.subscriptions.has_active_subscription(user_id, product_id) {
            return Err(TrialError::Denied(DenyReason::AlreadySubscribed));
        }

        Ok(product)
    }
}
