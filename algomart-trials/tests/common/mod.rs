//! Shared test helpers for the trial engine tests.

#![allow(dead_code)]

use algomart_trials::{
    MemoryTrialRepository, NotificationGateway, NotificationTemplate, NotifyError, NotifyResult,
    ProductCatalog, SubscriptionSource, TrialConfig, TrialService,
};
use algomart_types::{ProductId, ProductInfo, Trial, TrialId, TrialStatus, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Installs a fmt subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

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

/// Catalog backed by a fixed map.
#[derive(Default)]
pub struct StaticCatalog {
    products: HashMap<ProductId, ProductInfo>,
}

impl StaticCatalog {
    pub fn with(products: Vec<ProductInfo>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// One trial-eligible product with the given duration.
    pub fn single(duration_days: u32) -> (Self, ProductId) {
        let id = ProductId::new();
        let catalog = Self::with(vec![ProductInfo {
            id,
            trial_duration_days: duration_days,
            trial_eligible: true,
        }]);
        (catalog, id)
    }
}

impl ProductCatalog for StaticCatalog {
    fn product(&self, id: &ProductId) -> Option<ProductInfo> {
        self.products.get(id).cloned()
    }
}

/// Subscription source backed by a fixed set of (user, product) grants.
#[derive(Default)]
pub struct StaticSubscriptions {
    grants: HashSet<(UserId, ProductId)>,
}

impl StaticSubscriptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(grants: Vec<(UserId, ProductId)>) -> Self {
        Self {
            grants: grants.into_iter().collect(),
        }
    }
}

impl SubscriptionSource for StaticSubscriptions {
    fn has_active_subscription(&self, user_id: &UserId, product_id: &ProductId) -> bool {
        self.grants.contains(&(*user_id, *product_id))
    }
}

/// One captured outbound notification.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub user_id: UserId,
    pub template: NotificationTemplate,
    pub context: serde_json::Value,
}

/// Gateway that records every send and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent send fail (until cleared).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn count_of(&self, template: NotificationTemplate) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.template == template)
            .count()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(
        &self,
        user_id: &UserId,
        template: NotificationTemplate,
        context: &serde_json::Value,
    ) -> NotifyResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Send("injected failure".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            user_id: *user_id,
            template,
            context: context.clone(),
        });
        Ok(())
    }
}

/// A fully wired service over a memory repository and one eligible product.
pub struct ServiceFixture {
    pub service: TrialService,
    pub repo: Arc<MemoryTrialRepository>,
    pub gateway: Arc<RecordingGateway>,
    pub product_id: ProductId,
}

impl ServiceFixture {
    pub fn new(duration_days: u32) -> Self {
        Self::with_config(duration_days, TrialConfig::default())
    }

    pub fn with_config(duration_days: u32, config: TrialConfig) -> Self {
        let repo = Arc::new(MemoryTrialRepository::new());
        let (catalog, product_id) = StaticCatalog::single(duration_days);
        let gateway = RecordingGateway::new();
        let service = TrialService::new(
            Arc::clone(&repo) as Arc<dyn algomart_trials::TrialRepository>,
            Arc::new(catalog),
            Arc::new(StaticSubscriptions::none()),
            Arc::clone(&gateway) as Arc<dyn NotificationGateway>,
            &config,
        );
        Self {
            service,
            repo,
            gateway,
            product_id,
        }
    }
}
