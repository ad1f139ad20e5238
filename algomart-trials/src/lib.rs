//! Trial lifecycle engine for the AlgoMart storefront.
//!
//! Everything about a free trial's life happens here: creation after
//! anti-abuse checks, authoritative status derivation from wall-clock time,
//! periodic bulk expiration, and threshold-based reminders. Routing,
//! persistence technology, checkout, and message transport stay outside,
//! behind traits.
//!
//! # Components
//!
//! - **lifecycle**: pure rules — derive effective status, days remaining,
//!   create, convert. The stored status is a cache; this module is the
//!   single source of truth for "usable right now".
//! - **[`AntiAbuseGuard`]**: eligibility, duplicate, subscription, and
//!   sliding-window rate-limit checks before a trial is created.
//! - **[`TrialService`]**: the request-facing operations (start trial,
//!   status check, purchase conversion).
//! - **[`ExpirationSweeper`]**: reconciles stored status against the clock
//!   in idempotent, conditionally-written batches.
//! - **[`ReminderDispatcher`]**: at-least-once reminders, at-most-once per
//!   threshold per trial.
//! - **[`MaintenanceScheduler`]**: fixed-interval background driver with
//!   graceful stop; tests call `run_once` instead.
//!
//! # Example
//!
//! ```
//! use algomart_trials::{MemoryTrialRepository, TrialConfig, ExpirationSweeper};
//! use std::sync::Arc;
//!
//! let repo = Arc::new(MemoryTrialRepository::new());
//! let config = TrialConfig::default();
//! let sweeper = ExpirationSweeper::new(repo, &config);
//! let report = sweeper.run_once(chrono::Utc::now()).unwrap();
//! assert_eq!(report.scanned, 0);
//! ```

pub mod catalog;
mod config;
mod error;
mod guard;
pub mod lifecycle;
mod memory;
mod notify;
mod reminder;
mod repository;
mod scheduler;
mod service;
mod sweeper;

pub use catalog::{ProductCatalog, SubscriptionSource};
pub use config::TrialConfig;
pub use error::{DenyReason, RepositoryError, RepositoryResult, TrialError, TrialResult};
pub use guard::{AntiAbuseGuard, RateLimiter};
pub use memory::MemoryTrialRepository;
pub use notify::{NotificationGateway, NotificationTemplate, NotifyError, NotifyResult, NullGateway};
pub use reminder::{DispatchReport, ReminderDispatcher};
pub use repository::TrialRepository;
pub use scheduler::MaintenanceScheduler;
pub use service::{TrialReceipt, TrialService, TrialStatusView};
pub use sweeper::{ExpirationSweeper, SweepReport};
