//! Threshold-based reminder dispatch for trials nearing their end.

use crate::config::TrialConfig;
use crate::error::TrialResult;
use crate::lifecycle;
use crate::notify::{NotificationGateway, NotificationTemplate};
use crate::repository::TrialRepository;
use algomart_types::TrialStatus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Effectively-active trials examined.
    pub considered: usize,
    /// Reminders sent and recorded.
    pub sent: usize,
    /// Reminders that failed to send or record; retried next run.
    pub failed: usize,
}

/// Sends "your trial ends in N days" reminders, once per threshold.
///
/// Delivery is deliberately at-least-once: a threshold is recorded as sent
/// only after the gateway accepted the message, so a failed send is retried
/// on the next run. Missing a reminder is worse than the rare duplicate a
/// crash between send and record can produce. The recorded set only grows —
/// a threshold already in `reminders_sent` is never re-notified.
pub struct ReminderDispatcher {
    repo: Arc<dyn TrialRepository>,
    gateway: Arc<dyn NotificationGateway>,
    thresholds: Vec<u32>,
}

impl ReminderDispatcher {
    /// Creates a dispatcher with the configured thresholds.
    pub fn new(
        repo: Arc<dyn TrialRepository>,
        gateway: Arc<dyn NotificationGateway>,
        config: &TrialConfig,
    ) -> Self {
        Self {
            repo,
            gateway,
            thresholds: config.reminder_thresholds.clone(),
        }
    }

    /// Runs one dispatch round evaluated at `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> TrialResult<DispatchReport> {
        let active = self.repo.find_active()?;
        let mut report = DispatchReport::default();

        for trial in &active {
            if lifecycle::effective_status(trial, now) != TrialStatus::Active {
                // past end_at but not yet swept; the sweeper owns that correction
                continue;
            }
            report.considered += 1;

            let days = lifecycle::days_remaining(trial, now);
            if !self.thresholds.contains(&days) || trial.reminders_sent.contains(&days) {
                continue;
            }

            let context = serde_json::json!({
                "product_id": trial.product_id.to_string(),
                "days_remaining": days,
                "trial_ends_at": trial.end_at.to_rfc3339(),
            });
            match self
                .gateway
                .send(&trial.user_id, NotificationTemplate::TrialReminder, &context)
                .await
            {
                Ok(()) => match self.repo.record_reminder(&trial.id, days) {
                    Ok(_newly) => {
                        report.sent += 1;
                        debug!("reminder ({days}d) sent for trial {}", trial.id);
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!("reminder ({days}d) sent but not recorded for trial {}: {e}", trial.id);
                    }
                },
                Err(e) => {
                    report.failed += 1;
                    warn!("reminder ({days}d) send failed for trial {}: {e}", trial.id);
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            debug!(
                "reminder dispatch: {} considered, {} sent, {} failed",
                report.considered, report.sent, report.failed
            );
        }
        Ok(report)
    }
}
