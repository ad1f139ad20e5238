//! Background scheduling of the sweep + reminder round.

use crate::config::TrialConfig;
use crate::error::TrialResult;
use crate::reminder::{DispatchReport, ReminderDispatcher};
use crate::sweeper::{ExpirationSweeper, SweepReport};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Drives the sweeper and the reminder dispatcher on a fixed interval,
/// independent of request traffic.
///
/// The components are injected; tests bypass the scheduler entirely and call
/// [`run_once`](Self::run_once) at instants of their choosing. `stop()` is
/// graceful: no new round starts, an in-flight round finishes.
pub struct MaintenanceScheduler {
    sweeper: Arc<ExpirationSweeper>,
    dispatcher: Arc<ReminderDispatcher>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceScheduler {
    /// Creates a stopped scheduler over the given components.
    pub fn new(
        sweeper: Arc<ExpirationSweeper>,
        dispatcher: Arc<ReminderDispatcher>,
        config: &TrialConfig,
    ) -> Self {
        Self {
            sweeper,
            dispatcher,
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the background loop. The first round runs immediately, then
    /// one round per interval. A second call while running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let sweeper = Arc::clone(&self.sweeper);
        let dispatcher = Arc::clone(&self.dispatcher);
        let running = Arc::clone(&self.running);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        Self::run_round(&sweeper, &dispatcher).await;
                    }
                    _ = shutdown.notified() => break,
                }
            }
            info!("maintenance scheduler stopped");
        });

        *self.handle.lock().unwrap() = Some(handle);
        info!("maintenance scheduler started, interval {:?}", self.interval);
    }

    /// Requests a graceful stop: the loop exits before its next round.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Returns true while the background loop is scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs a single sweep + dispatch round at `now`, outside the loop.
    /// This is the deterministic entry point tests use.
    pub async fn run_once(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> TrialResult<(SweepReport, DispatchReport)> {
        let sweep = self.sweeper.run_once(now)?;
        let dispatch = self.dispatcher.run_once(now).await?;
        Ok((sweep, dispatch))
    }

    async fn run_round(sweeper: &ExpirationSweeper, dispatcher: &ReminderDispatcher) {
        let now = Utc::now();
        if let Err(e) = sweeper.run_once(now) {
            warn!("expiration sweep failed: {e}");
        }
        if let Err(e) = dispatcher.run_once(now).await {
            warn!("reminder dispatch failed: {e}");
        }
    }
}
