//! Configuration for the trial engine.

/// Tunable knobs for the engine and its background maintenance.
///
/// Intervals and windows are plain seconds so callers can drive them from
/// whatever config source the host process uses. Tests typically construct
/// this directly and invoke `run_once` instead of relying on the scheduler.
#[derive(Debug, Clone)]
pub struct TrialConfig {
    /// Days-remaining values at which a reminder is sent, each at most once.
    pub reminder_thresholds: Vec<u32>,
    /// How often the background scheduler runs the sweep + dispatch round.
    pub sweep_interval_secs: u64,
    /// Maximum trial-start attempts per origin within the window.
    pub rate_limit_max_attempts: usize,
    /// Sliding-window length for the rate limit.
    pub rate_limit_window_secs: u64,
    /// Maximum trials corrected per bulk update during a sweep.
    pub sweep_batch_size: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            reminder_thresholds: vec![7, 3, 1],
            sweep_interval_secs: 24 * 60 * 60,
            rate_limit_max_attempts: 5,
            rate_limit_window_secs: 60 * 60,
            sweep_batch_size: 500,
        }
    }
}
