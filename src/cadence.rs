//! Rolling keystroke-rate estimator.
//!
//! Counts events inside a sliding window and reports events/second. Reports
//! are suppressed until the rate moves by at least [`REPORT_EPSILON`].

use std::collections::VecDeque;

/// Sliding window length in seconds.
pub const WINDOW_SECS: f64 = 1.2;
/// Recommended reporting interval for hosts polling [`CadenceEstimator::poll_report`].
pub const REPORT_INTERVAL_SECS: f64 = 0.25;
pub const REPORT_EPSILON: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct CadenceEstimator {
    window: f64,
    events: VecDeque<f64>,
    last_reported: Option<f64>,
}

impl Default for CadenceEstimator {
    fn default() -> Self {
        CadenceEstimator::new(WINDOW_SECS)
    }
}

impl CadenceEstimator {
    pub fn new(window: f64) -> Self {
        CadenceEstimator {
            window: window.max(0.001),
            events: VecDeque::new(),
            last_reported: None,
        }
    }

    /// Record one keystroke at `now` (seconds, monotonic).
    pub fn record(&mut self, now: f64) {
        self.events.push_back(now);
    }

    /// Current rate in events/second.
    pub fn rate(&mut self, now: f64) -> f64 {
        let cutoff = now - self.window;
        while self.events.front().is_some_and(|&t| t < cutoff) {
            self.events.pop_front();
        }
        self.events.len() as f64 / self.window
    }

    /// The current rate, if it moved enough since the last report.
    pub fn poll_report(&mut self, now: f64) -> Option<f64> {
        let rate = self.rate(now);
        if let Some(last) = self.last_reported {
            if (rate - last).abs() < REPORT_EPSILON {
                return None;
            }
        }
        self.last_reported = Some(rate);
        Some(rate)
    }

    /// Forget all history (used when the system is disabled).
    pub fn reset(&mut self) {
        self.events.clear();
        self.last_reported = None;
    }
}
