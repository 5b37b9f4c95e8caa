//! Fixed-frequency loop pacer.
//!
//! Every polling loop and control loop paces itself with a `Rate`: do the
//! work, then `wait()` out the remainder of the period. An overrun simply
//! skips the sleep; there is no hard deadline here.

use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

/// Loops at a fixed rate, specified in hertz.
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    last: Instant,
    /// Manual adjustment added to the computed delay [s].
    trim: f64,
}

impl Rate {
    /// Create a pacer for the given frequency.
    pub fn new(hertz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(hertz.max(1))),
            last: Instant::now(),
            trim: 0.0,
        }
    }

    /// The loop period.
    #[inline]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// The loop period in seconds.
    #[inline]
    pub fn period_sec(&self) -> f64 {
        self.period.as_secs_f64()
    }

    /// Set a loop trim [s], for auto-adjustment should it be needed.
    /// Ignored (with a warning) when its magnitude reaches the period.
    pub fn set_trim(&mut self, trim_sec: f64) {
        if trim_sec.abs() < self.period.as_secs_f64() {
            self.trim = trim_sec;
        } else {
            warn!(trim_sec, period_sec = self.period.as_secs_f64(), "trim larger than period: ignored");
        }
    }

    /// True while the current period has not yet elapsed.
    #[inline]
    pub fn waiting(&self) -> bool {
        self.last.elapsed() < self.period
    }

    /// Sleep out the remainder of the period, then start the next one.
    /// If the period has already passed, no waiting takes place.
    pub fn wait(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        let remaining = self.period.as_secs_f64() + self.trim - elapsed;
        if remaining > 0.0 {
            thread::sleep(Duration::from_secs_f64(remaining));
        }
        self.last = Instant::now();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_accessors() {
        let rate = Rate::new(20);
        assert_eq!(rate.period(), Duration::from_millis(50));
        assert!((rate.period_sec() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn wait_paces_the_loop() {
        let mut rate = Rate::new(100);
        let start = Instant::now();
        for _ in 0..5 {
            rate.wait();
        }
        let elapsed = start.elapsed();
        // Five 10ms periods; allow generous scheduling slack.
        assert!(elapsed >= Duration::from_millis(45), "elapsed: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(250), "elapsed: {elapsed:?}");
    }

    #[test]
    fn overrun_skips_sleep() {
        let mut rate = Rate::new(200);
        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        rate.wait();
        // The 5ms period already passed; wait() should return promptly.
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn oversized_trim_ignored() {
        let mut rate = Rate::new(100);
        rate.set_trim(1.0);
        assert_eq!(rate.trim, 0.0);
        rate.set_trim(-0.002);
        assert_eq!(rate.trim, -0.002);
    }
}
