#![forbid(unsafe_code)]

//! Host-polled throttle.
//!
//! Time never comes from a clock here; every decision takes an explicit
//! `now_ms` from the host, which keeps the engine deterministic under test.
//! The leading call runs immediately, intermediate calls inside the
//! interval are dropped but latch a pending flag, and the trailing call is
//! guaranteed once the host polls [`Throttle::run_pending`] past the
//! interval.

#[derive(Debug)]
pub struct Throttle {
    interval_ms: u64,
    last_run_ms: Option<u64>,
    pending: bool,
}

impl Throttle {
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_run_ms: None,
            pending: false,
        }
    }

    /// Whether a trailing run is latched.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Ask to run now. `true` means run immediately; `false` means the call
    /// was absorbed and a trailing run is latched.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        match self.last_run_ms {
            Some(last) if now_ms.saturating_sub(last) < self.interval_ms => {
                self.pending = true;
                false
            }
            _ => {
                self.last_run_ms = Some(now_ms);
                self.pending = false;
                true
            }
        }
    }

    /// Poll for the trailing run. `true` exactly once per latched burst,
    /// when the interval has elapsed.
    pub fn run_pending(&mut self, now_ms: u64) -> bool {
        if !self.pending {
            return false;
        }
        match self.last_run_ms {
            Some(last) if now_ms.saturating_sub(last) < self.interval_ms => false,
            _ => {
                self.last_run_ms = Some(now_ms);
                self.pending = false;
                true
            }
        }
    }

    /// Drop any latched trailing run and forget history, so the next
    /// [`Throttle::ready`] is a leading call again.
    pub fn reset(&mut self) {
        self.last_run_ms = None;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_call_runs_immediately() {
        let mut t = Throttle::new(100);
        assert!(t.ready(1_000));
    }

    #[test]
    fn intermediate_calls_are_dropped_but_latched() {
        let mut t = Throttle::new(100);
        assert!(t.ready(1_000));
        assert!(!t.ready(1_010));
        assert!(!t.ready(1_050));
        assert!(t.has_pending());
    }

    #[test]
    fn trailing_run_fires_once_after_the_interval() {
        let mut t = Throttle::new(100);
        assert!(t.ready(1_000));
        assert!(!t.ready(1_050));
        assert!(!t.run_pending(1_060), "interval not elapsed yet");
        assert!(t.run_pending(1_100));
        assert!(!t.run_pending(1_200), "burst already drained");
    }

    #[test]
    fn no_pending_without_a_dropped_call() {
        let mut t = Throttle::new(100);
        assert!(t.ready(1_000));
        assert!(!t.run_pending(5_000));
    }

    #[test]
    fn reset_restores_the_leading_edge() {
        let mut t = Throttle::new(100);
        assert!(t.ready(1_000));
        assert!(!t.ready(1_010));
        t.reset();
        assert!(!t.has_pending());
        assert!(t.ready(1_020));
    }
}
