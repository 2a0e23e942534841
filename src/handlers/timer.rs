// SPDX-License-Identifier: GPL-3.0-only

//! Repeating timer for frame acquisition
//!
//! The timer does not own a thread. It only records whether it is enabled,
//! its period and when it is next due; the owning loop asks
//! [`RepeatingTimer::next_deadline`] when to wake up and calls
//! [`RepeatingTimer::fire_if_due`] when it does. Time is always passed in,
//! which keeps scheduling decisions deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct RepeatingTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl RepeatingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the timer; the first tick is one interval from `now`
    pub fn start(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        self.next_due = Some(now + interval);
    }

    /// Disable the timer. No-op when already stopped
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Change the period
    ///
    /// An active timer restarts its period from `now`, so the new interval
    /// takes effect immediately.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.next_due.is_some() {
            self.next_due = Some(now + interval);
        }
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick is due, or `None` if the timer is stopped
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_due
    }

    /// Consume a tick if one is due at `now`
    ///
    /// Late ticks are not made up: after firing, the next tick is one full
    /// interval after `now`.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_33: Duration = Duration::from_millis(33);

    #[test]
    fn test_not_due_before_interval() {
        let t0 = Instant::now();
        let mut timer = RepeatingTimer::new();
        timer.start(MS_33, t0);

        assert!(timer.is_active());
        assert!(!timer.fire_if_due(t0 + Duration::from_millis(32)));
        assert!(timer.fire_if_due(t0 + MS_33));
    }

    #[test]
    fn test_no_catch_up_burst() {
        let t0 = Instant::now();
        let mut timer = RepeatingTimer::new();
        timer.start(MS_33, t0);

        let late = t0 + Duration::from_millis(200);
        assert!(timer.fire_if_due(late));
        assert!(!timer.fire_if_due(late));
        assert_eq!(timer.next_deadline(), Some(late + MS_33));
    }

    #[test]
    fn test_set_interval_restarts_active_timer() {
        let t0 = Instant::now();
        let mut timer = RepeatingTimer::new();
        timer.start(MS_33, t0);

        let t1 = t0 + Duration::from_millis(10);
        timer.set_interval(Duration::from_millis(100), t1);
        assert_eq!(timer.next_deadline(), Some(t1 + Duration::from_millis(100)));
        assert!(!timer.fire_if_due(t0 + MS_33));
    }

    #[test]
    fn test_set_interval_on_stopped_timer_stays_stopped() {
        let mut timer = RepeatingTimer::new();
        timer.set_interval(MS_33, Instant::now());
        assert!(!timer.is_active());
        assert_eq!(timer.interval(), MS_33);
    }

    #[test]
    fn test_stop() {
        let t0 = Instant::now();
        let mut timer = RepeatingTimer::new();
        timer.start(MS_33, t0);
        timer.stop();
        timer.stop();

        assert!(!timer.is_active());
        assert!(!timer.fire_if_due(t0 + Duration::from_secs(1)));
    }
}
