// src/session/watchdog.rs
//! Silence watchdog and dropped-sample monitor

use std::collections::VecDeque;
use std::time::Duration;

/// The device has been silent longer than the configured delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallEvent {
    pub silent_for: Duration,
    pub threshold: Duration,
}

/// Fires once per crossing of the silence threshold; re-armed by activity or reset.
#[derive(Debug, Clone)]
pub struct Watchdog {
    threshold_ms: u64,
    latched: bool,
}

impl Watchdog {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            latched: false,
        }
    }

    pub fn check(&mut self, now_ms: u64, last_activity_ms: u64) -> Option<StallEvent> {
        let silent_ms = now_ms.saturating_sub(last_activity_ms);
        if silent_ms <= self.threshold_ms || self.latched {
            return None;
        }

        self.latched = true;
        Some(StallEvent {
            silent_for: Duration::from_millis(silent_ms),
            threshold: Duration::from_millis(self.threshold_ms),
        })
    }

    pub fn activity(&mut self) {
        self.latched = false;
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }
}

/// Counts ticks that lost bytes after synchronization inside a sliding window.
#[derive(Debug, Clone)]
pub struct DroppedSampleMonitor {
    times_ms: VecDeque<u64>,
    count_before_alarm: usize,
    window_ms: u64,
    alarmed: bool,
}

impl DroppedSampleMonitor {
    pub fn new(count_before_alarm: usize, window_ms: u64) -> Self {
        Self {
            times_ms: VecDeque::new(),
            count_before_alarm,
            window_ms,
            alarmed: false,
        }
    }

    /// Record one drop at `now_ms`. Returns true the first time the count is reached.
    pub fn record(&mut self, now_ms: u64) -> bool {
        self.times_ms.push_back(now_ms);
        while let Some(&oldest) = self.times_ms.front() {
            if now_ms.saturating_sub(oldest) > self.window_ms {
                self.times_ms.pop_front();
            } else {
                break;
            }
        }

        if !self.alarmed && self.times_ms.len() >= self.count_before_alarm {
            self.alarmed = true;
            return true;
        }
        false
    }

    pub fn recent(&self) -> usize {
        self.times_ms.len()
    }

    pub fn clear(&mut self) {
        self.times_ms.clear();
        self.alarmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_fires_once_per_crossing() {
        let mut dog = Watchdog::new(1000);
        assert!(dog.check(1000, 0).is_none());

        let event = dog.check(1001, 0).unwrap();
        assert_eq!(event.silent_for, Duration::from_millis(1001));
        assert!(dog.check(5000, 0).is_none());

        dog.activity();
        assert!(dog.check(5000, 4500).is_none());
        assert!(dog.check(6000, 4500).is_some());
    }

    #[test]
    fn test_dropped_samples_outside_window_are_pruned() {
        let mut monitor = DroppedSampleMonitor::new(3, 1000);
        assert!(!monitor.record(0));
        assert!(!monitor.record(700));
        assert!(!monitor.record(1600));
        assert_eq!(monitor.recent(), 2);

        assert!(monitor.record(1700));
        assert!(!monitor.record(1800));

        monitor.clear();
        assert_eq!(monitor.recent(), 0);
    }
}
