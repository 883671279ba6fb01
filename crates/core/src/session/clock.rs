use std::collections::BTreeSet;

/// Something the countdown wants listeners to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// Remaining time dropped to or below a watched mark.
    ThresholdCrossed { seconds: u32 },
    /// Remaining time reached zero. Raised once; the clock stops itself.
    Expired,
}

/// Deterministic one-second countdown.
///
/// The clock does not own a timer: a driver calls [`SessionClock::tick`] once per
/// elapsed second. Ticks while stopped or after expiry are ignored, so a late
/// driver callback can never re-raise expiry.
#[derive(Debug, Clone)]
pub struct SessionClock {
    time_limit: u32,
    remaining: u32,
    thresholds: Vec<u32>,
    fired: BTreeSet<u32>,
    running: bool,
    expired: bool,
}

impl SessionClock {
    /// Create a stopped clock. Thresholds that can never be crossed
    /// (zero, or not below the time limit) are discarded.
    #[must_use]
    pub fn new(time_limit_seconds: u32, thresholds: &[u32]) -> Self {
        let mut thresholds: Vec<u32> = thresholds
            .iter()
            .copied()
            .filter(|t| *t > 0 && *t < time_limit_seconds)
            .collect();
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();

        Self {
            time_limit: time_limit_seconds,
            remaining: time_limit_seconds,
            thresholds,
            fired: BTreeSet::new(),
            running: false,
            expired: time_limit_seconds == 0,
        }
    }

    /// Start ticking. Returns `false` if already running or expired.
    pub fn start(&mut self) -> bool {
        if self.running || self.expired {
            return false;
        }
        self.running = true;
        true
    }

    /// Stop ticking. Returns `true` if the clock was running.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    /// Advance by one second and report what happened.
    pub fn tick(&mut self) -> Vec<ClockEvent> {
        if !self.running || self.expired {
            return Vec::new();
        }

        let before = self.remaining;
        self.remaining = self.remaining.saturating_sub(1);

        let mut events = Vec::new();
        for &mark in &self.thresholds {
            if before > mark && self.remaining <= mark && self.fired.insert(mark) {
                events.push(ClockEvent::ThresholdCrossed { seconds: mark });
            }
        }

        if self.remaining == 0 {
            self.expired = true;
            self.running = false;
            events.push(ClockEvent::Expired);
        }
        events
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Thresholds already announced, smallest first.
    #[must_use]
    pub fn warnings_fired(&self) -> Vec<u32> {
        self.fired.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(clock: &mut SessionClock, ticks: usize) -> Vec<ClockEvent> {
        (0..ticks).flat_map(|_| clock.tick()).collect()
    }

    #[test]
    fn ticks_are_ignored_until_started() {
        let mut clock = SessionClock::new(10, &[]);
        assert!(clock.tick().is_empty());
        assert_eq!(clock.remaining(), 10);
        assert!(clock.start());
        clock.tick();
        assert_eq!(clock.remaining(), 9);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut clock = SessionClock::new(10, &[]);
        assert!(clock.start());
        assert!(!clock.start());
        clock.tick();
        assert_eq!(clock.remaining(), 9);
    }

    #[test]
    fn threshold_fires_once_across_pause_and_resume() {
        let mut clock = SessionClock::new(301, &[300]);
        clock.start();
        let first = clock.tick();
        assert_eq!(first, vec![ClockEvent::ThresholdCrossed { seconds: 300 }]);

        clock.stop();
        assert!(clock.tick().is_empty());
        clock.start();
        let rest = run(&mut clock, 5);
        assert!(rest.is_empty());
        assert_eq!(clock.warnings_fired(), vec![300]);
    }

    #[test]
    fn expiry_fires_once_and_stops() {
        let mut clock = SessionClock::new(2, &[]);
        clock.start();
        assert!(clock.tick().is_empty());
        assert_eq!(clock.tick(), vec![ClockEvent::Expired]);
        assert!(!clock.is_running());
        assert!(clock.is_expired());
        assert!(!clock.start());
        assert!(run(&mut clock, 3).is_empty());
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn thresholds_fire_in_order_before_expiry() {
        let mut clock = SessionClock::new(4, &[1, 3, 3, 0, 4, 9]);
        clock.start();
        let events = run(&mut clock, 10);
        assert_eq!(
            events,
            vec![
                ClockEvent::ThresholdCrossed { seconds: 3 },
                ClockEvent::ThresholdCrossed { seconds: 1 },
                ClockEvent::Expired,
            ]
        );
    }

    #[test]
    fn remaining_stays_within_bounds() {
        let mut clock = SessionClock::new(3, &[2]);
        clock.start();
        for _ in 0..10 {
            clock.tick();
            assert!(clock.remaining() <= clock.time_limit());
        }
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn stop_reports_previous_state() {
        let mut clock = SessionClock::new(5, &[]);
        assert!(!clock.stop());
        clock.start();
        assert!(clock.stop());
        assert!(!clock.is_running());
    }
}
