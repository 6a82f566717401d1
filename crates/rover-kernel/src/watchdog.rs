//! [`Watchdog`] – is the control loop still turning over?
//!
//! The loop registers a deadline of a few tick periods and beats once per
//! tick.  `GET /api/status` asks [`Watchdog::overdue`] and reports
//! `loop_healthy`.  One `Watchdog` is shared through an `Arc`; the internal
//! lock covers a map lookup and nothing else.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Name the control loop registers under.
pub const CONTROL_LOOP: &str = "control_loop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    Healthy,
    /// Never registered, or silent for longer than its deadline.
    TimedOut,
}

impl ComponentHealth {
    pub fn is_healthy(self) -> bool {
        matches!(self, ComponentHealth::Healthy)
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    beat: Instant,
    limit: Duration,
}

impl Deadline {
    fn overdue_at(&self, now: Instant) -> Option<Duration> {
        now.saturating_duration_since(self.beat)
            .checked_sub(self.limit)
            .filter(|late| !late.is_zero())
    }
}

/// Heartbeat deadlines keyed by component name.
///
/// ```
/// use std::time::Duration;
/// use rover_kernel::watchdog::{CONTROL_LOOP, Watchdog};
///
/// let wd = Watchdog::new();
/// wd.register(CONTROL_LOOP, Duration::from_millis(500));
/// wd.heartbeat(CONTROL_LOOP);
/// assert!(wd.health(CONTROL_LOOP).is_healthy());
/// ```
#[derive(Debug, Default)]
pub struct Watchdog {
    deadlines: Mutex<HashMap<String, Deadline>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a deadline of `limit` starting now.
    pub fn register(&self, component: &str, limit: Duration) {
        self.deadlines.lock().insert(
            component.to_owned(),
            Deadline {
                beat: Instant::now(),
                limit,
            },
        );
    }

    /// Ignored for components that never registered.
    pub fn heartbeat(&self, component: &str) {
        if let Some(deadline) = self.deadlines.lock().get_mut(component) {
            deadline.beat = Instant::now();
        }
    }

    /// How far past its deadline `component` is.  `None` while on time.
    /// Unregistered components count as overdue by `Duration::MAX`.
    pub fn overdue(&self, component: &str) -> Option<Duration> {
        match self.deadlines.lock().get(component) {
            Some(deadline) => deadline.overdue_at(Instant::now()),
            None => Some(Duration::MAX),
        }
    }

    pub fn health(&self, component: &str) -> ComponentHealth {
        match self.overdue(component) {
            None => ComponentHealth::Healthy,
            Some(_) => ComponentHealth::TimedOut,
        }
    }

    /// Every registered component that has missed its deadline, sorted by name.
    pub fn stalled(&self) -> Vec<String> {
        let now = Instant::now();
        let mut late: Vec<String> = self
            .deadlines
            .lock()
            .iter()
            .filter(|(_, d)| d.overdue_at(now).is_some())
            .map(|(name, _)| name.clone())
            .collect();
        late.sort();
        late
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn armed_deadline_starts_on_time() {
        let wd = Watchdog::new();
        wd.register(CONTROL_LOOP, Duration::from_secs(5));
        assert!(wd.health(CONTROL_LOOP).is_healthy());
        assert_eq!(wd.overdue(CONTROL_LOOP), None);
    }

    #[test]
    fn beating_keeps_the_loop_alive() {
        let wd = Watchdog::new();
        wd.register(CONTROL_LOOP, Duration::from_millis(40));
        thread::sleep(Duration::from_millis(25));
        wd.heartbeat(CONTROL_LOOP);
        thread::sleep(Duration::from_millis(25));
        assert_eq!(wd.health(CONTROL_LOOP), ComponentHealth::Healthy);
    }

    #[test]
    fn silent_loop_goes_overdue() {
        let wd = Watchdog::new();
        wd.register(CONTROL_LOOP, Duration::from_millis(20));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(wd.health(CONTROL_LOOP), ComponentHealth::TimedOut);
        assert!(wd.overdue(CONTROL_LOOP).is_some_and(|late| late > Duration::ZERO));
        assert_eq!(wd.stalled(), vec![CONTROL_LOOP.to_string()]);
    }

    #[test]
    fn unregistered_component_never_reports_healthy() {
        let wd = Watchdog::new();
        wd.heartbeat("recorder");
        assert_eq!(wd.health("recorder"), ComponentHealth::TimedOut);
        assert_eq!(wd.overdue("recorder"), Some(Duration::MAX));
        assert!(wd.stalled().is_empty());
    }

    #[test]
    fn deadline_arithmetic() {
        let start = Instant::now();
        let d = Deadline {
            beat: start,
            limit: Duration::from_millis(100),
        };
        assert_eq!(d.overdue_at(start + Duration::from_millis(100)), None);
        assert_eq!(
            d.overdue_at(start + Duration::from_millis(130)),
            Some(Duration::from_millis(30))
        );
    }
}
