//! [`HistoryService`] – time-window queries over persisted telemetry.
//!
//! Callers ask for "the last N seconds".  The window is clamped before it
//! reaches the store:
//!
//! | Requested                | Effective window |
//! |--------------------------|------------------|
//! | absent or `<= 0`         | 600 s            |
//! | `1 ..= 86_400`           | as requested     |
//! | `> 86_400`               | 86 400 s         |
//!
//! Storage faults never reach the caller: they are logged and the query
//! answers with an empty list.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use crate::telemetry_store::{TelemetryLog, TelemetryRow};

pub const DEFAULT_WINDOW_SECS: u32 = 600;
pub const MAX_WINDOW_SECS: u32 = 86_400;

/// Current Unix time in seconds with sub-second precision.
pub fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A clamped look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    seconds: u32,
}

impl HistoryWindow {
    /// Clamp a requested window into `1 ..= 86_400` seconds.
    pub fn from_request(seconds: Option<i64>) -> Self {
        let seconds = match seconds {
            Some(s) if s > 0 => s.min(i64::from(MAX_WINDOW_SECS)) as u32,
            _ => DEFAULT_WINDOW_SECS,
        };
        Self { seconds }
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Oldest timestamp included when querying at `now`.
    pub fn cutoff(&self, now: f64) -> f64 {
        now - f64::from(self.seconds)
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_WINDOW_SECS,
        }
    }
}

/// Read side of the flight recorder.
#[derive(Clone)]
pub struct HistoryService {
    log: Arc<dyn TelemetryLog>,
}

impl HistoryService {
    pub fn new(log: Arc<dyn TelemetryLog>) -> Self {
        Self { log }
    }

    /// Rows recorded within `window` of `now`, oldest first.
    ///
    /// `vehicle_id` narrows the result to one rover.  Returns an empty list
    /// if the store cannot be read.
    pub fn query(
        &self,
        window: HistoryWindow,
        now: f64,
        vehicle_id: Option<&str>,
    ) -> Vec<TelemetryRow> {
        match self.log.since(window.cutoff(now), vehicle_id) {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, window_secs = window.seconds(), "history query failed");
                Vec::new()
            }
        }
    }

    /// The newest row of every vehicle that has ever reported.
    pub fn fleet(&self) -> Vec<TelemetryRow> {
        match self.log.latest_per_vehicle() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "fleet query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry_store::{StoreError, TelemetryStore};
    use rover_types::TelemetrySnapshot;

    struct BrokenLog;

    impl TelemetryLog for BrokenLog {
        fn append(&self, _row: &TelemetryRow) -> Result<(), StoreError> {
            Err(StoreError::CorruptRow("disk on fire".into()))
        }
        fn since(
            &self,
            _cutoff: f64,
            _vehicle_id: Option<&str>,
        ) -> Result<Vec<TelemetryRow>, StoreError> {
            Err(StoreError::CorruptRow("disk on fire".into()))
        }
        fn latest_per_vehicle(&self) -> Result<Vec<TelemetryRow>, StoreError> {
            Err(StoreError::CorruptRow("disk on fire".into()))
        }
    }

    fn seeded(timestamps: &[f64]) -> HistoryService {
        let store = TelemetryStore::open_in_memory().unwrap();
        for &ts in timestamps {
            let snap = TelemetrySnapshot {
                timestamp: ts,
                ..Default::default()
            };
            store.append(&TelemetryRow::from_snapshot("rover-01", &snap)).unwrap();
        }
        HistoryService::new(Arc::new(store))
    }

    #[test]
    fn window_clamping() {
        assert_eq!(HistoryWindow::from_request(None).seconds(), 600);
        assert_eq!(HistoryWindow::from_request(Some(0)).seconds(), 600);
        assert_eq!(HistoryWindow::from_request(Some(-30)).seconds(), 600);
        assert_eq!(HistoryWindow::from_request(Some(1)).seconds(), 1);
        assert_eq!(HistoryWindow::from_request(Some(3_600)).seconds(), 3_600);
        assert_eq!(HistoryWindow::from_request(Some(100_000)).seconds(), 86_400);
        assert_eq!(HistoryWindow::default(), HistoryWindow::from_request(None));
    }

    #[test]
    fn query_returns_rows_inside_window_in_order() {
        let svc = seeded(&[1_000.0, 1_300.0, 1_500.0, 1_590.0]);
        let window = HistoryWindow::from_request(Some(300));
        let ts: Vec<f64> = svc.query(window, 1_600.0, None).iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![1_300.0, 1_500.0, 1_590.0]);
    }

    #[test]
    fn oversized_window_is_capped_at_one_day() {
        let now = 200_000.0;
        let svc = seeded(&[now - 90_000.0, now - 80_000.0]);
        let rows = svc.query(HistoryWindow::from_request(Some(100_000)), now, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ts, now - 80_000.0);
    }

    #[test]
    fn empty_store_yields_empty_list() {
        let svc = seeded(&[]);
        assert!(svc.query(HistoryWindow::default(), 10.0, None).is_empty());
        assert!(svc.fleet().is_empty());
    }

    #[test]
    fn storage_fault_yields_empty_list() {
        let svc = HistoryService::new(Arc::new(BrokenLog));
        assert!(svc.query(HistoryWindow::default(), 10.0, None).is_empty());
        assert!(svc.fleet().is_empty());
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_secs() > 1_577_836_800.0);
    }
}
