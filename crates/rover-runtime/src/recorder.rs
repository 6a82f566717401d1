//! The Telemetry Recorder.
//!
//! Folds each tick into a [`TelemetrySnapshot`] under the control-state lock,
//! then persists at most one row per second outside it.

use std::sync::Arc;

use rover_kernel::ControlState;
use rover_memory::{TelemetryLog, TelemetryRow};
use rover_types::{LineState, MotionLabel, SensorSample, TelemetrySnapshot};
use tracing::{debug, error};

/// Weight of the previous smoothed value.
pub const SMOOTHING_ALPHA: f64 = 0.85;
/// Minimum spacing between persisted rows, in seconds.
pub const PERSIST_INTERVAL_SECS: f64 = 1.0;

/// First-order low-pass filter over the commanded speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFilter {
    alpha: f64,
    smoothed: f64,
}

impl SpeedFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            smoothed: 0.0,
        }
    }

    /// Feed one raw sample and return the new smoothed value.
    pub fn update(&mut self, raw: f64) -> f64 {
        self.smoothed = self.alpha * self.smoothed + (1.0 - self.alpha) * raw;
        self.smoothed
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }

    pub fn value(&self) -> f64 {
        self.smoothed
    }
}

impl Default for SpeedFilter {
    fn default() -> Self {
        Self::new(SMOOTHING_ALPHA)
    }
}

/// What the control loop hands the recorder after deciding and acting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Unix time of the tick, in seconds.
    pub timestamp: f64,
    pub sample: SensorSample,
    pub line_state: LineState,
    pub motion: MotionLabel,
    /// Signed commanded speed (negative = backward).
    pub commanded_speed: i32,
    pub obstacle_detected: bool,
}

/// Builds the per-tick snapshot and throttles persistence.
pub struct TelemetryRecorder {
    vehicle_id: String,
    filter: SpeedFilter,
    last_persisted: f64,
    log: Option<Arc<dyn TelemetryLog>>,
}

impl TelemetryRecorder {
    /// `log` is `None` when no store could be opened; snapshots are then
    /// kept in memory only.
    pub fn new(vehicle_id: impl Into<String>, log: Option<Arc<dyn TelemetryLog>>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            filter: SpeedFilter::default(),
            last_persisted: 0.0,
            log,
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    /// Commit this tick's snapshot to `state` and persist it if due.
    pub fn record(&mut self, state: &ControlState, outcome: &TickOutcome) -> TelemetrySnapshot {
        let raw = outcome.commanded_speed.unsigned_abs().min(100) as u8;
        let filter = &mut self.filter;

        let snapshot = state.commit_telemetry(|ctx| {
            if ctx.reset_speed {
                filter.reset();
            }
            let smoothed = filter.update(f64::from(raw));
            TelemetrySnapshot {
                timestamp: outcome.timestamp,
                speed: smoothed.round().clamp(0.0, 100.0) as u8,
                raw_speed: raw,
                distance: outcome.sample.distance_cm as i32,
                line: outcome.sample.line,
                motion: outcome.motion,
                line_state: outcome.line_state,
                obstacle_detected: outcome.obstacle_detected,
                cpu_temp: outcome.sample.cpu_temp_c,
                modes: ctx.modes,
            }
        });

        if outcome.timestamp - self.last_persisted >= PERSIST_INTERVAL_SECS {
            self.last_persisted = outcome.timestamp;
            self.persist(&snapshot);
        }
        snapshot
    }

    fn persist(&self, snapshot: &TelemetrySnapshot) {
        let Some(log) = &self.log else {
            return;
        };
        let row = TelemetryRow::from_snapshot(&self.vehicle_id, snapshot);
        match log.append(&row) {
            Ok(()) => debug!(ts = row.ts, speed = row.speed, "telemetry row persisted"),
            Err(e) => error!(error = %e, "failed to persist telemetry row"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_memory::TelemetryStore;
    use rover_types::ModeUpdate;

    fn outcome(timestamp: f64, commanded_speed: i32) -> TickOutcome {
        TickOutcome {
            timestamp,
            sample: SensorSample {
                line: [0, 1, 0],
                distance_cm: 33.7,
                cpu_temp_c: 51.2,
            },
            line_state: LineState::Forward,
            motion: MotionLabel::Forward,
            commanded_speed,
            obstacle_detected: true,
        }
    }

    #[test]
    fn smoothing_converges_geometrically() {
        let mut f = SpeedFilter::default();
        let raw = 60.0;
        let mut prev_gap = raw;
        for n in 1..=40 {
            let gap = (raw - f.update(raw)).abs();
            assert!(gap <= SMOOTHING_ALPHA.powi(n) * raw + 1e-9);
            assert!(gap <= prev_gap);
            prev_gap = gap;
        }
    }

    #[test]
    fn snapshot_fields_are_assembled() {
        let state = ControlState::default();
        state.set_modes(&ModeUpdate {
            avoid_obstacles: Some(true),
            ..Default::default()
        });
        let mut rec = TelemetryRecorder::new("rover-01", None);
        let snap = rec.record(&state, &outcome(10.0, -40));

        assert_eq!(snap.raw_speed, 40);
        assert_eq!(snap.speed, 6); // 0.15 * 40 = 6.0
        assert_eq!(snap.distance, 33);
        assert_eq!(snap.line, [0, 1, 0]);
        assert!(snap.obstacle_detected);
        assert!(snap.modes.avoid_obstacles);
        assert_eq!(state.telemetry(), snap);
    }

    #[test]
    fn raw_speed_is_clamped() {
        let state = ControlState::default();
        let mut rec = TelemetryRecorder::new("rover-01", None);
        assert_eq!(rec.record(&state, &outcome(1.0, 250)).raw_speed, 100);
    }

    #[test]
    fn emergency_stop_restarts_smoothing() {
        let state = ControlState::default();
        let mut rec = TelemetryRecorder::new("rover-01", None);
        for i in 0..50 {
            rec.record(&state, &outcome(f64::from(i), 80));
        }
        assert_eq!(state.telemetry().speed, 80);

        state.stop_all();
        let snap = rec.record(&state, &outcome(51.0, 0));
        assert_eq!(snap.speed, 0);
    }

    #[test]
    fn persistence_is_throttled_to_one_hertz() {
        let store = Arc::new(TelemetryStore::open_in_memory().unwrap());
        let state = ControlState::default();
        let log = store.clone() as Arc<dyn TelemetryLog>;
        let mut rec = TelemetryRecorder::new("rover-07", Some(log));

        let start = 1_000.0;
        for i in 0..70 {
            rec.record(&state, &outcome(start + f64::from(i) * 0.05, 20));
        }

        let rows = store.since(0.0, None).unwrap();
        // ticks at 0.0 s, 1.0 s, 2.0 s and 3.0 s from the start
        assert_eq!(rows.len(), 4);
        for pair in rows.windows(2) {
            assert!(pair[1].ts - pair[0].ts >= PERSIST_INTERVAL_SECS - 1e-9);
        }
        assert!(rows.iter().all(|r| r.vehicle_id == "rover-07"));
    }

    #[test]
    fn persistence_failure_keeps_snapshot() {
        struct FullDisk;
        impl TelemetryLog for FullDisk {
            fn append(&self, _row: &TelemetryRow) -> Result<(), rover_memory::StoreError> {
                Err(rover_memory::StoreError::CorruptRow("full".into()))
            }
            fn since(
                &self,
                _c: f64,
                _v: Option<&str>,
            ) -> Result<Vec<TelemetryRow>, rover_memory::StoreError> {
                Ok(Vec::new())
            }
            fn latest_per_vehicle(&self) -> Result<Vec<TelemetryRow>, rover_memory::StoreError> {
                Ok(Vec::new())
            }
        }

        let state = ControlState::default();
        let log = Arc::new(FullDisk) as Arc<dyn TelemetryLog>;
        let mut rec = TelemetryRecorder::new("rover-01", Some(log));
        let snap = rec.record(&state, &outcome(5.0, 10));
        assert_eq!(state.telemetry(), snap);
        assert_eq!(snap.raw_speed, 10);
    }
}
