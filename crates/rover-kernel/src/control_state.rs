//! [`ControlState`] – the guarded state shared by the control loop and the
//! request handlers.
//!
//! Inputs, thresholds and the current telemetry snapshot sit behind a single
//! [`parking_lot::Mutex`].  The lock is only ever held for plain in-memory
//! reads and writes; callers must not perform sensor, actuator or storage
//! I/O while holding it, and no method here does.

use parking_lot::Mutex;
use rover_types::{
    ControlInputs, ModeToggles, ModeUpdate, RoverError, SafetyThresholds, TelemetrySnapshot,
    ThresholdUpdate, Vector2,
};
use tracing::{debug, info};

use crate::thresholds;

#[derive(Debug, Default)]
struct Guarded {
    inputs: ControlInputs,
    thresholds: SafetyThresholds,
    telemetry: TelemetrySnapshot,
    /// Set by an emergency stop; consumed by the next telemetry commit.
    speed_reset_pending: bool,
}

/// What the recorder sees while committing a tick's telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitContext {
    /// Mode toggles as of the commit, not as of the start of the tick.
    pub modes: ModeToggles,
    /// `true` once after an emergency stop: the speed filter restarts at 0.
    pub reset_speed: bool,
}

/// A consistent view for status queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusView {
    pub telemetry: TelemetrySnapshot,
    pub modes: ModeToggles,
    pub thresholds: SafetyThresholds,
}

/// Operator inputs, safety thresholds and latest telemetry under one lock.
///
/// # Example
///
/// ```
/// use rover_kernel::ControlState;
///
/// let state = ControlState::default();
/// state.set_move(0.0, 250.0).unwrap();
/// let (inputs, _) = state.snapshot();
/// assert_eq!(inputs.move_vector.y, 100.0);
/// ```
#[derive(Debug, Default)]
pub struct ControlState {
    inner: Mutex<Guarded>,
}

impl ControlState {
    /// Create a state with all inputs zeroed and the given thresholds.
    pub fn new(thresholds: SafetyThresholds) -> Self {
        Self {
            inner: Mutex::new(Guarded {
                thresholds,
                ..Default::default()
            }),
        }
    }

    /// Read inputs and thresholds as one consistent pair.
    pub fn snapshot(&self) -> (ControlInputs, SafetyThresholds) {
        let g = self.inner.lock();
        (g.inputs, g.thresholds)
    }

    /// Store the drive joystick, clamping each component to `[-100, 100]`.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidInput`] for non-finite components; nothing is
    /// stored in that case.
    pub fn set_move(&self, x: f64, y: f64) -> Result<(), RoverError> {
        let v = finite_vector("move", x, y)?;
        self.inner.lock().inputs.move_vector = v;
        Ok(())
    }

    /// Store the camera joystick, clamping each component to `[-100, 100]`.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidInput`] for non-finite components.
    pub fn set_camera(&self, x: f64, y: f64) -> Result<(), RoverError> {
        let v = finite_vector("camera", x, y)?;
        self.inner.lock().inputs.camera = v;
        Ok(())
    }

    /// Apply the toggles present in `update`; the rest are untouched.
    pub fn set_modes(&self, update: &ModeUpdate) -> ModeToggles {
        let mut g = self.inner.lock();
        g.inputs.modes.apply(update);
        debug!(modes = ?g.inputs.modes, "modes updated");
        g.inputs.modes
    }

    /// Apply a partial threshold update with cross-adjustment.
    ///
    /// # Errors
    ///
    /// [`RoverError::InvalidInput`] for non-finite values; the thresholds
    /// are left unchanged.
    pub fn set_thresholds(&self, update: &ThresholdUpdate) -> Result<SafetyThresholds, RoverError> {
        let mut g = self.inner.lock();
        let next = thresholds::apply_update(g.thresholds, update)?;
        g.thresholds = next;
        debug!(thresholds = ?next, "thresholds updated");
        Ok(next)
    }

    /// Zero both joysticks and clear every mode toggle in one step.
    ///
    /// Idempotent.  Also arms a speed-filter reset for the next telemetry
    /// commit.
    pub fn stop_all(&self) {
        let mut g = self.inner.lock();
        g.inputs.move_vector = Vector2::default();
        g.inputs.camera = Vector2::default();
        g.inputs.modes = ModeToggles::default();
        g.speed_reset_pending = true;
        info!("stop_all: joysticks zeroed, all modes cleared");
    }

    pub fn thresholds(&self) -> SafetyThresholds {
        self.inner.lock().thresholds
    }

    pub fn modes(&self) -> ModeToggles {
        self.inner.lock().inputs.modes
    }

    /// The latest committed telemetry snapshot.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.inner.lock().telemetry
    }

    /// Telemetry, modes and thresholds read under one lock acquisition.
    pub fn status(&self) -> StatusView {
        let g = self.inner.lock();
        StatusView {
            telemetry: g.telemetry,
            modes: g.inputs.modes,
            thresholds: g.thresholds,
        }
    }

    /// Build and store a tick's snapshot while holding the lock.
    ///
    /// `build` must be pure in-memory work.  The stored snapshot is returned.
    pub fn commit_telemetry<F>(&self, build: F) -> TelemetrySnapshot
    where
        F: FnOnce(CommitContext) -> TelemetrySnapshot,
    {
        let mut g = self.inner.lock();
        let ctx = CommitContext {
            modes: g.inputs.modes,
            reset_speed: std::mem::take(&mut g.speed_reset_pending),
        };
        g.telemetry = build(ctx);
        g.telemetry
    }
}

fn finite_vector(what: &str, x: f64, y: f64) -> Result<Vector2, RoverError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(RoverError::InvalidInput(format!(
            "{what} vector components must be finite numbers"
        )));
    }
    Ok(Vector2::clamped(x, y))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn vectors_are_clamped() {
        let state = ControlState::default();
        state.set_move(-500.0, 42.0).unwrap();
        state.set_camera(101.0, -100.5).unwrap();
        let (inputs, _) = state.snapshot();
        assert_eq!(inputs.move_vector, Vector2 { x: -100.0, y: 42.0 });
        assert_eq!(inputs.camera, Vector2 { x: 100.0, y: -100.0 });
    }

    #[test]
    fn non_finite_vector_is_rejected_without_mutation() {
        let state = ControlState::default();
        state.set_move(10.0, 20.0).unwrap();
        assert!(state.set_move(f64::NAN, 0.0).is_err());
        assert!(state.set_camera(0.0, f64::INFINITY).is_err());
        let (inputs, _) = state.snapshot();
        assert_eq!(inputs.move_vector, Vector2 { x: 10.0, y: 20.0 });
        assert_eq!(inputs.camera, Vector2::default());
    }

    #[test]
    fn set_modes_is_partial() {
        let state = ControlState::default();
        state.set_modes(&ModeUpdate {
            avoid_obstacles: Some(true),
            color_detect: Some(true),
            ..Default::default()
        });
        let modes = state.set_modes(&ModeUpdate {
            color_detect: Some(false),
            ..Default::default()
        });
        assert!(modes.avoid_obstacles);
        assert!(!modes.color_detect);
        assert!(!modes.line_track);
    }

    #[test]
    fn set_thresholds_cross_adjusts() {
        let state = ControlState::default();
        let t = state
            .set_thresholds(&ThresholdUpdate {
                danger_distance: Some(90.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!((t.safe_distance, t.danger_distance), (45, 40));
        assert_eq!(state.thresholds(), t);
    }

    #[test]
    fn stop_all_is_idempotent() {
        let state = ControlState::default();
        state.set_move(30.0, 80.0).unwrap();
        state.set_camera(-20.0, 5.0).unwrap();
        state.set_modes(&ModeUpdate {
            line_track: Some(true),
            face_detect: Some(true),
            ..Default::default()
        });

        state.stop_all();
        let once = state.snapshot();
        state.stop_all();
        let twice = state.snapshot();

        assert_eq!(once, twice);
        assert_eq!(once.0, ControlInputs::default());
    }

    #[test]
    fn stop_all_keeps_thresholds() {
        let state = ControlState::default();
        state
            .set_thresholds(&ThresholdUpdate {
                speed_limit: Some(55.0),
                ..Default::default()
            })
            .unwrap();
        state.stop_all();
        assert_eq!(state.thresholds().speed_limit, 55);
    }

    #[test]
    fn speed_reset_is_delivered_once() {
        let state = ControlState::default();
        state.stop_all();
        let mut seen = Vec::new();
        for _ in 0..2 {
            state.commit_telemetry(|ctx| {
                seen.push(ctx.reset_speed);
                TelemetrySnapshot::default()
            });
        }
        assert_eq!(seen, vec![true, false]);
    }

    #[test]
    fn commit_is_visible_to_status() {
        let state = ControlState::default();
        state.set_modes(&ModeUpdate {
            line_track: Some(true),
            ..Default::default()
        });
        state.commit_telemetry(|ctx| TelemetrySnapshot {
            speed: 7,
            modes: ctx.modes,
            ..Default::default()
        });
        let status = state.status();
        assert_eq!(status.telemetry.speed, 7);
        assert!(status.telemetry.modes.line_track);
        assert!(status.modes.line_track);
    }

    #[test]
    fn concurrent_writers_never_tear_the_move_vector() {
        let state = Arc::new(ControlState::default());
        let writers: Vec<_> = [(10.0, 10.0), (-70.0, -70.0)]
            .into_iter()
            .map(|(x, y)| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        state.set_move(x, y).unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..2_000 {
            let (inputs, _) = state.snapshot();
            assert_eq!(inputs.move_vector.x, inputs.move_vector.y);
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
