//! Shared, fixed-shape records passed between the rover crates.
//!
//! Nothing here owns behavior: the kernel guards [`ControlInputs`] and
//! [`SafetyThresholds`], the runtime turns a [`SensorSample`] and a
//! [`DetectionTarget`] into a [`MotionCommand`], and the recorder folds the
//! result into a [`TelemetrySnapshot`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magnitude bound applied to every joystick component.
pub const JOYSTICK_LIMIT: f64 = 100.0;

// ─────────────────────────────────────────────────────────────────────────────
// Control inputs
// ─────────────────────────────────────────────────────────────────────────────

/// A two-axis joystick vector.  Both components live in `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    /// Build a vector with both components clamped to `[-100, 100]`.
    pub fn clamped(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(-JOYSTICK_LIMIT, JOYSTICK_LIMIT),
            y: y.clamp(-JOYSTICK_LIMIT, JOYSTICK_LIMIT),
        }
    }
}

/// The five independent mode toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeToggles {
    pub line_track: bool,
    pub avoid_obstacles: bool,
    pub face_detect: bool,
    pub color_detect: bool,
    pub color_follow: bool,
}

/// A partial mode update: only `Some` fields are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeUpdate {
    #[serde(default)]
    pub line_track: Option<bool>,
    #[serde(default)]
    pub avoid_obstacles: Option<bool>,
    #[serde(default)]
    pub face_detect: Option<bool>,
    #[serde(default)]
    pub color_detect: Option<bool>,
    #[serde(default)]
    pub color_follow: Option<bool>,
}

impl ModeToggles {
    /// Apply every field present in `update`, leaving the others untouched.
    pub fn apply(&mut self, update: &ModeUpdate) {
        let fields = [
            (&mut self.line_track, update.line_track),
            (&mut self.avoid_obstacles, update.avoid_obstacles),
            (&mut self.face_detect, update.face_detect),
            (&mut self.color_detect, update.color_detect),
            (&mut self.color_follow, update.color_follow),
        ];
        for (slot, value) in fields {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

/// Operator inputs read by the arbitrator once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlInputs {
    /// Drive joystick: `x` steers, `y` throttles.
    pub move_vector: Vector2,
    /// Camera joystick: `x` pans, `y` tilts.
    pub camera: Vector2,
    pub modes: ModeToggles,
}

// ─────────────────────────────────────────────────────────────────────────────
// Safety thresholds
// ─────────────────────────────────────────────────────────────────────────────

pub const SPEED_LIMIT_RANGE: (i32, i32) = (0, 100);
pub const SAFE_DISTANCE_RANGE: (i32, i32) = (20, 80);
pub const DANGER_DISTANCE_RANGE: (i32, i32) = (5, 40);

/// Tunable safety limits.  `danger_distance < safe_distance` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    /// Upper bound on manual and follow speeds (0–100).
    pub speed_limit: i32,
    /// Distance (cm) at or beyond which the path counts as clear.
    pub safe_distance: i32,
    /// Distance (cm) below which the rover reverses away.
    pub danger_distance: i32,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            speed_limit: 100,
            safe_distance: 40,
            danger_distance: 20,
        }
    }
}

/// A partial threshold update as received from the control surface.
///
/// Values are truncated to whole numbers before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    #[serde(default)]
    pub speed_limit: Option<f64>,
    #[serde(default)]
    pub safe_distance: Option<f64>,
    #[serde(default)]
    pub danger_distance: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sensing
// ─────────────────────────────────────────────────────────────────────────────

/// One tick's worth of sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    /// Left, middle, right line sensors (each 0 or 1).
    pub line: [u8; 3],
    /// Ultrasonic distance in centimeters; `0` means "no reading".
    pub distance_cm: f64,
    /// SoC temperature in °C (`0.0` when unavailable).
    pub cpu_temp_c: f64,
}

/// The detector's most recent object report.  May be stale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionTarget {
    /// Horizontal center of the tracked object in frame pixels.
    pub center_x: f64,
    /// Width of the tracked object in pixels.
    pub width: f64,
    /// Number of matching objects in the frame.
    pub count: u32,
}

impl Default for DetectionTarget {
    fn default() -> Self {
        Self {
            center_x: 320.0,
            width: 0.0,
            count: 0,
        }
    }
}

/// Classification of the line-sensor triplet, also used as the retained
/// line-follow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    Forward,
    Left,
    Right,
    #[default]
    Stop,
}

impl LineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineState::Forward => "forward",
            LineState::Left => "left",
            LineState::Right => "right",
            LineState::Stop => "stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(LineState::Forward),
            "left" => Some(LineState::Left),
            "right" => Some(LineState::Right),
            "stop" => Some(LineState::Stop),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Motion
// ─────────────────────────────────────────────────────────────────────────────

/// Discrete label describing what the rover is doing this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionLabel {
    #[default]
    Stop,
    Forward,
    Backward,
    Left,
    Right,
}

impl MotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionLabel::Stop => "stop",
            MotionLabel::Forward => "forward",
            MotionLabel::Backward => "backward",
            MotionLabel::Left => "left",
            MotionLabel::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(MotionLabel::Stop),
            "forward" => Some(MotionLabel::Forward),
            "backward" => Some(MotionLabel::Backward),
            "left" => Some(MotionLabel::Left),
            "right" => Some(MotionLabel::Right),
            _ => None,
        }
    }
}

impl From<LineState> for MotionLabel {
    fn from(state: LineState) -> Self {
        match state {
            LineState::Forward => MotionLabel::Forward,
            LineState::Left => MotionLabel::Left,
            LineState::Right => MotionLabel::Right,
            LineState::Stop => MotionLabel::Stop,
        }
    }
}

/// Drive-motor command for one tick.  Speeds are magnitudes in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "speed", rename_all = "snake_case")]
pub enum Drive {
    Halt,
    Forward(u8),
    Backward(u8),
    /// Reverse at `speed` for `duration_ms`, then halt.
    BackOut { speed: u8, duration_ms: u64 },
}

impl Drive {
    /// Signed commanded speed: positive forward, negative backward.
    pub fn signed_speed(&self) -> i32 {
        match *self {
            Drive::Halt => 0,
            Drive::Forward(s) => i32::from(s),
            Drive::Backward(s) => -i32::from(s),
            Drive::BackOut { speed, .. } => -i32::from(speed),
        }
    }
}

/// The arbitrator's output for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionCommand {
    /// Steering angle in degrees; `None` leaves the servo where it is.
    pub steering_deg: Option<f64>,
    pub drive: Drive,
    pub label: MotionLabel,
}

impl MotionCommand {
    pub fn halt() -> Self {
        Self {
            steering_deg: None,
            drive: Drive::Halt,
            label: MotionLabel::Stop,
        }
    }
}

/// Camera gimbal angles, issued every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraCommand {
    pub pan_deg: f64,
    pub tilt_deg: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Telemetry
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory telemetry for the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Smoothed display speed, rounded (0–100).
    pub speed: u8,
    /// Unsmoothed |commanded speed| (0–100).
    pub raw_speed: u8,
    /// Distance reading truncated to whole centimeters.
    pub distance: i32,
    pub line: [u8; 3],
    pub motion: MotionLabel,
    pub line_state: LineState,
    pub obstacle_detected: bool,
    pub cpu_temp: f64,
    pub modes: ModeToggles,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared across the rover crates.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    /// A request payload was malformed; nothing was mutated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Storage Error: {0}")]
    Storage(String),

    /// A control policy could not produce a command for this tick.
    #[error("Policy Error: {0}")]
    Policy(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl RoverError {
    pub fn hardware(component: &str, details: impl Into<String>) -> Self {
        RoverError::HardwareFault {
            component: component.to_string(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_components_are_clamped() {
        let v = Vector2::clamped(250.0, -1000.0);
        assert_eq!(v, Vector2 { x: 100.0, y: -100.0 });
        let v = Vector2::clamped(12.5, -3.0);
        assert_eq!(v, Vector2 { x: 12.5, y: -3.0 });
    }

    #[test]
    fn mode_update_touches_only_present_keys() {
        let mut modes = ModeToggles {
            avoid_obstacles: true,
            ..Default::default()
        };
        let update: ModeUpdate = serde_json::from_str(r#"{"line_track":true}"#).unwrap();
        modes.apply(&update);
        assert!(modes.line_track);
        assert!(modes.avoid_obstacles);
        assert!(!modes.face_detect);
    }

    #[test]
    fn mode_update_rejects_non_boolean() {
        let res = serde_json::from_str::<ModeUpdate>(r#"{"line_track":"yes"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn labels_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&MotionLabel::Backward).unwrap(), "\"backward\"");
        assert_eq!(serde_json::to_string(&LineState::Left).unwrap(), "\"left\"");
        assert_eq!(MotionLabel::parse("right"), Some(MotionLabel::Right));
        assert_eq!(LineState::parse("sideways"), None);
    }

    #[test]
    fn drive_signed_speed() {
        assert_eq!(Drive::Halt.signed_speed(), 0);
        assert_eq!(Drive::Forward(40).signed_speed(), 40);
        assert_eq!(Drive::Backward(40).signed_speed(), -40);
        assert_eq!(
            Drive::BackOut {
                speed: 10,
                duration_ms: 100
            }
            .signed_speed(),
            -10
        );
    }

    #[test]
    fn default_thresholds_hold_invariant() {
        let t = SafetyThresholds::default();
        assert!(t.danger_distance < t.safe_distance);
        assert_eq!(t.speed_limit, 100);
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::hardware("ultrasonic", "timeout");
        assert!(err.to_string().contains("ultrasonic"));
        assert!(RoverError::InvalidInput("x".into()).to_string().contains("Invalid input"));
    }
}
