//! The Mode Arbitrator – one pure decision step per control tick.
//!
//! [`arbitrate`] picks exactly one driving policy by fixed priority and
//! computes its [`MotionCommand`]:
//!
//! | Priority | Condition                           | Policy                 |
//! |----------|-------------------------------------|------------------------|
//! | 1        | `line_track`                        | [`Policy::LineTrack`]  |
//! | 2        | `avoid_obstacles`                   | [`Policy::AvoidObstacles`] |
//! | 3        | `color_follow` **and** `color_detect` | [`Policy::ColorFollow`] |
//! | 4        | otherwise                           | [`Policy::Manual`]     |
//!
//! The camera gimbal is mapped from the camera joystick on every tick,
//! whichever policy drives.
//!
//! No I/O happens here.  The caller senses, calls [`arbitrate`] and then
//! actuates the result.

use rover_types::{
    CameraCommand, ControlInputs, DetectionTarget, Drive, LineState, MotionCommand, MotionLabel,
    RoverError, SafetyThresholds, SensorSample, Vector2,
};

// ─────────────────────────────────────────────────────────────────────────────
// Tunables
// ─────────────────────────────────────────────────────────────────────────────

pub const LINE_TRACK_SPEED: u8 = 10;
pub const LINE_TRACK_ANGLE: f64 = 20.0;
pub const BACK_OUT_ANGLE: f64 = 30.0;
pub const BACK_OUT_SPEED: u8 = 10;
pub const BACK_OUT_MS: u64 = 100;

pub const AVOID_SPEED: u8 = 40;
pub const AVOID_ANGLE: f64 = 30.0;

pub const FOLLOW_BASE_SPEED: i32 = 30;
pub const FRAME_CENTER_X: f64 = 320.0;
pub const FOLLOW_MAX_ERR: f64 = 320.0;
pub const FOLLOW_NEAR_WIDTH: f64 = 220.0;

pub const STEERING_LIMIT: f64 = 30.0;
pub const MANUAL_DEADBAND: f64 = 5.0;
pub const TURN_LABEL_THRESHOLD: f64 = 20.0;

pub const PAN_RANGE: (f64, f64) = (-90.0, 90.0);
pub const TILT_RANGE: (f64, f64) = (-35.0, 65.0);

// ─────────────────────────────────────────────────────────────────────────────
// Result types
// ─────────────────────────────────────────────────────────────────────────────

/// The driving policy that won arbitration this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    LineTrack,
    AvoidObstacles,
    ColorFollow,
    Manual,
}

/// Everything one decision step produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arbitration {
    pub policy: Policy,
    pub command: MotionCommand,
    pub camera: CameraCommand,
    /// Classification of this tick's line-sensor triplet.
    pub line_state: LineState,
    /// Line-follow state to carry into the next tick.
    pub last_line_state: LineState,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Map `v` linearly from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// No clamping: values outside the input range extrapolate.
pub fn linear_map(v: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (v - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Classify the line-sensor triplet.
///
/// The left sensor yields [`LineState::Right`] and the right sensor yields
/// [`LineState::Left`]: the label names the steering response, not the
/// sensor that fired.
pub fn classify_line(line: [u8; 3]) -> LineState {
    match line {
        [0, 0, 0] => LineState::Stop,
        [_, 1, _] => LineState::Forward,
        [1, _, _] => LineState::Right,
        [_, _, 1] => LineState::Left,
        _ => LineState::Stop,
    }
}

/// Gimbal angles for the camera joystick.
pub fn camera_command(camera: Vector2) -> CameraCommand {
    CameraCommand {
        pan_deg: linear_map(camera.x, -100.0, 100.0, PAN_RANGE.0, PAN_RANGE.1),
        tilt_deg: linear_map(camera.y, -100.0, 100.0, TILT_RANGE.0, TILT_RANGE.1),
    }
}

fn finite(what: &str, v: f64) -> Result<f64, RoverError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RoverError::Policy(format!("{what} is not a finite number: {v}")))
    }
}

fn turn_label(x: f64) -> Option<MotionLabel> {
    if x < -TURN_LABEL_THRESHOLD {
        Some(MotionLabel::Left)
    } else if x > TURN_LABEL_THRESHOLD {
        Some(MotionLabel::Right)
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

fn line_track(line_state: LineState, last: LineState) -> (MotionCommand, LineState) {
    let steer = |deg: f64| MotionCommand {
        steering_deg: Some(deg),
        drive: Drive::Forward(LINE_TRACK_SPEED),
        label: MotionLabel::from(line_state),
    };
    match line_state {
        LineState::Forward => (steer(0.0), line_state),
        LineState::Left => (steer(LINE_TRACK_ANGLE), line_state),
        LineState::Right => (steer(-LINE_TRACK_ANGLE), line_state),
        LineState::Stop => {
            let back_out = |deg: f64| MotionCommand {
                steering_deg: Some(deg),
                drive: Drive::BackOut {
                    speed: BACK_OUT_SPEED,
                    duration_ms: BACK_OUT_MS,
                },
                label: MotionLabel::Stop,
            };
            let command = match last {
                LineState::Left => back_out(-BACK_OUT_ANGLE),
                LineState::Right => back_out(BACK_OUT_ANGLE),
                _ => MotionCommand::halt(),
            };
            (command, last)
        }
    }
}

fn avoid_obstacles(distance: f64, thresholds: &SafetyThresholds) -> MotionCommand {
    if distance >= f64::from(thresholds.safe_distance) {
        MotionCommand {
            steering_deg: Some(0.0),
            drive: Drive::Forward(AVOID_SPEED),
            label: MotionLabel::Forward,
        }
    } else if distance >= f64::from(thresholds.danger_distance) {
        MotionCommand {
            steering_deg: Some(AVOID_ANGLE),
            drive: Drive::Forward(AVOID_SPEED),
            label: MotionLabel::Right,
        }
    } else {
        MotionCommand {
            steering_deg: Some(-AVOID_ANGLE),
            drive: Drive::Backward(AVOID_SPEED),
            label: MotionLabel::Backward,
        }
    }
}

fn color_follow(
    target: &DetectionTarget,
    thresholds: &SafetyThresholds,
) -> Result<MotionCommand, RoverError> {
    if target.count == 0 {
        return Ok(MotionCommand::halt());
    }
    let err = finite("detection center_x", target.center_x)? - FRAME_CENTER_X;
    let width = finite("detection width", target.width)?;
    let steering = linear_map(err, -FOLLOW_MAX_ERR, FOLLOW_MAX_ERR, -STEERING_LIMIT, STEERING_LIMIT)
        .clamp(-STEERING_LIMIT, STEERING_LIMIT);

    let speed = FOLLOW_BASE_SPEED.min(thresholds.speed_limit);
    let (drive, label) = if width < FOLLOW_NEAR_WIDTH && speed > 0 {
        (Drive::Forward(speed as u8), MotionLabel::Forward)
    } else {
        (Drive::Halt, MotionLabel::Stop)
    };
    Ok(MotionCommand {
        steering_deg: Some(steering),
        drive,
        label,
    })
}

fn manual(mv: Vector2, thresholds: &SafetyThresholds) -> MotionCommand {
    let steering = Some(linear_map(mv.x, -100.0, 100.0, -STEERING_LIMIT, STEERING_LIMIT));

    if mv.y.abs() < MANUAL_DEADBAND {
        return MotionCommand {
            steering_deg: steering,
            drive: Drive::Halt,
            label: turn_label(mv.x).unwrap_or(MotionLabel::Stop),
        };
    }

    let speed = linear_map(mv.y.abs(), 0.0, 100.0, 0.0, f64::from(thresholds.speed_limit)).floor();
    if speed <= 0.0 {
        return MotionCommand {
            steering_deg: steering,
            drive: Drive::Halt,
            label: MotionLabel::Stop,
        };
    }
    let speed = speed.min(100.0) as u8;
    let (drive, label) = if mv.y > 0.0 {
        (Drive::Forward(speed), MotionLabel::Forward)
    } else {
        (Drive::Backward(speed), MotionLabel::Backward)
    };
    MotionCommand {
        steering_deg: steering,
        drive,
        label: turn_label(mv.x).unwrap_or(label),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

/// Run one decision step.
///
/// # Errors
///
/// [`RoverError::Policy`] when the winning policy is handed a non-finite
/// sensor or detection value.  The caller skips actuation for that tick.
pub fn arbitrate(
    inputs: &ControlInputs,
    thresholds: &SafetyThresholds,
    sample: &SensorSample,
    detection: &DetectionTarget,
    last_line_state: LineState,
) -> Result<Arbitration, RoverError> {
    let modes = &inputs.modes;
    let line_state = classify_line(sample.line);

    let (policy, command, next_line_state) = if modes.line_track {
        let (command, next) = line_track(line_state, last_line_state);
        (Policy::LineTrack, command, next)
    } else if modes.avoid_obstacles {
        let distance = finite("distance", sample.distance_cm)?;
        (
            Policy::AvoidObstacles,
            avoid_obstacles(distance, thresholds),
            last_line_state,
        )
    } else if modes.color_follow && modes.color_detect {
        (
            Policy::ColorFollow,
            color_follow(detection, thresholds)?,
            last_line_state,
        )
    } else {
        (
            Policy::Manual,
            manual(inputs.move_vector, thresholds),
            last_line_state,
        )
    };

    Ok(Arbitration {
        policy,
        command,
        camera: camera_command(inputs.camera),
        line_state,
        last_line_state: next_line_state,
    })
}
