//! In-process simulated drivers for CI and hardware-free runs.
//!
//! Each sim driver is a cheap handle over shared state: clone it before
//! handing it to the control loop and keep the clone to script sensor
//! values, inject faults and inspect the recorded command log.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{DriveCall, SimDriveBase};
//! use rover_hal::DriveBase;
//!
//! let bench = SimDriveBase::new();
//! let mut chassis = bench.clone();
//! bench.set_distance(35.0);
//!
//! assert_eq!(chassis.read_distance().unwrap(), 35.0);
//! chassis.drive_forward(20).unwrap();
//! assert_eq!(bench.calls(), vec![DriveCall::Forward(20)]);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rover_types::{DetectionTarget, RoverError};
use tracing::info;

use crate::detector::{ColorTarget, Detector};
use crate::drive::DriveBase;
use crate::horn::Horn;

// ────────────────────────────────────────────────────────────────────────────
// Drive base
// ────────────────────────────────────────────────────────────────────────────

/// One actuation recorded by [`SimDriveBase`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCall {
    Steering(f64),
    Forward(u8),
    Backward(u8),
    Halt,
    Pan(f64),
    Tilt(f64),
}

#[derive(Debug, Default)]
struct SimChassis {
    line: [u8; 3],
    distance: f64,
    sensors_fail: bool,
    actuators_fail: bool,
    calls: Vec<DriveCall>,
}

/// A simulated chassis with scripted sensors and a command log.
#[derive(Debug, Clone, Default)]
pub struct SimDriveBase {
    inner: Arc<Mutex<SimChassis>>,
}

impl SimDriveBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the line-sensor triplet returned by subsequent reads.
    pub fn set_line(&self, line: [u8; 3]) {
        self.inner.lock().line = line;
    }

    /// Script the distance returned by subsequent reads.
    pub fn set_distance(&self, distance_cm: f64) {
        self.inner.lock().distance = distance_cm;
    }

    /// Make every sensor read fail until cleared.
    pub fn fail_sensors(&self, fail: bool) {
        self.inner.lock().sensors_fail = fail;
    }

    /// Make every actuation fail until cleared.  Failed calls are not logged.
    pub fn fail_actuators(&self, fail: bool) {
        self.inner.lock().actuators_fail = fail;
    }

    /// Snapshot of every actuation recorded so far.
    pub fn calls(&self) -> Vec<DriveCall> {
        self.inner.lock().calls.clone()
    }

    /// Drain the command log.
    pub fn take_calls(&self) -> Vec<DriveCall> {
        std::mem::take(&mut self.inner.lock().calls)
    }

    fn read<T>(&self, sensor: &str, f: impl FnOnce(&SimChassis) -> T) -> Result<T, RoverError> {
        let chassis = self.inner.lock();
        if chassis.sensors_fail {
            return Err(RoverError::hardware(sensor, "simulated sensor fault"));
        }
        Ok(f(&chassis))
    }

    fn record(&self, call: DriveCall) -> Result<(), RoverError> {
        let mut chassis = self.inner.lock();
        if chassis.actuators_fail {
            return Err(RoverError::hardware("chassis", "simulated actuator fault"));
        }
        chassis.calls.push(call);
        Ok(())
    }
}

impl DriveBase for SimDriveBase {
    fn read_line_sensors(&mut self) -> Result<[u8; 3], RoverError> {
        self.read("line_sensor", |c| c.line)
    }

    fn read_distance(&mut self) -> Result<f64, RoverError> {
        self.read("ultrasonic", |c| c.distance)
    }

    fn set_steering(&mut self, angle_deg: f64) -> Result<(), RoverError> {
        self.record(DriveCall::Steering(angle_deg))
    }

    fn drive_forward(&mut self, speed: u8) -> Result<(), RoverError> {
        self.record(DriveCall::Forward(speed))
    }

    fn drive_backward(&mut self, speed: u8) -> Result<(), RoverError> {
        self.record(DriveCall::Backward(speed))
    }

    fn halt(&mut self) -> Result<(), RoverError> {
        self.record(DriveCall::Halt)
    }

    fn set_camera_pan(&mut self, angle_deg: f64) -> Result<(), RoverError> {
        self.record(DriveCall::Pan(angle_deg))
    }

    fn set_camera_tilt(&mut self, angle_deg: f64) -> Result<(), RoverError> {
        self.record(DriveCall::Tilt(angle_deg))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detector
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimVision {
    face_switches: Vec<bool>,
    color_targets: Vec<ColorTarget>,
    detection: DetectionTarget,
    fail: bool,
}

/// A simulated detector that records every switch and serves a scripted
/// detection result.
#[derive(Debug, Clone, Default)]
pub struct SimDetector {
    inner: Arc<Mutex<SimVision>>,
}

impl SimDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the object report returned by [`Detector::last_detection`].
    pub fn set_detection(&self, detection: DetectionTarget) {
        self.inner.lock().detection = detection;
    }

    /// Make every detector call fail until cleared.
    pub fn fail(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }

    /// Every face-detection switch issued so far, in order.
    pub fn face_switches(&self) -> Vec<bool> {
        self.inner.lock().face_switches.clone()
    }

    /// Every color-target command issued so far, in order.
    pub fn color_targets(&self) -> Vec<ColorTarget> {
        self.inner.lock().color_targets.clone()
    }
}

impl Detector for SimDetector {
    fn set_face_detection(&mut self, enabled: bool) -> Result<(), RoverError> {
        let mut vision = self.inner.lock();
        if vision.fail {
            return Err(RoverError::hardware("detector", "simulated detector fault"));
        }
        vision.face_switches.push(enabled);
        Ok(())
    }

    fn set_color_target(&mut self, target: ColorTarget) -> Result<(), RoverError> {
        let mut vision = self.inner.lock();
        if vision.fail {
            return Err(RoverError::hardware("detector", "simulated detector fault"));
        }
        vision.color_targets.push(target);
        Ok(())
    }

    fn last_detection(&self) -> Result<DetectionTarget, RoverError> {
        let vision = self.inner.lock();
        if vision.fail {
            return Err(RoverError::hardware("detector", "simulated detector fault"));
        }
        Ok(vision.detection)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Horn
// ────────────────────────────────────────────────────────────────────────────

/// A horn that only counts how often it was sounded.
#[derive(Debug, Clone, Default)]
pub struct SimHorn {
    count: Arc<Mutex<u32>>,
}

impl SimHorn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times_sounded(&self) -> u32 {
        *self.count.lock()
    }
}

impl Horn for SimHorn {
    fn sound(&self) -> Result<(), RoverError> {
        *self.count.lock() += 1;
        info!("sim horn: beep beep");
        Ok(())
    }
}
