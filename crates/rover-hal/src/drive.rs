//! [`DriveBase`] – the sensor/actuation capability of the rover chassis.
//!
//! Drivers implement this trait; the control loop only ever sees the trait,
//! so a servo HAT, a motor shield or the [`SimDriveBase`][crate::sim::SimDriveBase]
//! can be swapped without touching the arbitration logic.
//!
//! Every call is expected to return promptly or fail fast.  Callers decide
//! the fallback on failure; drivers must not retry internally.

use std::sync::Arc;

use parking_lot::Mutex;
use rover_types::RoverError;

/// Chassis sensors and actuators.
pub trait DriveBase: Send {
    /// Read the left, middle and right line sensors (each 0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the ADC cannot be read.
    fn read_line_sensors(&mut self) -> Result<[u8; 3], RoverError>;

    /// Read the ultrasonic distance in centimeters.  `0` means no echo.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the sensor does not answer.
    fn read_distance(&mut self) -> Result<f64, RoverError>;

    /// Point the front wheels at `angle_deg` (negative = left).
    fn set_steering(&mut self, angle_deg: f64) -> Result<(), RoverError>;

    /// Drive forward at `speed` (0–100).
    fn drive_forward(&mut self, speed: u8) -> Result<(), RoverError>;

    /// Drive backward at `speed` (0–100).
    fn drive_backward(&mut self, speed: u8) -> Result<(), RoverError>;

    /// Cut drive power.
    fn halt(&mut self) -> Result<(), RoverError>;

    /// Pan the camera gimbal to `angle_deg`.
    fn set_camera_pan(&mut self, angle_deg: f64) -> Result<(), RoverError>;

    /// Tilt the camera gimbal to `angle_deg`.
    fn set_camera_tilt(&mut self, angle_deg: f64) -> Result<(), RoverError>;
}

/// A drive base shared between the control loop and the emergency-stop
/// handler.  The lock serializes hardware access only; it is never held
/// together with the control-state lock.
pub type SharedDriveBase = Arc<Mutex<Box<dyn DriveBase>>>;

/// Wrap a driver for sharing across tasks.
pub fn shared(driver: impl DriveBase + 'static) -> SharedDriveBase {
    Arc::new(Mutex::new(Box::new(driver)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal chassis that only remembers the last steering angle.
    struct MockChassis {
        steering: f64,
        halted: bool,
    }

    impl DriveBase for MockChassis {
        fn read_line_sensors(&mut self) -> Result<[u8; 3], RoverError> {
            Ok([0, 1, 0])
        }
        fn read_distance(&mut self) -> Result<f64, RoverError> {
            Err(RoverError::hardware("ultrasonic", "no echo"))
        }
        fn set_steering(&mut self, angle_deg: f64) -> Result<(), RoverError> {
            self.steering = angle_deg;
            Ok(())
        }
        fn drive_forward(&mut self, _speed: u8) -> Result<(), RoverError> {
            self.halted = false;
            Ok(())
        }
        fn drive_backward(&mut self, _speed: u8) -> Result<(), RoverError> {
            self.halted = false;
            Ok(())
        }
        fn halt(&mut self) -> Result<(), RoverError> {
            self.halted = true;
            Ok(())
        }
        fn set_camera_pan(&mut self, _angle_deg: f64) -> Result<(), RoverError> {
            Ok(())
        }
        fn set_camera_tilt(&mut self, _angle_deg: f64) -> Result<(), RoverError> {
            Ok(())
        }
    }

    #[test]
    fn shared_driver_is_usable_through_the_lock() {
        let base = shared(MockChassis {
            steering: 0.0,
            halted: false,
        });
        {
            let mut hw = base.lock();
            hw.set_steering(-12.0).unwrap();
            hw.halt().unwrap();
            assert_eq!(hw.read_line_sensors().unwrap(), [0, 1, 0]);
            assert!(matches!(
                hw.read_distance(),
                Err(RoverError::HardwareFault { .. })
            ));
        }
        let clone = Arc::clone(&base);
        clone.lock().drive_forward(10).unwrap();
    }
}
