//! Turning decisions into hardware calls.

use std::thread;
use std::time::Duration;

use rover_hal::SharedDriveBase;
use rover_types::{CameraCommand, Drive, MotionCommand, RoverError};

/// Apply steering and drive for one tick.
///
/// [`Drive::BackOut`] reverses, sleeps for its duration with the drive lock
/// released, then halts.
pub fn apply_motion(drive: &SharedDriveBase, command: &MotionCommand) -> Result<(), RoverError> {
    let mut hw = drive.lock();
    if let Some(deg) = command.steering_deg {
        hw.set_steering(deg)?;
    }
    match command.drive {
        Drive::Halt => hw.halt(),
        Drive::Forward(speed) => hw.drive_forward(speed),
        Drive::Backward(speed) => hw.drive_backward(speed),
        Drive::BackOut { speed, duration_ms } => {
            hw.drive_backward(speed)?;
            drop(hw);
            thread::sleep(Duration::from_millis(duration_ms));
            drive.lock().halt()
        }
    }
}

/// Point the camera gimbal.
pub fn apply_camera(drive: &SharedDriveBase, camera: &CameraCommand) -> Result<(), RoverError> {
    let mut hw = drive.lock();
    hw.set_camera_pan(camera.pan_deg)?;
    hw.set_camera_tilt(camera.tilt_deg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_hal::{DriveCall, SimDriveBase, drive};
    use rover_types::MotionLabel;

    #[test]
    fn steering_is_skipped_when_unset() {
        let bench = SimDriveBase::new();
        let hw = drive::shared(bench.clone());
        apply_motion(&hw, &MotionCommand::halt()).unwrap();
        assert_eq!(bench.calls(), vec![DriveCall::Halt]);
    }

    #[test]
    fn back_out_reverses_then_halts() {
        let bench = SimDriveBase::new();
        let hw = drive::shared(bench.clone());
        let cmd = MotionCommand {
            steering_deg: Some(30.0),
            drive: Drive::BackOut {
                speed: 10,
                duration_ms: 5,
            },
            label: MotionLabel::Stop,
        };
        apply_motion(&hw, &cmd).unwrap();
        assert_eq!(
            bench.calls(),
            vec![DriveCall::Steering(30.0), DriveCall::Backward(10), DriveCall::Halt]
        );
    }

    #[test]
    fn actuator_fault_is_returned() {
        let bench = SimDriveBase::new();
        bench.fail_actuators(true);
        let hw = drive::shared(bench);
        let cmd = MotionCommand {
            steering_deg: None,
            drive: Drive::Forward(20),
            label: MotionLabel::Forward,
        };
        assert!(apply_motion(&hw, &cmd).is_err());
        assert!(apply_camera(&hw, &CameraCommand::default()).is_err());
    }

    #[test]
    fn camera_pans_then_tilts() {
        let bench = SimDriveBase::new();
        let hw = drive::shared(bench.clone());
        apply_camera(
            &hw,
            &CameraCommand {
                pan_deg: -45.0,
                tilt_deg: 10.0,
            },
        )
        .unwrap();
        assert_eq!(bench.calls(), vec![DriveCall::Pan(-45.0), DriveCall::Tilt(10.0)]);
    }
}
