//! `rover-hal` – hardware capability seams.
//!
//! The control core never touches a bus or a servo directly.  It talks to
//! three traits and lets drivers live behind them:
//!
//! - [`drive`] – [`DriveBase`][drive::DriveBase]: line sensors, ultrasonic
//!   distance, steering, drive motors and the camera gimbal.
//! - [`detector`] – [`Detector`][detector::Detector]: face detection switch,
//!   color-tracking target and the last detected object.
//! - [`horn`] – [`Horn`][horn::Horn]: fire-and-forget sound playback.
//! - [`thermal`] – SoC temperature reading.
//! - [`sim`] – in-process drivers that record every command, for CI and for
//!   running the stack without hardware attached.

pub mod detector;
pub mod drive;
pub mod horn;
pub mod sim;
pub mod thermal;

pub use detector::{COLOR_PALETTE, ColorTarget, Detector, SharedDetector};
pub use drive::{DriveBase, SharedDriveBase};
pub use horn::{CommandHorn, Horn};
pub use sim::{DriveCall, SimDetector, SimDriveBase, SimHorn};
