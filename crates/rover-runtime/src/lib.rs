//! `rover-runtime` – The Autopilot.
//!
//! Drives the rover at a fixed rate:
//!
//! 1. **Sense** – line sensors, distance, CPU temperature and the detector's
//!    last result, with safe defaults on failure.
//! 2. **Decide** – [`arbitrator::arbitrate`] picks one driving policy by
//!    priority and computes the motion and camera commands.
//! 3. **Act** – [`actuate`] issues the commands to the drive base;
//!    [`detection`] switches the face and color detectors.
//! 4. **Record** – [`recorder::TelemetryRecorder`] smooths the speed,
//!    commits the snapshot and persists at most once per second.
//!
//! [`control_loop::ControlLoop`] strings the steps together and publishes
//! every snapshot on the event bus.  [`telemetry::init_tracing`] sets up
//! logging for the whole process.

pub mod actuate;
pub mod arbitrator;
pub mod control_loop;
pub mod detection;
pub mod recorder;
pub mod telemetry;

pub use arbitrator::{Arbitration, Policy, arbitrate, classify_line, linear_map};
pub use control_loop::{ControlLoop, DEFAULT_TICK_PERIOD, LoopStats};
pub use detection::{DetectionCommand, DetectionSwitch};
pub use recorder::{SpeedFilter, TelemetryRecorder, TickOutcome};
