//! `rover-kernel` – Safety & Shared State
//!
//! The rover's brainstem.  It does not decide where to drive; it owns the
//! state every decision is made from and enforces the limits on it.
//!
//! # Modules
//!
//! - [`control_state`] – [`ControlState`][control_state::ControlState]:
//!   joystick vectors, mode toggles, safety thresholds and the latest
//!   telemetry snapshot behind one lock, so a reader never sees a torn mix
//!   of fields written by different requests.
//! - [`thresholds`] – cross-adjusting clamp that keeps
//!   `danger_distance < safe_distance` after every update.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat tracking
//!   for the control loop so status queries can report a stalled loop.

pub mod control_state;
pub mod thresholds;
pub mod watchdog;

pub use control_state::{CommitContext, ControlState, StatusView};
pub use thresholds::apply_update;
pub use watchdog::{CONTROL_LOOP, ComponentHealth, Watchdog};
