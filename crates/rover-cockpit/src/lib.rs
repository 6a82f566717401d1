//! `rover-cockpit` – The Control Surface
//!
//! An axum HTTP + WebSocket server (default port `5000`) that:
//!
//! 1. **Accepts** operator commands as small JSON requests: joystick
//!    vectors, mode toggles, safety thresholds, the horn and the emergency
//!    stop.  See [`routes`] for the full table.
//!
//! 2. **Answers** status, history and fleet queries from the guarded control
//!    state and the telemetry store.
//!
//! 3. **Streams** every bus event (per-tick telemetry, emergency stops,
//!    hardware faults) to WebSocket clients connected at `/ws`.

pub mod routes;
pub mod server;
mod stream;

pub use routes::{ApiError, AppContext, JsonBody, MAX_BODY_BYTES, StatusBody, router};
pub use server::{BoundCockpit, CockpitServer, DEFAULT_PORT};
