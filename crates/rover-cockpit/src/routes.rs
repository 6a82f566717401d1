//! Request routing for the control surface.
//!
//! | Method & path | Body / query | Success |
//! |---|---|---|
//! | `POST /api/move` | `{"x","y"}` | 204 |
//! | `POST /api/camera` | `{"x","y"}` | 204 |
//! | `POST /api/modes` | partial mode toggles | 204 |
//! | `POST /api/horn` | – | 204 |
//! | `POST /api/stop` | – | 204 |
//! | `POST /api/settings` | partial thresholds | 204 |
//! | `GET /api/status` | – | 200 |
//! | `GET /api/history` | `seconds`, `vehicle_id` | 200 |
//! | `GET /api/vehicles` | – | 200 |
//! | `GET /ws` | WebSocket upgrade | 101 |
//!
//! Bad payloads answer `400 {"error": ...}` without touching state.  Work
//! that can block on SQLite or on the drive-base lock runs on Tokio's
//! blocking pool, never on an async worker.

use std::sync::Arc;

use axum::Router;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use rover_hal::{Horn, SharedDriveBase};
use rover_kernel::{CONTROL_LOOP, ControlState, Watchdog};
use rover_memory::{HistoryService, HistoryWindow, TelemetryRow, now_secs};
use rover_middleware::{Event, EventBus, EventPayload, Topic};
use rover_types::{LineState, ModeToggles, ModeUpdate, MotionLabel, RoverError, ThresholdUpdate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::stream;

const SOURCE: &str = "rover-cockpit::routes";

/// Request bodies above this size are answered with `413`.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// A failed request: status code plus a message rendered as
/// `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<RoverError> for ApiError {
    fn from(e: RoverError) -> Self {
        match e {
            RoverError::InvalidInput(msg) => Self::bad_request(msg),
            other => Self::internal(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON body extractor
// ─────────────────────────────────────────────────────────────────────────────

/// Like [`axum::Json`], but lenient where the rover's clients are sloppy
/// and strict where state is at stake:
///
/// * no `Content-Type` check;
/// * an empty (or all-whitespace) body means `T::default()`, i.e. `{}`;
/// * any syntax or type error is a `400` with an `{"error"}` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct VectorBody {
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

/// `GET /api/status` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBody {
    pub timestamp: f64,
    pub speed: u8,
    pub raw_speed: u8,
    pub distance: i32,
    pub line: [u8; 3],
    pub motion: MotionLabel,
    pub line_state: LineState,
    pub obstacle_detected: bool,
    pub cpu_temp: f64,
    pub modes: ModeToggles,
    pub speed_limit: i32,
    pub safe_distance: i32,
    pub danger_distance: i32,
    pub loop_healthy: bool,
}

/// `GET /api/history` query.  Every field is taken as text so a bad
/// `seconds` falls back to the default window instead of failing.
#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    seconds: Option<String>,
    vehicle_id: Option<String>,
    /// Older clients send `vehicle`.
    vehicle: Option<String>,
}

impl HistoryParams {
    fn window(&self) -> HistoryWindow {
        let seconds = self
            .seconds
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok());
        HistoryWindow::from_request(seconds)
    }

    fn vehicle(&self) -> Option<String> {
        self.vehicle_id
            .as_deref()
            .or(self.vehicle.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }
}

#[derive(Serialize)]
struct HistoryBody {
    history: Vec<TelemetryRow>,
}

#[derive(Serialize)]
struct VehiclesBody {
    vehicles: Vec<TelemetryRow>,
}

// ─────────────────────────────────────────────────────────────────────────────
// AppContext + router
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a request handler may touch.  Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<ControlState>,
    pub drive: SharedDriveBase,
    pub horn: Arc<dyn Horn>,
    pub history: HistoryService,
    pub bus: EventBus,
    pub watchdog: Arc<Watchdog>,
}

/// Build the control-surface router over `ctx`.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/move", post(set_move))
        .route("/api/camera", post(set_camera))
        .route("/api/modes", post(set_modes))
        .route("/api/horn", post(sound_horn))
        .route("/api/stop", post(emergency_stop))
        .route("/api/settings", post(set_settings))
        .route("/api/status", get(status))
        .route("/api/history", get(history))
        .route("/api/vehicles", get(vehicles))
        .route("/ws", get(stream::upgrade))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("blocking task failed: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn set_move(
    State(ctx): State<AppContext>,
    JsonBody(v): JsonBody<VectorBody>,
) -> Result<StatusCode, ApiError> {
    ctx.state.set_move(v.x, v.y)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_camera(
    State(ctx): State<AppContext>,
    JsonBody(v): JsonBody<VectorBody>,
) -> Result<StatusCode, ApiError> {
    ctx.state.set_camera(v.x, v.y)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_modes(
    State(ctx): State<AppContext>,
    JsonBody(update): JsonBody<ModeUpdate>,
) -> StatusCode {
    let modes = ctx.state.set_modes(&update);
    info!(?modes, "modes changed");
    StatusCode::NO_CONTENT
}

async fn set_settings(
    State(ctx): State<AppContext>,
    JsonBody(update): JsonBody<ThresholdUpdate>,
) -> Result<StatusCode, ApiError> {
    let thresholds = ctx.state.set_thresholds(&update)?;
    info!(
        speed_limit = thresholds.speed_limit,
        safe_distance = thresholds.safe_distance,
        danger_distance = thresholds.danger_distance,
        "thresholds changed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Fire and forget: the response does not wait for playback.
async fn sound_horn(State(ctx): State<AppContext>) -> StatusCode {
    let horn = Arc::clone(&ctx.horn);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = horn.sound() {
            warn!(error = %e, "horn failed");
        }
    });
    StatusCode::NO_CONTENT
}

/// Clear all inputs, then halt.  The halt waits for the drive-base lock,
/// which the control loop holds while it reads sensors.
async fn emergency_stop(State(ctx): State<AppContext>) -> StatusCode {
    ctx.state.stop_all();

    let drive = ctx.drive.clone();
    let halted = blocking(move || {
        let mut base = drive.lock();
        base.halt()
    })
    .await;
    match halted {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "halt failed during emergency stop"),
        Err(e) => warn!(error = %e.message, "halt task failed during emergency stop"),
    }

    ctx.bus.publish_to(
        Topic::SystemAlerts,
        Event::new(
            SOURCE,
            EventPayload::EmergencyStop {
                reason: "operator request".to_string(),
            },
        ),
    );
    info!("emergency stop");
    StatusCode::NO_CONTENT
}

async fn status(State(ctx): State<AppContext>) -> Json<StatusBody> {
    let view = ctx.state.status();
    let t = view.telemetry;
    let overdue = ctx.watchdog.overdue(CONTROL_LOOP);
    if let Some(late) = overdue {
        debug!(
            overdue_ms = late.as_millis() as u64,
            "control loop missed its heartbeat deadline"
        );
    }
    Json(StatusBody {
        timestamp: t.timestamp,
        speed: t.speed,
        raw_speed: t.raw_speed,
        distance: t.distance,
        line: t.line,
        motion: t.motion,
        line_state: t.line_state,
        obstacle_detected: t.obstacle_detected,
        cpu_temp: t.cpu_temp,
        modes: view.modes,
        speed_limit: view.thresholds.speed_limit,
        safe_distance: view.thresholds.safe_distance,
        danger_distance: view.thresholds.danger_distance,
        loop_healthy: overdue.is_none(),
    })
}

async fn history(
    State(ctx): State<AppContext>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryBody>, ApiError> {
    let window = params.window();
    let vehicle = params.vehicle();
    let service = ctx.history.clone();
    let history = blocking(move || service.query(window, now_secs(), vehicle.as_deref())).await?;
    Ok(Json(HistoryBody { history }))
}

async fn vehicles(State(ctx): State<AppContext>) -> Result<Json<VehiclesBody>, ApiError> {
    let service = ctx.history.clone();
    let vehicles = blocking(move || service.fleet()).await?;
    Ok(Json(VehiclesBody { vehicles }))
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}
