//! `rover-memory` – The Flight Recorder.
//!
//! Durable, append-only telemetry on a local SQLite substrate.
//!
//! # Modules
//!
//! - [`telemetry_store`] – [`TelemetryStore`][telemetry_store::TelemetryStore]:
//!   one flat row per persisted sample, keyed by timestamp and vehicle id,
//!   behind the [`TelemetryLog`][telemetry_store::TelemetryLog] trait.
//! - [`history`] – [`HistoryService`][history::HistoryService]: bounded
//!   time-window queries that degrade to an empty result on storage faults.

pub mod history;
pub mod telemetry_store;

pub use history::{HistoryService, HistoryWindow, now_secs};
pub use telemetry_store::{StoreError, TelemetryLog, TelemetryRow, TelemetryStore};
