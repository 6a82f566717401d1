//! [`ControlLoop`] – the fixed-rate sense → decide → act → record cycle.
//!
//! One instance owns the loop-private state (line-follow memory, detector
//! switch, speed filter) and runs on a dedicated thread.  Everything it
//! shares with request handlers goes through [`ControlState`], the drive-base
//! lock, the [`EventBus`] and the [`Watchdog`].
//!
//! # Fault policy
//!
//! | Fault | Handling |
//! |---|---|
//! | Sensor read fails | Safe default (`[0,0,0]`, `0` cm, `0.0` °C) |
//! | Detector read fails | No target (`count = 0`) |
//! | Arbitration fails | Actuation skipped, label `stop`, speed held |
//! | Actuation fails | Logged; next tick retries |
//! | Persistence fails | Logged by the recorder |
//!
//! A component's first failure is logged at `warn` and announced on
//! [`Topic::SystemAlerts`]; repeats are logged at `debug` until it recovers.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rover_hal::{ColorTarget, SharedDetector, SharedDriveBase, thermal};
use rover_kernel::{CONTROL_LOOP, ControlState, Watchdog};
use rover_memory::now_secs;
use rover_middleware::{Event, EventBus, EventPayload, Topic};
use rover_types::{
    DetectionTarget, LineState, MotionLabel, RoverError, SensorSample, TelemetrySnapshot,
};
use tracing::{debug, error, info, warn};

use crate::actuate::{apply_camera, apply_motion};
use crate::arbitrator::{arbitrate, classify_line};
use crate::detection::{DetectionCommand, DetectionSwitch};
use crate::recorder::{TelemetryRecorder, TickOutcome};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);
/// The loop counts as stalled after this many silent periods.
pub const WATCHDOG_PERIODS: u32 = 10;

const SOURCE: &str = "rover-runtime::control_loop";

// ─────────────────────────────────────────────────────────────────────────────
// Fault latch
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct FaultLatch {
    faulty: HashSet<&'static str>,
}

impl FaultLatch {
    fn observe<T>(
        &mut self,
        component: &'static str,
        result: Result<T, RoverError>,
        bus: &EventBus,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                if self.faulty.remove(component) {
                    info!(component, "component recovered");
                }
                Some(value)
            }
            Err(e) => {
                if self.faulty.insert(component) {
                    warn!(component, error = %e, "component fault; using safe default");
                    bus.publish_to(
                        Topic::SystemAlerts,
                        Event::new(
                            SOURCE,
                            EventPayload::HardwareFault {
                                component: component.to_string(),
                                message: e.to_string(),
                            },
                        ),
                    );
                } else {
                    debug!(component, error = %e, "component still faulty");
                }
                None
            }
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(s) = cause.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Counters returned when [`ControlLoop::run`] exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Ticks that took longer than the period.
    pub overruns: u64,
    /// Ticks abandoned because something inside them panicked.
    pub panics: u64,
}

pub struct ControlLoop {
    state: Arc<ControlState>,
    drive: SharedDriveBase,
    detector: SharedDetector,
    recorder: TelemetryRecorder,
    bus: EventBus,
    watchdog: Arc<Watchdog>,
    thermal_zone: Option<PathBuf>,
    period: Duration,
    last_line_state: LineState,
    last_commanded: i32,
    detection: DetectionSwitch,
    faults: FaultLatch,
}

impl ControlLoop {
    pub fn new(
        state: Arc<ControlState>,
        drive: SharedDriveBase,
        detector: SharedDetector,
        recorder: TelemetryRecorder,
        bus: EventBus,
        watchdog: Arc<Watchdog>,
    ) -> Self {
        let control = Self {
            state,
            drive,
            detector,
            recorder,
            bus,
            watchdog,
            thermal_zone: None,
            period: DEFAULT_TICK_PERIOD,
            last_line_state: LineState::Stop,
            last_commanded: 0,
            detection: DetectionSwitch::new(),
            faults: FaultLatch::default(),
        };
        control.register_watchdog();
        control
    }

    /// Tick period (builder-style).  A zero period is raised to 1 ms.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self.register_watchdog();
        self
    }

    /// Read the CPU temperature from this sysfs node each tick.
    pub fn with_thermal_zone(mut self, path: impl Into<PathBuf>) -> Self {
        self.thermal_zone = Some(path.into());
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn register_watchdog(&self) {
        self.watchdog
            .register(CONTROL_LOOP, self.period * WATCHDOG_PERIODS);
    }

    fn sense(&mut self) -> (SensorSample, DetectionTarget) {
        let (line, distance) = {
            let mut hw = self.drive.lock();
            (hw.read_line_sensors(), hw.read_distance())
        };
        let line = self
            .faults
            .observe("line_sensor", line, &self.bus)
            .unwrap_or([0, 0, 0]);
        let distance_cm = self
            .faults
            .observe("ultrasonic", distance, &self.bus)
            .unwrap_or(0.0);

        let cpu_temp_c = match &self.thermal_zone {
            Some(path) => self
                .faults
                .observe("thermal", thermal::read_cpu_temp(path), &self.bus)
                .unwrap_or(0.0),
            None => 0.0,
        };

        let detection = self.detector.lock().last_detection();
        let detection = self
            .faults
            .observe("detector", detection, &self.bus)
            .unwrap_or_default();

        (
            SensorSample {
                line,
                distance_cm,
                cpu_temp_c,
            },
            detection,
        )
    }

    fn switch_detectors(&mut self, face_detect: bool, color_detect: bool) {
        for command in self.detection.step(face_detect, color_detect) {
            let result = {
                let mut det = self.detector.lock();
                match command {
                    DetectionCommand::Face(on) => det.set_face_detection(on),
                    DetectionCommand::Color(target) => det.set_color_target(target),
                }
            };
            self.faults.observe("detector_switch", result, &self.bus);
        }
    }

    /// Run one tick at Unix time `now` and return the committed snapshot.
    pub fn tick(&mut self, now: f64) -> TelemetrySnapshot {
        let (inputs, thresholds) = self.state.snapshot();
        let (sample, detection) = self.sense();

        let decision = arbitrate(
            &inputs,
            &thresholds,
            &sample,
            &detection,
            self.last_line_state,
        );
        let (line_state, motion) = match decision {
            Ok(a) => {
                self.last_line_state = a.last_line_state;
                self.last_commanded = a.command.drive.signed_speed();
                let moved = apply_motion(&self.drive, &a.command);
                self.faults.observe("chassis", moved, &self.bus);
                let pointed = apply_camera(&self.drive, &a.camera);
                self.faults.observe("camera", pointed, &self.bus);
                debug!(policy = ?a.policy, motion = a.command.label.as_str(), "tick");
                (a.line_state, a.command.label)
            }
            Err(e) => {
                error!(error = %e, "control step failed; actuation skipped");
                (classify_line(sample.line), MotionLabel::Stop)
            }
        };

        self.switch_detectors(inputs.modes.face_detect, inputs.modes.color_detect);

        let distance = sample.distance_cm;
        let outcome = TickOutcome {
            timestamp: now,
            sample,
            line_state,
            motion,
            commanded_speed: self.last_commanded,
            obstacle_detected: distance > 0.0 && distance < f64::from(thresholds.safe_distance),
        };
        let snapshot = self.recorder.record(&self.state, &outcome);

        self.bus.publish_to(
            Topic::Telemetry,
            Event::new(SOURCE, EventPayload::Telemetry(snapshot)),
        );
        self.watchdog.heartbeat(CONTROL_LOOP);
        snapshot
    }

    /// Tick at the configured period until `shutdown` is set, then leave the
    /// hardware safe.
    pub fn run(&mut self, shutdown: &AtomicBool) -> LoopStats {
        info!(
            period_ms = self.period.as_millis() as u64,
            vehicle_id = self.recorder.vehicle_id(),
            "control loop started"
        );
        let mut stats = LoopStats::default();

        while !shutdown.load(Ordering::SeqCst) {
            let start = Instant::now();
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| self.tick(now_secs()))) {
                stats.panics += 1;
                self.report_panic(panic_message(cause.as_ref()));
            }
            stats.ticks += 1;

            let elapsed = start.elapsed();
            if elapsed < self.period {
                thread::sleep(self.period - elapsed);
            } else {
                stats.overruns += 1;
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    overruns = stats.overruns,
                    "tick overran its period"
                );
            }
        }

        self.park();
        info!(
            ticks = stats.ticks,
            overruns = stats.overruns,
            panics = stats.panics,
            "control loop stopped"
        );
        stats
    }

    /// The tick is abandoned where it panicked; hardware keeps whatever it
    /// was last told.
    fn report_panic(&self, message: String) {
        error!(panic = %message, "control tick panicked; loop continues");
        self.bus.publish_to(
            Topic::SystemAlerts,
            Event::new(
                SOURCE,
                EventPayload::HardwareFault {
                    component: CONTROL_LOOP.to_string(),
                    message: format!("tick panicked: {message}"),
                },
            ),
        );
    }

    /// Clear every input, halt the drive and close the color tracker.
    fn park(&mut self) {
        self.state.stop_all();
        if let Err(e) = self.drive.lock().halt() {
            error!(error = %e, "failed to halt drive base on shutdown");
        }
        if let Err(e) = self.detector.lock().set_color_target(ColorTarget::Close) {
            warn!(error = %e, "failed to close color tracker on shutdown");
        }
    }
}
