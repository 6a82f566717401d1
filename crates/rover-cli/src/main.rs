//! `rover` – process entry point for the rover core.
//!
//! Startup order:
//!
//! 1. Tracing, banner, `~/.rover/config.toml` (written with defaults on first
//!    run) and `ROVER_*` overrides.
//! 2. Telemetry database, drive base, detector, horn, event bus, watchdog.
//! 3. The control loop on its own OS thread.
//! 4. The cockpit HTTP/WebSocket server on a Tokio runtime.
//!
//! **Ctrl-C** raises a shared shutdown flag.  The server stops accepting, the
//! control loop finishes its tick and parks the hardware (motors halted,
//! colour detection closed) before the process exits.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use rover_cockpit::{AppContext, CockpitServer};
use rover_hal::{CommandHorn, SimDetector, SimDriveBase, detector, drive};
use rover_kernel::{ControlState, Watchdog};
use rover_memory::{HistoryService, TelemetryLog, TelemetryStore};
use rover_middleware::EventBus;
use rover_runtime::telemetry::init_tracing;
use rover_runtime::{ControlLoop, TelemetryRecorder};
use rover_types::SafetyThresholds;

fn main() -> ExitCode {
    let _tracing = init_tracing("rover");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – parking the rover …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; the rover can only be stopped over HTTP"
        );
    }

    let cfg = load_config();

    // ── Telemetry database ────────────────────────────────────────────────
    let log = match open_store(&cfg) {
        Some(log) => log,
        None => return ExitCode::FAILURE,
    };

    // ── Hardware ──────────────────────────────────────────────────────────
    warn!("no chassis driver linked; driving the simulated drive base");
    let drive = drive::shared(SimDriveBase::new());
    let detector = detector::shared(SimDetector::new());
    let horn = Arc::new(CommandHorn::new(&cfg.horn_sound));

    let state = Arc::new(ControlState::new(SafetyThresholds::default()));
    let bus = EventBus::default();
    let watchdog = Arc::new(Watchdog::new());

    // ── Control loop ──────────────────────────────────────────────────────
    let recorder = TelemetryRecorder::new(cfg.vehicle_id.clone(), Some(log.clone()));
    let mut control = ControlLoop::new(
        state.clone(),
        drive.clone(),
        detector,
        recorder,
        bus.clone(),
        watchdog.clone(),
    )
    .with_period(Duration::from_millis(cfg.tick_period_ms))
    .with_thermal_zone(&cfg.cpu_temp_path);

    let loop_flag = shutdown.clone();
    let control_thread = match thread::Builder::new()
        .name("control-loop".to_string())
        .spawn(move || control.run(&loop_flag))
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "failed to spawn control loop thread");
            return ExitCode::FAILURE;
        }
    };

    // ── Cockpit server ────────────────────────────────────────────────────
    let ctx = AppContext {
        state,
        drive,
        horn,
        history: HistoryService::new(log),
        bus,
        watchdog,
    };

    let mut code = ExitCode::SUCCESS;
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => {
            let server = CockpitServer::new(ctx).with_port(cfg.http_port);
            println!(
                "  Cockpit listening on {}\n",
                format!("http://0.0.0.0:{}", server.port()).bold()
            );
            if let Err(e) = rt.block_on(server.run_until(wait_for(shutdown.clone()))) {
                error!(error = %e, "cockpit server stopped");
                code = ExitCode::FAILURE;
            }
        }
        Err(e) => {
            error!(error = %e, "failed to build Tokio runtime");
            code = ExitCode::FAILURE;
        }
    }

    // Whatever ended the server also ends the control loop.
    shutdown.store(true, Ordering::SeqCst);
    match control_thread.join() {
        Ok(stats) => info!(
            ticks = stats.ticks,
            overruns = stats.overruns,
            panics = stats.panics,
            "control loop stopped"
        ),
        Err(_) => {
            error!("control loop thread panicked");
            code = ExitCode::FAILURE;
        }
    }

    println!("{}", "  ✓ Rover parked.".green());
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> config::Config {
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg
}

/// Open the on-disk store, falling back to an in-memory one so the rover can
/// still drive when the database is unavailable.
fn open_store(cfg: &config::Config) -> Option<Arc<dyn TelemetryLog>> {
    if let Some(parent) = cfg.database_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "cannot create database directory");
    }

    match TelemetryStore::open(&cfg.database_path) {
        Ok(store) => {
            info!(path = %cfg.database_path.display(), "telemetry database opened");
            Some(Arc::new(store) as Arc<dyn TelemetryLog>)
        }
        Err(e) => {
            error!(
                path = %cfg.database_path.display(),
                error = %e,
                "telemetry database unavailable; history will not survive a restart"
            );
            match TelemetryStore::open_in_memory() {
                Ok(store) => Some(Arc::new(store) as Arc<dyn TelemetryLog>),
                Err(e) => {
                    error!(error = %e, "in-memory telemetry store failed");
                    None
                }
            }
        }
    }
}

async fn wait_for(flag: Arc<AtomicBool>) {
    while !flag.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                       "#.bold().cyan());
    println!("{}", r#"  / __ \____ _   _____  _____ "#.bold().cyan());
    println!("{}", r#" / /_/ / __ \ | / / _ \/ ___/ "#.bold().cyan());
    println!("{}", r#"/ _, _/ /_/ / |/ /  __/ /     "#.bold().cyan());
    println!("{}", r#"/_/ |_|\____/|___/\___/_/      "#.bold().cyan());
    println!();
    println!("  {}", "Rover control core".dimmed());
    println!();
}
