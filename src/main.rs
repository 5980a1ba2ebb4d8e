#![forbid(unsafe_code)]

mod app;
mod autostart;
mod config;
mod constants;
mod discovery;
mod engine;
mod guard;
mod hotkeys;
mod registry;
mod types;
mod winsys;
mod x11_utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;

use app::{App, Flow};
use config::Settings;
use constants::timing;
use hotkeys::Bindings;
use winsys::WindowSystem;
use x11_utils::X11WindowSystem;

/// Overlay or tile an IDE and a browser by managing window opacity,
/// click-through and layout.
#[derive(Debug, Parser)]
#[command(name = "glasspair", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Delete the saved configuration and start from defaults
    #[arg(long)]
    reset_config: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let log_level = if debug {
        TraceLevel::DEBUG
    } else {
        match std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => TraceLevel::TRACE,
            "debug" => TraceLevel::DEBUG,
            "warn" => TraceLevel::WARN,
            "error" => TraceLevel::ERROR,
            _ => TraceLevel::INFO,
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install logging subscriber")?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.reset_config {
        let path = Settings::config_path();
        if path.exists() {
            std::fs::remove_file(&path)
                .context(format!("Failed to delete config file {}", path.display()))?;
            info!(path = %path.display(), "configuration reset");
        }
    }

    let settings = Settings::load();
    autostart::sync(settings.auto_start);

    let win = X11WindowSystem::connect()?;
    let (width, height) = win.primary_screen_size();
    info!(width = width, height = height, "connected to X11");

    // Hotkey threads only produce events; all state changes happen on this
    // thread, serialized through the channel
    let bindings = Bindings::from_settings(&settings);
    let (hotkey_tx, hotkey_rx) = mpsc::channel();
    let _hotkey_handles = if bindings.is_empty() {
        info!("no usable hotkey bindings, running without hotkeys");
        None
    } else if hotkeys::check_permissions() {
        match hotkeys::spawn_listener(bindings, hotkey_tx) {
            Ok(handles) => Some(handles),
            Err(e) => {
                error!(error = %e, "Failed to start hotkey listener");
                hotkeys::print_permission_error();
                None
            }
        }
    } else {
        hotkeys::print_permission_error();
        None
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))
            .context("Failed to register SIGINT handler")?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&interrupted))
            .context("Failed to register SIGTERM handler")?;
    }

    let mut app = App::new(win, settings);
    app.startup();

    let mut last_validity = Instant::now();
    let mut last_guard = Instant::now();

    loop {
        if interrupted.load(Ordering::Relaxed) {
            info!("interrupt received, shutting down");
            break;
        }

        match hotkey_rx.recv_timeout(timing::EVENT_POLL) {
            Ok(action) => {
                if app.dispatch(action) == Flow::Exit {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // No hotkey threads; keep running on timers alone
                std::thread::sleep(timing::EVENT_POLL);
            }
        }

        if last_validity.elapsed() >= timing::VALIDITY_CHECK {
            app.validity_tick();
            last_validity = Instant::now();
        }
        if last_guard.elapsed() >= timing::GUARD_TICK {
            app.guard_tick();
            last_guard = Instant::now();
        }
    }

    app.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.debug) {
        eprintln!("failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "startup error");
            ExitCode::FAILURE
        }
    }
}
