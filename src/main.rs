//! Vibration Monitor - Main Entry Point
//!
//! Desktop client for the vibration bridge: live telemetry, timed experiment
//! capture and server-side analysis.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vibmon_rs::{
    backend::MonitorBackend,
    config::{self, AppConfig},
    frontend::MonitorApp,
};

const APP_NAME: &str = "Vibration Monitor";

fn main() -> anyhow::Result<()> {
    // Log to stdout, and to a daily file when the data directory is usable
    let file_appender = config::ensure_app_data_dir()
        .ok()
        .map(|dir| tracing_appender::rolling::daily(dir.join("logs"), "vibmon.log"));
    let (file_writer, _log_guard) = match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vibmon_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    tracing::info!("Starting {}", APP_NAME);

    let mut config = AppConfig::load_or_default();
    for warning in config.sanitize() {
        tracing::warn!("{}", warning);
    }
    tracing::info!("Bridge server: {}", config.server.base_url);

    // Spawn the backend worker
    let (backend, frontend) = MonitorBackend::new(config.clone());
    let stop_handle = backend.stop_handle();
    let backend_handle = std::thread::Builder::new()
        .name("vibmon-backend".to_string())
        .spawn(move || backend.run())
        .context("failed to spawn backend thread")?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.ui.window_width, config.ui.window_height])
            .with_min_inner_size([640.0, 480.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    let dark_mode = config.ui.dark_mode;
    let result = eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |cc| {
            if dark_mode {
                cc.egui_ctx.set_visuals(egui::Visuals::dark());
            } else {
                cc.egui_ctx.set_visuals(egui::Visuals::light());
            }
            Ok(Box::new(MonitorApp::new(cc, frontend, config)))
        }),
    );

    // Signal backend to stop and wait for it
    tracing::info!("Shutting down...");
    stop_handle.store(false, std::sync::atomic::Ordering::SeqCst);
    if backend_handle.join().is_err() {
        tracing::error!("Backend thread panicked");
    }

    result.map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
