//! # vibmon-rs: live vibration telemetry monitor
//!
//! A desktop client for a vibration-analysis bridge. The bridge is an HTTP
//! server wired to a microcontroller with an accelerometer: it lists serial
//! ports, connects to one, pushes telemetry samples over a server-sent event
//! stream and analyzes timed captures.
//!
//! ## Architecture
//!
//! - **Stream**: SSE framing, sample decoding and heartbeat filtering on a reader thread
//! - **Session**: bounded rolling window of samples plus the capture state machine
//! - **Chart**: stateless renderer that redraws the live chart on every push
//! - **Backend**: worker thread owning the connection, session and countdown
//! - **Frontend**: eframe/egui application with egui_plot for the captured series
//! - **Communication**: crossbeam channels between the worker and the UI
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform data directory under
//! `dev.vibmon.vibmon-rs`, or at the path named by `VIBMON_CONFIG`:
//!
//! - **Linux**: `~/.local/share/dev.vibmon.vibmon-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.vibmon.vibmon-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.vibmon.vibmon-rs\config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use vibmon_rs::{backend::MonitorBackend, config::AppConfig, frontend::MonitorApp};
//!
//! fn main() -> eframe::Result<()> {
//!     let config = AppConfig::load_or_default();
//!     let (backend, frontend_receiver) = MonitorBackend::new(config.clone());
//!
//!     std::thread::spawn(move || backend.run());
//!
//!     eframe::run_native(
//!         "Vibration Monitor",
//!         eframe::NativeOptions::default(),
//!         Box::new(|cc| Ok(Box::new(MonitorApp::new(cc, frontend_receiver, config)))),
//!     )
//! }
//! ```

pub mod analysis;
pub mod app;
pub mod backend;
pub mod chart;
pub mod config;
pub mod error;
pub mod frontend;
pub mod session;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use analysis::AnalysisReport;
pub use app::MonitorApp;
pub use backend::{BackendCommand, BackendMessage, DeviceBridge, MonitorBackend};
pub use chart::{DisplayList, LiveChartRenderer};
pub use config::AppConfig;
pub use error::{Result, VibMonError};
pub use session::{CaptureController, CaptureState, LiveSession, SampleBuffer};
pub use stream::{StreamClient, StreamTransport};
pub use types::{ConnectionState, DeviceInfo, Sample};
