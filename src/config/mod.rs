//! Configuration module for vibmon-rs
//!
//! This module handles application configuration:
//! - Bridge server address and endpoint paths
//! - Stream channel sizing
//! - Experiment capture defaults
//! - Live chart geometry and colours
//! - UI preferences
//!
//! # Config Location
//!
//! The configuration is stored as TOML in the platform-appropriate data
//! directory under `dev.vibmon.vibmon-rs`:
//!
//! - **Linux**: `~/.local/share/dev.vibmon.vibmon-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.vibmon.vibmon-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.vibmon.vibmon-rs\config.toml`
//!
//! Setting `VIBMON_CONFIG` to a file path overrides the location.
//!
//! # Example
//!
//! ```ignore
//! use vibmon_rs::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default();
//! config.server.base_url = "http://192.168.1.20:5000".to_string();
//! config.save_default()?;
//! ```

use crate::error::{Result, VibMonError};
use crate::types::MAX_CHART_POINTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.vibmon.vibmon-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "VIBMON_CONFIG";

/// Default bridge address (the Flask development server)
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default timeout for one-shot bridge requests in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default experiment duration, matching the bridge's own default
pub const DEFAULT_CAPTURE_SECS: u32 = 30;

/// Lower bound of the chart's vertical scale
pub const DEFAULT_SCALE_FLOOR: f64 = 0.1;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        VibMonError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            VibMonError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Path of the config file, honouring `VIBMON_CONFIG`
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => app_data_dir().map(|p| p.join(CONFIG_FILE)),
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Bridge server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Live stream settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Experiment capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Live chart settings
    #[serde(default)]
    pub chart: ChartConfig,

    /// UI settings
    #[serde(default)]
    pub ui: UiConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| VibMonError::Config(format!("Failed to read {:?}: {}", path, e)))?;

        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| VibMonError::Config(format!("Failed to parse {:?}: {}", path, e)))?;

        for warning in config.sanitize() {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VibMonError::Serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), content)
            .map_err(|e| VibMonError::Config(format!("Failed to write config: {}", e)))
    }

    /// Save to the default location
    pub fn save_default(&self) -> Result<()> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => ensure_app_data_dir()?.join(CONFIG_FILE),
        };
        self.save(path)
    }

    /// Replace out-of-range values with defaults, returning one warning per fix
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.chart.window_capacity < 2 {
            warnings.push(format!(
                "chart.window_capacity {} is below 2, using {}",
                self.chart.window_capacity, MAX_CHART_POINTS
            ));
            self.chart.window_capacity = MAX_CHART_POINTS;
        }
        if !(self.chart.scale_floor > 0.0) {
            warnings.push(format!(
                "chart.scale_floor {} must be positive, using {}",
                self.chart.scale_floor, DEFAULT_SCALE_FLOOR
            ));
            self.chart.scale_floor = DEFAULT_SCALE_FLOOR;
        }
        if self.capture.default_duration_secs == 0 {
            warnings.push(format!(
                "capture.default_duration_secs must be positive, using {}",
                DEFAULT_CAPTURE_SECS
            ));
            self.capture.default_duration_secs = DEFAULT_CAPTURE_SECS;
        }
        if self.stream.channel_capacity == 0 {
            warnings.push("stream.channel_capacity must be positive, using 1024".to_string());
            self.stream.channel_capacity = 1024;
        }

        warnings
    }
}

// ==================== Server Config ====================

/// Bridge server connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Base URL of the bridge, without trailing slash
    pub base_url: String,

    /// Timeout for one-shot requests in milliseconds (not applied to the stream)
    pub request_timeout_ms: u64,

    /// Endpoint paths
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Join the base URL with an endpoint path
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Full URL of the live stream
    pub fn stream_url(&self) -> String {
        self.url(&self.endpoints.stream)
    }
}

/// Endpoint paths exposed by the bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub devices: String,
    pub connect: String,
    pub disconnect: String,
    pub status: String,
    pub stream: String,
    pub arm_capture: String,
    pub analyze: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            devices: "/arduino/puertos".to_string(),
            connect: "/arduino/conectar".to_string(),
            disconnect: "/arduino/desconectar".to_string(),
            status: "/arduino/estado".to_string(),
            stream: "/arduino/stream".to_string(),
            arm_capture: "/arduino/iniciar_experimento".to_string(),
            analyze: "/arduino/analizar_experimento".to_string(),
        }
    }
}

// ==================== Stream Config ====================

/// Live stream settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Capacity of the channel between the stream reader and the worker
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

// ==================== Capture Config ====================

/// Experiment capture settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Duration pre-filled in the experiment panel
    pub default_duration_secs: u32,

    /// Ask the bridge to export the captured data on analysis
    pub persist_data: bool,

    /// Submit the capture for analysis as soon as it stops
    pub auto_analyze: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: DEFAULT_CAPTURE_SECS,
            persist_data: true,
            auto_analyze: false,
        }
    }
}

// ==================== Chart Config ====================

/// Live chart geometry and colours
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartConfig {
    /// Rolling window capacity (W)
    pub window_capacity: usize,
    /// Surface width in pixels
    pub width: f32,
    /// Surface height in pixels
    pub height: f32,
    /// Padding on every side
    pub padding: f32,
    /// Number of horizontal grid divisions
    pub grid_divisions: usize,
    /// Lower bound of the vertical scale divisor
    pub scale_floor: f64,
    pub background: [u8; 4],
    pub grid_color: [u8; 4],
    pub line_color: [u8; 4],
    pub grid_width: f32,
    pub line_width: f32,
    /// Series label drawn above the plot area
    pub label: String,
    pub label_size: f32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            window_capacity: MAX_CHART_POINTS,
            width: 400.0,
            height: 150.0,
            padding: 20.0,
            grid_divisions: 5,
            scale_floor: DEFAULT_SCALE_FLOOR,
            background: [0xf8, 0xf9, 0xfa, 0xff],
            grid_color: [0xe0, 0xe0, 0xe0, 0xff],
            line_color: [0x34, 0x98, 0xdb, 0xff],
            grid_width: 1.0,
            line_width: 2.0,
            label: "RMS (V)".to_string(),
            label_size: 10.0,
        }
    }
}

// ==================== UI Config ====================

/// UI preferences
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    /// Enable dark mode
    pub dark_mode: bool,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            dark_mode: false,
            window_width: 1100.0,
            window_height: 760.0,
        }
    }
}

// ==================== Tests ====================
