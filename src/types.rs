//! Core data types for vibmon-rs
//!
//! This module contains the fundamental data structures shared by the
//! stream client, the live session and the UI.
//!
//! # Main Types
//!
//! - [`Sample`] - One decoded telemetry reading (RMS, peak, crest factor)
//! - [`DeviceInfo`] - A serial port offered by the bridge
//! - [`ConnectionState`] / [`ConnectionStatus`] - Device link state
//! - [`MonitorReadout`] - Formatted numeric readouts for the live monitor
//! - [`IncrementalStats`] - O(1) running min/max/mean
//! - [`StreamStats`] - Counters kept by the stream client
//!
//! # Raw values
//!
//! A [`Sample`] stores its fields exactly as decoded: a field missing from
//! the wire message stays `None`. Only readouts and the chart substitute `0`.

use serde::{Deserialize, Serialize};

/// Maximum number of samples kept in the live chart window
pub const MAX_CHART_POINTS: usize = 50;

/// One telemetry reading pushed by the device
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Arrival order within the current stream, assigned by the stream client
    #[serde(skip)]
    pub seq: u64,
    /// RMS amplitude (V)
    #[serde(default)]
    pub rms: Option<f64>,
    /// Peak amplitude (V)
    #[serde(default)]
    pub max: Option<f64>,
    /// Crest factor (peak / RMS)
    #[serde(default)]
    pub crest: Option<f64>,
    /// Minimum amplitude over the device window
    #[serde(default)]
    pub min: Option<f64>,
    /// Standard deviation over the device window
    #[serde(default)]
    pub std: Option<f64>,
}

impl Sample {
    /// Create a sample with the three primary metrics set
    pub fn new(rms: f64, max: f64, crest: f64) -> Self {
        Self {
            rms: Some(rms),
            max: Some(max),
            crest: Some(crest),
            ..Default::default()
        }
    }

    /// Set the arrival sequence number
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// RMS value, `0` when the device did not report it
    #[inline]
    pub fn rms_or_zero(&self) -> f64 {
        self.rms.unwrap_or(0.0)
    }

    /// Peak value, `0` when the device did not report it
    #[inline]
    pub fn max_or_zero(&self) -> f64 {
        self.max.unwrap_or(0.0)
    }

    /// Crest factor, `0` when the device did not report it
    #[inline]
    pub fn crest_or_zero(&self) -> f64 {
        self.crest.unwrap_or(0.0)
    }

    /// True if none of the metric fields were present
    pub fn is_empty(&self) -> bool {
        self.rms.is_none()
            && self.max.is_none()
            && self.crest.is_none()
            && self.min.is_none()
            && self.std.is_none()
    }
}

/// A serial port offered by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Port identifier (e.g. `COM3`, `/dev/ttyACM0`)
    pub id: String,
    /// Human readable description
    pub description: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.id, self.description)
    }
}

/// Status of the device link as shown in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No device connected
    #[default]
    Disconnected,
    /// Connect request in flight
    Connecting,
    /// Device connected and streaming
    Connected,
    /// Last connect attempt failed
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// Connection state owned by the connection manager
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    /// Whether a device link is live
    pub connected: bool,
    /// Port of the live link, empty when disconnected
    pub port_id: String,
    /// Status line shown to the user
    pub label: String,
}

impl ConnectionState {
    /// State after a successful connect to `port_id`
    pub fn connected(port_id: impl Into<String>) -> Self {
        let port_id = port_id.into();
        Self {
            connected: true,
            label: format!("Connected to {}", port_id),
            port_id,
        }
    }

    /// State after a disconnect
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            port_id: String::new(),
            label: "Disconnected".to_string(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        if self.connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

/// Numeric readouts of the live monitor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorReadout {
    /// Most recent sample, if any
    pub last: Option<Sample>,
    /// Samples received since the device was connected
    pub sample_count: usize,
}

impl MonitorReadout {
    pub fn rms_text(&self) -> String {
        format!("{:.4}", self.last.map(|s| s.rms_or_zero()).unwrap_or(0.0))
    }

    pub fn max_text(&self) -> String {
        format!("{:.4}", self.last.map(|s| s.max_or_zero()).unwrap_or(0.0))
    }

    pub fn crest_text(&self) -> String {
        format!("{:.2}", self.last.map(|s| s.crest_or_zero()).unwrap_or(0.0))
    }
}

/// Incremental statistics tracker
/// This allows O(1) updates for mean, min, and max without iterating all data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncrementalStats {
    /// Current count of values
    pub count: u64,
    /// Running sum for average calculation
    pub sum: f64,
    /// Current minimum value
    pub min: f64,
    /// Current maximum value
    pub max: f64,
}

impl Default for IncrementalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalStats {
    /// Create a new empty stats tracker
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Add a new value to the statistics
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Get the current average
    #[inline]
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Get statistics as (min, max, avg) tuple
    #[inline]
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        if self.count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (self.min, self.max, self.average())
        }
    }

    /// Reset the statistics
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Counters kept by the stream client for the status bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    /// SSE messages received
    pub messages: u64,
    /// Samples forwarded to subscribers
    pub samples: u64,
    /// Heartbeats consumed
    pub heartbeats: u64,
    /// Messages dropped because they failed to decode
    pub decode_failures: u64,
}
