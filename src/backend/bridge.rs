//! DeviceBridge trait for the device-side server
//!
//! The sensor is reached through a bridge server that owns the serial link.
//! This trait is the seam between the worker and that server, so the real
//! HTTP client and the simulated bridge are interchangeable.

use crate::analysis::AnalysisReport;
use crate::error::Result;
use crate::types::DeviceInfo;
use serde::{Deserialize, Serialize};

/// Capture request accepted by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmAck {
    #[serde(rename = "mensaje", default)]
    pub message: String,
    #[serde(rename = "duracion")]
    pub duration_secs: u32,
}

/// Link statistics reported by the bridge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeStatus {
    #[serde(rename = "conectado")]
    pub connected: bool,
    #[serde(rename = "puerto")]
    pub port: Option<String>,
    #[serde(rename = "capturando")]
    pub capturing: bool,
    #[serde(rename = "paquetes_recibidos")]
    pub packets_received: u64,
    #[serde(rename = "paquetes_perdidos")]
    pub packets_lost: u64,
    #[serde(rename = "buffer_size")]
    pub queued: u64,
    /// Percentage of lost packets
    #[serde(rename = "tasa_perdida")]
    pub loss_rate: f64,
}

impl std::fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.connected {
            return write!(f, "Bridge: no device");
        }
        write!(
            f,
            "Bridge: {} | {} received, {} lost ({:.1}%)",
            self.port.as_deref().unwrap_or("?"),
            self.packets_received,
            self.packets_lost,
            self.loss_rate
        )?;
        if self.capturing {
            write!(f, " | capturing")?;
        }
        Ok(())
    }
}

/// Operations offered by the bridge server
#[cfg_attr(test, mockall::automock)]
pub trait DeviceBridge: Send + Sync {
    /// Serial ports the bridge can open
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Open the device on `port_id`; returns the port the bridge reports
    fn connect(&self, port_id: &str) -> Result<String>;

    /// Close the device link
    fn disconnect(&self) -> Result<()>;

    /// Link statistics
    fn status(&self) -> Result<BridgeStatus>;

    /// Ask the bridge to record the next `duration_secs` seconds
    fn arm_capture(&self, duration_secs: u32) -> Result<ArmAck>;

    /// Analyze the recorded capture; `persist_data` asks the server to keep it
    fn analyze(&self, persist_data: bool) -> Result<AnalysisReport>;
}
