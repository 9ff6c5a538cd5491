//! UI-side state fed by backend messages.
//!
//! `MonitorState` is a plain data bus: the app writes to it from
//! `process_backend_messages()` and the panels read it directly.

use crate::analysis::AnalysisReport;
use crate::backend::{BackendMessage, BridgeStatus};
use crate::chart::DisplayList;
use crate::error::ErrorKind;
use crate::session::CaptureSnapshot;
use crate::types::{
    ConnectionState, ConnectionStatus, DeviceInfo, MonitorReadout, Sample, StreamStats,
};

/// Last error shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct UiError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything the panels render
#[derive(Debug, Default)]
pub struct MonitorState {
    // --- Device link ---
    /// Ports offered by the bridge
    pub devices: Vec<DeviceInfo>,
    /// Port picked in the combo box
    pub selected_port: String,
    /// Status dot
    pub connection_status: ConnectionStatus,
    /// Label and port of the current connection
    pub connection: ConnectionState,

    // --- Live data (high frequency) ---
    /// Most recent chart frame
    pub chart: Option<DisplayList>,
    pub readout: MonitorReadout,
    pub stream_stats: StreamStats,
    /// Set when the stream failed while connected
    pub stream_failure: Option<String>,

    // --- Experiment ---
    pub capture: CaptureSnapshot,
    /// Duration entered in the experiment panel
    pub capture_duration_secs: u32,
    /// Analysis request in flight
    pub analyzing: bool,
    pub report: Option<AnalysisReport>,
    /// Samples submitted with the current report
    pub analyzed_samples: Vec<Sample>,

    // --- Status ---
    pub bridge_status: Option<BridgeStatus>,
    pub last_error: Option<UiError>,
    /// Backend thread has exited
    pub backend_stopped: bool,
}

impl MonitorState {
    pub fn new(default_duration_secs: u32) -> Self {
        Self {
            capture_duration_secs: default_duration_secs,
            ..Default::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    /// A new capture can be started
    pub fn can_start_capture(&self) -> bool {
        self.is_connected()
            && !self.analyzing
            && !self.capture.state.is_active()
            && self.capture_duration_secs > 0
    }

    pub fn can_stop_capture(&self) -> bool {
        self.is_connected() && self.capture.state.is_active()
    }

    /// Analysis may be requested for the frozen capture
    pub fn can_analyze(&self) -> bool {
        self.is_connected()
            && !self.analyzing
            && self.capture.state.is_stopped()
            && self.capture.captured > 0
    }

    /// Apply one backend message
    pub fn apply(&mut self, msg: BackendMessage) {
        match msg {
            BackendMessage::DeviceList(devices) => {
                tracing::debug!("Received {} ports", devices.len());
                let selected_missing = !devices.iter().any(|d| d.id == self.selected_port);
                if selected_missing {
                    self.selected_port = devices
                        .first()
                        .map(|d| d.id.clone())
                        .unwrap_or_default();
                }
                self.devices = devices;
            }
            BackendMessage::ConnectionStatus(status) => {
                self.connection_status = status;
            }
            BackendMessage::Connection(state) => {
                self.connection_status = state.status();
                if state.connected {
                    self.selected_port = state.port_id.clone();
                    self.last_error = None;
                } else {
                    self.chart = None;
                    self.capture = CaptureSnapshot::default();
                    self.analyzing = false;
                    self.bridge_status = None;
                }
                self.stream_failure = None;
                self.connection = state;
            }
            BackendMessage::ChartFrame(frame) => {
                self.chart = Some(frame);
            }
            BackendMessage::Readout(readout) => {
                self.readout = readout;
            }
            BackendMessage::Capture(snapshot) => {
                if snapshot.state.is_active() {
                    self.report = None;
                    self.analyzed_samples.clear();
                }
                self.capture = snapshot;
            }
            BackendMessage::CaptureStopped { reason, samples } => {
                tracing::info!("Capture stopped ({:?}) with {} samples", reason, samples);
            }
            BackendMessage::AnalysisStarted => {
                self.analyzing = true;
            }
            BackendMessage::AnalysisResult { report, samples } => {
                self.analyzing = false;
                self.report = Some(*report);
                self.analyzed_samples = samples;
            }
            BackendMessage::BridgeStatus(status) => {
                self.bridge_status = Some(status);
            }
            BackendMessage::StreamStats(stats) => {
                self.stream_stats = stats;
            }
            BackendMessage::StreamFailed(err) => {
                self.stream_failure = Some(err.to_string());
            }
            BackendMessage::Error { kind, message } => {
                if self.connection_status == ConnectionStatus::Connecting {
                    self.connection_status = ConnectionStatus::Error;
                }
                self.analyzing = false;
                self.last_error = Some(UiError { kind, message });
            }
            BackendMessage::Shutdown => {
                tracing::info!("Backend shutdown received");
                self.backend_stopped = true;
            }
        }
    }
}
