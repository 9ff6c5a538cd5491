//! Backend module for the device bridge
//!
//! This module runs the live session in a separate thread to keep the UI
//! responsive. It uses crossbeam channels for thread-safe communication
//! with the frontend.
//!
//! # Architecture
//!
//! The backend runs in a separate thread from the UI, communicating via channels:
//!
//! - [`BackendCommand`] - Messages sent from UI to backend (connect, capture, analyze, ...)
//! - [`BackendMessage`] - Messages sent from backend to UI (frames, readouts, state, errors)
//! - [`FrontendReceiver`] - UI-side handle for sending commands and receiving messages
//! - [`MonitorBackend`] - Main backend entry point that runs the worker loop
//!
//! # Components
//!
//! - [`DeviceBridge`] - Operations offered by the bridge server
//! - [`HttpBridge`] - reqwest client for the real bridge
//! - [`SimulatedBridge`] - In-process bridge for running without hardware (feature-gated)
//! - [`ConnectionManager`] - Connect/disconnect handshake, stream and session lifecycle
//! - [`BackendWorker`] - Main worker loop
//!
//! # Example
//!
//! ```ignore
//! use vibmon_rs::backend::{BackendMessage, MonitorBackend};
//! use vibmon_rs::config::AppConfig;
//!
//! let (backend, frontend) = MonitorBackend::new(AppConfig::default());
//! std::thread::spawn(move || backend.run());
//!
//! frontend.connect("COM3");
//! frontend.start_capture(30);
//!
//! for msg in frontend.drain() {
//!     if let BackendMessage::ChartFrame(frame) = msg {
//!         // Paint it
//!     }
//! }
//! ```

pub mod bridge;
pub mod connection;
pub mod http_bridge;
#[cfg(feature = "mock-bridge")]
pub mod mock_bridge;
pub mod worker;

pub use bridge::{ArmAck, BridgeStatus, DeviceBridge};
pub use connection::ConnectionManager;
pub use http_bridge::HttpBridge;
#[cfg(feature = "mock-bridge")]
pub use mock_bridge::{SimulatedBridge, SimulatedSignal, SIMULATED_PORT};
pub use worker::{BackendWorker, StreamEvent};

use crate::analysis::AnalysisReport;
use crate::chart::DisplayList;
use crate::config::AppConfig;
use crate::error::ErrorKind;
use crate::session::{CaptureSnapshot, StopReason};
use crate::stream::{StreamError, StreamTransport};
use crate::types::{ConnectionState, ConnectionStatus, DeviceInfo, MonitorReadout, Sample, StreamStats};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Message sent from the UI to the backend
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Ask the bridge for its serial ports
    RefreshDevices,
    /// Connect to a port and start streaming
    Connect {
        port_id: String,
    },
    /// Stop streaming and disconnect
    Disconnect,
    /// Open the stream again after it failed
    ReopenStream,
    /// Arm a capture of the given length
    StartCapture {
        duration_secs: u32,
    },
    /// Stop the running capture early
    StopCapture,
    /// Submit the stopped capture for analysis
    Analyze,
    /// Query bridge link statistics
    RequestStatus,
    /// Shutdown the backend
    Shutdown,
    /// Use the simulated bridge instead of HTTP (only available with mock-bridge feature)
    #[cfg(feature = "mock-bridge")]
    UseSimulatedBridge(bool),
}

/// Message sent from the backend to the UI
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Ports offered by the bridge
    DeviceList(Vec<DeviceInfo>),
    /// Transient link status (connecting, failed)
    ConnectionStatus(ConnectionStatus),
    /// Connection state after a connect or disconnect
    Connection(ConnectionState),
    /// Freshly rendered live chart
    ChartFrame(DisplayList),
    /// Monitor readouts after a sample
    Readout(MonitorReadout),
    /// Capture state changed or progressed
    Capture(CaptureSnapshot),
    /// Capture left `Capturing`
    CaptureStopped { reason: StopReason, samples: usize },
    /// Analysis request sent
    AnalysisStarted,
    /// Analysis result with the samples that were submitted
    AnalysisResult {
        report: Box<AnalysisReport>,
        samples: Vec<Sample>,
    },
    /// Bridge link statistics
    BridgeStatus(BridgeStatus),
    /// Stream counters
    StreamStats(StreamStats),
    /// The live stream failed or was closed by the server
    StreamFailed(StreamError),
    /// An operation failed
    Error { kind: ErrorKind, message: String },
    /// Backend is shutting down
    Shutdown,
}

/// Frontend receiver for backend messages
pub struct FrontendReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<BackendCommand>,
}

impl FrontendReceiver {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        self.receiver.try_iter().collect()
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: BackendCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn refresh_devices(&self) {
        let _ = self.command_sender.send(BackendCommand::RefreshDevices);
    }

    pub fn connect(&self, port_id: impl Into<String>) {
        let _ = self.command_sender.send(BackendCommand::Connect {
            port_id: port_id.into(),
        });
    }

    pub fn disconnect(&self) {
        let _ = self.command_sender.send(BackendCommand::Disconnect);
    }

    pub fn reopen_stream(&self) {
        let _ = self.command_sender.send(BackendCommand::ReopenStream);
    }

    pub fn start_capture(&self, duration_secs: u32) {
        let _ = self
            .command_sender
            .send(BackendCommand::StartCapture { duration_secs });
    }

    pub fn stop_capture(&self) {
        let _ = self.command_sender.send(BackendCommand::StopCapture);
    }

    pub fn analyze(&self) {
        let _ = self.command_sender.send(BackendCommand::Analyze);
    }

    pub fn request_status(&self) {
        let _ = self.command_sender.send(BackendCommand::RequestStatus);
    }

    /// Set whether to use the simulated bridge (only available with mock-bridge feature)
    #[cfg(feature = "mock-bridge")]
    pub fn use_simulated_bridge(&self, enabled: bool) {
        let _ = self
            .command_sender
            .send(BackendCommand::UseSimulatedBridge(enabled));
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(BackendCommand::Shutdown);
    }
}

/// Bridge implementation handed to the worker
pub type BridgePair = (Arc<dyn DeviceBridge>, Arc<dyn StreamTransport>);

/// The monitor backend that runs in a separate thread
pub struct MonitorBackend {
    /// Configuration
    config: AppConfig,
    /// Bridge to use instead of the configured HTTP bridge
    bridge: Option<BridgePair>,
    /// Receiver for commands from the UI
    command_receiver: Receiver<BackendCommand>,
    /// Sender for messages to the UI
    message_sender: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl MonitorBackend {
    /// Create a new backend with communication channels
    pub fn new(config: AppConfig) -> (Self, FrontendReceiver) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; frames and readouts use try_send and may be dropped
        let (msg_tx, msg_rx) = bounded(4096);

        let backend = Self {
            config,
            bridge: None,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        let frontend = FrontendReceiver {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Use `bridge` and `transport` instead of the HTTP bridge
    pub fn with_bridge(
        mut self,
        bridge: Arc<dyn DeviceBridge>,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        self.bridge = Some((bridge, transport));
        self
    }

    /// Run the backend loop
    pub fn run(self) {
        let (bridge, transport) = match self.bridge {
            Some(pair) => pair,
            None => match HttpBridge::new(self.config.server.clone()) {
                Ok(bridge) => {
                    let bridge = Arc::new(bridge);
                    (bridge.clone() as Arc<dyn DeviceBridge>, bridge as Arc<dyn StreamTransport>)
                }
                Err(e) => {
                    tracing::error!("Failed to create HTTP bridge: {}", e);
                    let _ = self.message_sender.send(BackendMessage::Error {
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    let _ = self.message_sender.send(BackendMessage::Shutdown);
                    return;
                }
            },
        };

        let mut worker = BackendWorker::new(
            self.config,
            bridge,
            transport,
            self.command_receiver,
            self.message_sender,
            self.running,
        );
        worker.run();
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
