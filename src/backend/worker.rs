//! Backend Worker Thread Implementation
//!
//! The worker owns the connection manager and, through it, the live session.
//! It is the single writer of the rolling window and of the captured
//! samples. Three sources feed it, each handled one item at a time:
//!
//! - **UI commands** arriving on the command channel
//! - **Stream events** sent by the stream reader thread's callbacks
//! - **Countdown ticks**, due once per second while a capture runs
//!
//! Samples keep their arrival order from the reader thread into the session
//! because the stream callback only forwards them over a channel.
//!
//! Everything the UI shows (chart frames, readouts, capture state, analysis
//! results, errors) is sent back as [`BackendMessage`]s.

use crate::analysis::AnalysisReport;
use crate::backend::bridge::DeviceBridge;
use crate::backend::connection::ConnectionManager;
use crate::backend::{BackendCommand, BackendMessage};
use crate::chart::{ChartPublisher, LiveChartRenderer};
use crate::config::AppConfig;
use crate::error::{Result, ResultExt, VibMonError};
use crate::session::{LiveSession, StopReason, TickOutcome};
use crate::stream::{StreamError, StreamTransport};
use crate::types::{ConnectionStatus, Sample};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Countdown resolution
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest the loop sleeps without work
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Interval between stream statistics updates
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound of stream events handled per loop iteration
const MAX_EVENTS_PER_ITERATION: usize = 256;

/// Event forwarded from the stream reader thread
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Sample(Sample),
    Failed(StreamError),
}

/// The backend worker that runs the session loop
pub struct BackendWorker {
    /// Application configuration
    config: AppConfig,
    /// Command receiver from the UI
    command_rx: Receiver<BackendCommand>,
    /// Message sender to the UI
    message_tx: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Device link, stream and live session
    connection: ConnectionManager,
    /// Producer side handed to stream callbacks
    stream_tx: Sender<StreamEvent>,
    stream_rx: Receiver<StreamEvent>,
    /// Renderer for frames not triggered by a push (cleared window)
    renderer: LiveChartRenderer,
    /// When the next countdown tick is due
    next_tick: Option<Instant>,
    /// Last time stream statistics were sent
    last_stats_time: Instant,
    /// Messages dropped because the UI queue was full
    dropped_messages: u64,
    /// Whether the simulated bridge is in use (only with mock-bridge feature)
    #[cfg(feature = "mock-bridge")]
    is_simulated: bool,
}

impl BackendWorker {
    /// Create a new backend worker talking to `bridge`
    pub fn new(
        config: AppConfig,
        bridge: Arc<dyn DeviceBridge>,
        transport: Arc<dyn StreamTransport>,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (stream_tx, stream_rx) = bounded(config.stream.channel_capacity.max(1));
        let renderer = LiveChartRenderer::new(config.chart.clone());
        let connection =
            build_connection(&config, bridge, transport, &stream_tx, &message_tx);

        Self {
            config,
            command_rx,
            message_tx,
            running,
            connection,
            stream_tx,
            stream_rx,
            renderer,
            next_tick: None,
            last_stats_time: Instant::now(),
            dropped_messages: 0,
            #[cfg(feature = "mock-bridge")]
            is_simulated: false,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Backend worker started");

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();
            self.process_stream_events();
            self.process_tick();

            if self.connection.is_connected() && self.last_stats_time.elapsed() >= STATS_INTERVAL
            {
                self.send_stats();
                self.last_stats_time = Instant::now();
            }

            self.wait_for_work();
        }

        if self.connection.is_connected() {
            if let Err(e) = self.connection.disconnect() {
                tracing::warn!("Disconnect during shutdown failed: {}", e);
            }
        }

        let _ = self.message_tx.send(BackendMessage::Shutdown);
        tracing::info!("Backend worker stopped");
    }

    /// Block until a command or stream event arrives, or the next tick is due
    fn wait_for_work(&mut self) {
        let timeout = self
            .next_tick
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT);

        let commands = self.command_rx.clone();
        let events = self.stream_rx.clone();
        crossbeam_channel::select! {
            recv(commands) -> cmd => match cmd {
                Ok(cmd) => self.handle_command(cmd),
                Err(_) => self.running.store(false, Ordering::SeqCst),
            },
            recv(events) -> event => {
                if let Ok(event) = event {
                    self.handle_stream_event(event);
                }
            },
            default(timeout) => {}
        }
    }

    /// Process pending commands from the UI
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Process events queued by the stream reader
    fn process_stream_events(&mut self) {
        for _ in 0..MAX_EVENTS_PER_ITERATION {
            match self.stream_rx.try_recv() {
                Ok(event) => self.handle_stream_event(event),
                Err(_) => break,
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: BackendCommand) {
        match cmd {
            BackendCommand::RefreshDevices => self.refresh_devices(),
            BackendCommand::Connect { port_id } => self.handle_connect(&port_id),
            BackendCommand::Disconnect => self.handle_disconnect(),
            BackendCommand::ReopenStream => {
                if self.connection.reopen_stream().is_none() {
                    self.report_error(VibMonError::Rejected(
                        "connect a device first".to_string(),
                    ));
                }
            }
            BackendCommand::StartCapture { duration_secs } => self.start_capture(duration_secs),
            BackendCommand::StopCapture => self.stop_capture(),
            BackendCommand::Analyze => self.analyze(),
            BackendCommand::RequestStatus => match self.connection.bridge().status() {
                Ok(status) => self.send(BackendMessage::BridgeStatus(status)),
                Err(e) => self.report_error(e),
            },
            BackendCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
            #[cfg(feature = "mock-bridge")]
            BackendCommand::UseSimulatedBridge(enabled) => self.use_simulated_bridge(enabled),
        }
    }

    fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Sample(sample) => {
                let Some(session) = self.connection.session_mut() else {
                    tracing::trace!("Sample after teardown ignored");
                    return;
                };
                let captured = session.ingest(sample);
                let readout = session.readout();
                let snapshot = captured.then(|| session.capture_snapshot());

                self.try_send(BackendMessage::Readout(readout));
                if let Some(snapshot) = snapshot {
                    self.try_send(BackendMessage::Capture(snapshot));
                }
            }
            StreamEvent::Failed(error) => {
                if !self.connection.is_connected() {
                    return;
                }
                tracing::warn!("{}", error);
                self.send(BackendMessage::StreamFailed(error));
            }
        }
    }

    /// Advance the countdown if a tick is due
    fn process_tick(&mut self) {
        let Some(due) = self.next_tick else {
            return;
        };
        if Instant::now() < due {
            return;
        }
        self.next_tick = None;

        let outcome = match self.connection.session_mut() {
            Some(session) => session.tick(),
            None => TickOutcome::Idle,
        };
        match outcome {
            TickOutcome::Counting { .. } => {
                self.next_tick = Some(due + TICK_INTERVAL);
                self.send_capture();
            }
            TickOutcome::Stopped => self.capture_stopped(StopReason::Elapsed),
            TickOutcome::Idle => {}
        }
    }

    fn refresh_devices(&mut self) {
        match self.connection.list_devices() {
            Ok(devices) => self.send(BackendMessage::DeviceList(devices)),
            Err(e) => self.report_error(e),
        }
    }

    /// Handle connect command
    fn handle_connect(&mut self, port_id: &str) {
        self.send(BackendMessage::ConnectionStatus(ConnectionStatus::Connecting));
        self.drain_stale_events();

        match self.connection.connect(port_id) {
            Ok(_) => {
                self.last_stats_time = Instant::now();
                self.send(BackendMessage::Connection(self.connection.state().clone()));
                self.send_capture();
                self.publish_chart();
            }
            Err(e) => {
                self.send(BackendMessage::ConnectionStatus(ConnectionStatus::Error));
                self.report_error(e.with_context("Failed to connect"));
            }
        }
    }

    /// Handle disconnect command
    fn handle_disconnect(&mut self) {
        self.next_tick = None;
        let result = self.connection.disconnect();
        self.drain_stale_events();

        self.send(BackendMessage::Connection(self.connection.state().clone()));
        self.send(BackendMessage::Readout(Default::default()));
        self.send(BackendMessage::ChartFrame(self.renderer.render_frame(
            &crate::session::SampleBuffer::new(self.config.chart.window_capacity),
        )));
        if let Err(e) = result {
            self.report_error(e.with_context("Bridge disconnect failed"));
        }
    }

    /// Arm a capture on the bridge and start the countdown
    fn start_capture(&mut self, duration_secs: u32) {
        let started = match self.connection.session_mut() {
            Some(session) => session.start_capture(duration_secs),
            None => Err(VibMonError::Rejected("connect a device first".to_string())),
        };
        if let Err(e) = started {
            self.report_error(e);
            return;
        }
        self.send_capture();

        let ack = self
            .connection
            .bridge()
            .arm_capture(duration_secs)
            .context("Failed to start capture");
        let Some(session) = self.connection.session_mut() else {
            return;
        };
        match ack {
            Ok(ack) => {
                if session.capture_mut().acknowledge().is_some() {
                    tracing::info!("Bridge: {}", ack.message);
                    self.next_tick = Some(Instant::now() + TICK_INTERVAL);
                }
                self.send_capture();
            }
            Err(e) => {
                session.capture_mut().arm_failed();
                self.send_capture();
                self.report_error(e);
            }
        }
    }

    /// Explicit stop request from the UI
    fn stop_capture(&mut self) {
        let Some(session) = self.connection.session_mut() else {
            return;
        };
        let was_capturing = session.capture().state().is_capturing();
        if session.capture_mut().stop() {
            self.capture_stopped(StopReason::Requested);
        } else if !was_capturing {
            // Cancelled while arming, or nothing to stop
            self.next_tick = None;
            self.send_capture();
        }
    }

    /// The capture left `Capturing`; runs once per capture
    fn capture_stopped(&mut self, reason: StopReason) {
        self.next_tick = None;
        let samples = self
            .connection
            .session()
            .map(|s| s.capture().samples().len())
            .unwrap_or(0);

        self.send(BackendMessage::CaptureStopped { reason, samples });
        self.send_capture();

        if self.config.capture.auto_analyze {
            self.analyze();
        }
    }

    /// Submit the stopped capture for analysis
    fn analyze(&mut self) {
        let samples = match self.captured_for_analysis() {
            Ok(samples) => samples,
            Err(e) => {
                self.report_error(e);
                return;
            }
        };

        self.send(BackendMessage::AnalysisStarted);
        let result = self
            .connection
            .bridge()
            .analyze(self.config.capture.persist_data);

        match result {
            Ok(report) => self.analysis_completed(report, samples),
            Err(e) => {
                // Capture stays stopped so the user can retry
                tracing::warn!("Analysis failed: {}", e);
                self.report_error(e);
            }
        }
    }

    fn captured_for_analysis(&self) -> Result<Vec<Sample>> {
        let session = self
            .connection
            .session()
            .ok_or_else(|| VibMonError::Rejected("connect a device first".to_string()))?;
        Ok(session.capture().samples_for_analysis()?.to_vec())
    }

    fn analysis_completed(&mut self, report: AnalysisReport, samples: Vec<Sample>) {
        tracing::info!(
            "Analysis done: {} ({} samples, resonance: {})",
            report.risk.level,
            report.sample_count,
            report.resonance
        );
        if let Some(session) = self.connection.session_mut() {
            session.analysis_completed();
        }
        self.publish_chart();
        self.send_capture();
        self.send(BackendMessage::AnalysisResult {
            report: Box::new(report),
            samples,
        });
    }

    /// Switch between the simulated bridge and the HTTP bridge
    #[cfg(feature = "mock-bridge")]
    fn use_simulated_bridge(&mut self, enabled: bool) {
        if enabled == self.is_simulated {
            return;
        }
        if self.connection.is_connected() {
            self.handle_disconnect();
        }

        let (bridge, transport) = if enabled {
            let bridge = Arc::new(crate::backend::SimulatedBridge::new());
            (
                bridge.clone() as Arc<dyn DeviceBridge>,
                bridge as Arc<dyn StreamTransport>,
            )
        } else {
            match crate::backend::HttpBridge::new(self.config.server.clone()) {
                Ok(bridge) => {
                    let bridge = Arc::new(bridge);
                    (
                        bridge.clone() as Arc<dyn DeviceBridge>,
                        bridge as Arc<dyn StreamTransport>,
                    )
                }
                Err(e) => {
                    self.report_error(e.with_context("Failed to create HTTP bridge"));
                    return;
                }
            }
        };

        self.connection = build_connection(
            &self.config,
            bridge,
            transport,
            &self.stream_tx,
            &self.message_tx,
        );
        self.is_simulated = enabled;
        tracing::info!(
            "Switched to {} bridge",
            if enabled { "simulated" } else { "HTTP" }
        );
        self.refresh_devices();
    }

    /// Drop events still queued from a stream that was closed
    fn drain_stale_events(&mut self) {
        while self.stream_rx.try_recv().is_ok() {}
    }

    /// Render the current window outside of a push
    fn publish_chart(&mut self) {
        if let Some(session) = self.connection.session() {
            let frame = self.renderer.render_frame(session.buffer());
            self.try_send(BackendMessage::ChartFrame(frame));
        }
    }

    fn send_capture(&mut self) {
        if let Some(session) = self.connection.session() {
            let snapshot = session.capture_snapshot();
            self.send(BackendMessage::Capture(snapshot));
        }
    }

    fn send_stats(&mut self) {
        let stats = self.connection.stream_stats();
        self.try_send(BackendMessage::StreamStats(stats));
    }

    fn report_error(&mut self, error: VibMonError) {
        tracing::debug!("Reporting error: {}", error);
        self.send(BackendMessage::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// Send a state message; these must not be lost
    fn send(&self, msg: BackendMessage) {
        let _ = self.message_tx.send(msg);
    }

    /// Try to send a message, counting it if the queue is full
    fn try_send(&mut self, msg: BackendMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages += 1;
            if self.dropped_messages.is_power_of_two() {
                tracing::warn!("UI queue full, {} messages dropped", self.dropped_messages);
            }
        }
    }
}

/// Wire a connection manager into the worker's channels
///
/// Stream callbacks forward into `stream_tx`; every session built on
/// connect publishes a chart frame to the UI after each push.
fn build_connection(
    config: &AppConfig,
    bridge: Arc<dyn DeviceBridge>,
    transport: Arc<dyn StreamTransport>,
    stream_tx: &Sender<StreamEvent>,
    message_tx: &Sender<BackendMessage>,
) -> ConnectionManager {
    let renderer = LiveChartRenderer::new(config.chart.clone());
    let capacity = config.chart.window_capacity;
    let frames = message_tx.clone();

    let mut connection = ConnectionManager::new(bridge, transport, config.server.stream_url())
        .with_session_factory(move || {
            let mut session = LiveSession::new(capacity);
            let frames = frames.clone();
            session.subscribe(ChartPublisher::new(renderer.clone(), move |frame| {
                let _ = frames.try_send(BackendMessage::ChartFrame(frame));
            }));
            session
        });

    let samples = stream_tx.clone();
    connection.on_sample(move |sample| {
        let _ = samples.send(StreamEvent::Sample(sample));
    });
    let errors = stream_tx.clone();
    connection.on_stream_error(move |error| {
        let _ = errors.send(StreamEvent::Failed(error));
    });
    connection
}
