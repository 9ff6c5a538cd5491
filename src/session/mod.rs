//! Live monitoring session
//!
//! A [`LiveSession`] exists exactly while a device is connected. It owns the
//! rolling chart window ([`SampleBuffer`]), the experiment state machine
//! ([`CaptureController`]) and the monitor counters. The backend worker is
//! its only writer: every sample from the stream goes through
//! [`LiveSession::ingest`], and the once-per-second countdown goes through
//! [`LiveSession::tick`].

pub mod buffer;
pub mod capture;

pub use buffer::{BufferObserver, SampleBuffer};
pub use capture::{CaptureController, CaptureState, StopReason, TickOutcome};

use crate::error::Result;
use crate::types::{IncrementalStats, MonitorReadout, Sample};

/// Point-in-time view of the capture, sent to the UI
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureSnapshot {
    pub state: CaptureState,
    pub status_text: Option<String>,
    pub captured: usize,
    /// Running min/max/mean of captured RMS values
    pub rms_summary: IncrementalStats,
}

/// State owned by one device connection
#[derive(Debug)]
pub struct LiveSession {
    buffer: SampleBuffer,
    capture: CaptureController,
    readout: MonitorReadout,
}

impl LiveSession {
    /// Create a session with a chart window of `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: SampleBuffer::new(capacity),
            capture: CaptureController::new(),
            readout: MonitorReadout::default(),
        }
    }

    /// Attach an observer that runs after every push into the window
    pub fn subscribe(&mut self, observer: impl BufferObserver + 'static) {
        self.buffer.subscribe(observer);
    }

    /// Take one sample from the stream
    ///
    /// The sample always enters the rolling window and the readouts; it is
    /// also recorded by the capture when one is running. Returns whether the
    /// capture kept it.
    pub fn ingest(&mut self, sample: Sample) -> bool {
        self.readout.last = Some(sample);
        self.readout.sample_count += 1;
        self.buffer.push(sample);
        self.capture.observe(&sample)
    }

    /// One second of countdown
    pub fn tick(&mut self) -> TickOutcome {
        self.capture.tick()
    }

    pub fn start_capture(&mut self, duration_secs: u32) -> Result<()> {
        self.capture.start(duration_secs)
    }

    /// Analysis succeeded: drop the capture and the chart window
    pub fn analysis_completed(&mut self) {
        self.capture.analysis_completed();
        self.buffer.clear();
    }

    /// Disconnect: release everything the session accumulated
    pub fn teardown(&mut self) {
        self.buffer.clear();
        self.capture.reset();
        self.readout = MonitorReadout::default();
        tracing::debug!("Live session torn down");
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn capture(&self) -> &CaptureController {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureController {
        &mut self.capture
    }

    pub fn readout(&self) -> MonitorReadout {
        self.readout
    }

    pub fn capture_snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            state: self.capture.state(),
            status_text: self.capture.status_text(),
            captured: self.capture.samples().len(),
            rms_summary: *self.capture.rms_stats(),
        }
    }
}
