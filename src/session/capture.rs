//! Timed experiment capture
//!
//! [`CaptureController`] is the state machine behind the experiment panel:
//!
//! ```text
//! Idle --start--> Arming --ack--> Capturing --tick to 0 / stop--> Stopped
//!  ^                |                                               |
//!  +---arm failed---+                  +-----analysis succeeded-----+
//!  ^                                   v
//!  +-----------------------------------+
//! ```
//!
//! The countdown is driven by [`CaptureController::tick`], which the worker
//! calls once per second regardless of how many samples arrive. Leaving
//! `Capturing` happens exactly once: whichever of the final tick and an
//! explicit stop comes first wins and the other becomes a no-op.

use crate::error::{Result, VibMonError};
use crate::types::{IncrementalStats, Sample};
use chrono::{DateTime, Utc};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No capture in progress
    #[default]
    Idle,
    /// Waiting for the bridge to acknowledge the capture request
    Arming {
        /// Requested duration in seconds
        duration_secs: u32,
    },
    /// Collecting samples while the countdown runs
    Capturing {
        duration_secs: u32,
        /// Seconds left on the countdown
        remaining_secs: u32,
    },
    /// Capture frozen, ready for analysis
    Stopped,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureState::Capturing { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, CaptureState::Stopped)
    }

    /// A capture is armed or running
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureState::Arming { .. } | CaptureState::Capturing { .. }
        )
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "Idle",
            CaptureState::Arming { .. } => "Arming",
            CaptureState::Capturing { .. } => "Capturing",
            CaptureState::Stopped => "Stopped",
        }
    }
}

/// Why a capture stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Countdown reached zero
    Elapsed,
    /// Explicit stop request
    Requested,
}

/// Result of a countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not capturing; nothing happened
    Idle,
    /// Countdown decremented, capture continues
    Counting { remaining_secs: u32 },
    /// Countdown reached zero and the capture stopped
    Stopped,
}

/// State machine coordinating one experiment capture at a time
#[derive(Debug, Default)]
pub struct CaptureController {
    state: CaptureState,
    samples_seen: Vec<Sample>,
    rms_stats: IncrementalStats,
    started_at: Option<DateTime<Utc>>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Samples collected while capturing, in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples_seen
    }

    /// Running min/max/mean of captured RMS values
    pub fn rms_stats(&self) -> &IncrementalStats {
        &self.rms_stats
    }

    /// When the current capture was started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Begin a new capture of `duration_secs` seconds
    ///
    /// Accepted from `Idle` and `Stopped` (the previous capture is discarded).
    /// Rejected without any state change while a capture is armed or running.
    pub fn start(&mut self, duration_secs: u32) -> Result<()> {
        if duration_secs == 0 {
            return Err(VibMonError::Rejected(
                "capture duration must be at least one second".to_string(),
            ));
        }
        if self.state.is_active() {
            return Err(VibMonError::Rejected(format!(
                "a capture is already {}",
                self.state.display_name().to_lowercase()
            )));
        }

        self.samples_seen.clear();
        self.rms_stats.reset();
        self.started_at = Some(Utc::now());
        self.state = CaptureState::Arming { duration_secs };
        tracing::info!("Capture arming for {}s", duration_secs);
        Ok(())
    }

    /// The bridge acknowledged the capture request; start the countdown
    ///
    /// Returns the countdown length, or `None` if no capture was arming
    /// (for instance because it was cancelled meanwhile).
    pub fn acknowledge(&mut self) -> Option<u32> {
        match self.state {
            CaptureState::Arming { duration_secs } => {
                self.state = CaptureState::Capturing {
                    duration_secs,
                    remaining_secs: duration_secs,
                };
                tracing::info!("Capture acknowledged, counting down {}s", duration_secs);
                Some(duration_secs)
            }
            _ => None,
        }
    }

    /// The bridge refused or failed the capture request
    pub fn arm_failed(&mut self) {
        if matches!(self.state, CaptureState::Arming { .. }) {
            tracing::warn!("Capture arm failed, returning to idle");
            self.reset();
        }
    }

    /// Record a sample if capturing; returns whether it was kept
    pub fn observe(&mut self, sample: &Sample) -> bool {
        if !self.state.is_capturing() {
            return false;
        }
        self.samples_seen.push(*sample);
        self.rms_stats.push(sample.rms_or_zero());
        true
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> TickOutcome {
        let CaptureState::Capturing {
            duration_secs,
            remaining_secs,
        } = self.state
        else {
            return TickOutcome::Idle;
        };

        let remaining_secs = remaining_secs.saturating_sub(1);
        if remaining_secs == 0 {
            self.finish(StopReason::Elapsed);
            TickOutcome::Stopped
        } else {
            self.state = CaptureState::Capturing {
                duration_secs,
                remaining_secs,
            };
            TickOutcome::Counting { remaining_secs }
        }
    }

    /// Explicit stop request
    ///
    /// Stops a running capture and returns `true`. An arming capture is
    /// cancelled back to `Idle`. Anything else is a no-op returning `false`.
    pub fn stop(&mut self) -> bool {
        match self.state {
            CaptureState::Capturing { .. } => {
                self.finish(StopReason::Requested);
                true
            }
            CaptureState::Arming { .. } => {
                tracing::info!("Capture cancelled before acknowledgement");
                self.reset();
                false
            }
            _ => false,
        }
    }

    fn finish(&mut self, reason: StopReason) {
        self.state = CaptureState::Stopped;
        tracing::info!(
            "Capture stopped ({:?}) with {} samples",
            reason,
            self.samples_seen.len()
        );
    }

    /// Samples eligible for analysis
    ///
    /// Only a stopped capture holding at least one sample can be submitted.
    pub fn samples_for_analysis(&self) -> Result<&[Sample]> {
        if !self.state.is_stopped() {
            return Err(VibMonError::Rejected(format!(
                "capture is {}, stop it before analysis",
                self.state.display_name().to_lowercase()
            )));
        }
        if self.samples_seen.is_empty() {
            return Err(VibMonError::Rejected(
                "no captured data to analyze".to_string(),
            ));
        }
        Ok(&self.samples_seen)
    }

    /// Analysis finished; the capture is consumed
    pub fn analysis_completed(&mut self) {
        if self.state.is_stopped() {
            self.reset();
        }
    }

    /// Return to `Idle`, discarding captured samples
    pub fn reset(&mut self) {
        self.state = CaptureState::Idle;
        self.samples_seen.clear();
        self.rms_stats.reset();
        self.started_at = None;
    }

    /// Status line for the experiment panel, if a capture is running or done
    pub fn status_text(&self) -> Option<String> {
        match self.state {
            CaptureState::Idle => None,
            CaptureState::Arming { .. } => Some("Starting capture...".to_string()),
            CaptureState::Capturing { remaining_secs, .. } => {
                Some(format!("Capturing... {}s", remaining_secs))
            }
            CaptureState::Stopped => Some(format!(
                "Connected - {} samples captured",
                self.samples_seen.len()
            )),
        }
    }
}
