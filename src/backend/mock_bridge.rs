//! Simulated bridge for running without hardware
//!
//! [`SimulatedBridge`] answers every bridge operation in process and serves
//! a synthetic event stream: a slowly modulated vibration signal with a
//! heartbeat every few events. Samples streamed while a capture window is
//! armed are recorded and summarized on analysis, with the same risk
//! thresholds and resonance rule as the real server.
//!
//! # Enabling
//!
//! Only compiled with the `mock-bridge` feature:
//!
//! ```bash
//! cargo run --features mock-bridge
//! ```

use crate::analysis::{
    AnalysisReport, AnalysisStatistics, MetricStats, RiskAssessment, RiskSeverity,
    RESONANCE_CREST_THRESHOLD,
};
use crate::backend::bridge::{ArmAck, BridgeStatus, DeviceBridge};
use crate::error::{Result, VibMonError};
use crate::stream::StreamTransport;
use crate::types::{DeviceInfo, Sample};
use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Port name offered by the simulated bridge
pub const SIMULATED_PORT: &str = "SIM0";

/// Shape of the synthetic signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedSignal {
    /// Time between stream events
    pub interval: Duration,
    /// Every n-th event is a heartbeat (0 disables heartbeats)
    pub heartbeat_every: u64,
    /// RMS around which the signal oscillates
    pub base_rms: f64,
    /// Modulation depth of the RMS
    pub modulation: f64,
    /// Crest factor of the signal
    pub crest: f64,
}

impl Default for SimulatedSignal {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            heartbeat_every: 10,
            base_rms: 0.04,
            modulation: 0.02,
            crest: 1.8,
        }
    }
}

impl SimulatedSignal {
    /// Sample number `n` of the signal
    pub fn sample(&self, n: u64) -> Sample {
        let phase = n as f64 * 0.15;
        let rms = (self.base_rms + self.modulation * phase.sin()).max(0.0);
        let max = rms * self.crest;
        Sample {
            rms: Some(rms),
            max: Some(max),
            crest: Some(self.crest),
            min: Some(-max),
            std: Some(rms * 0.9),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    port: Option<String>,
    capture_until: Option<Instant>,
    captured: Vec<Sample>,
    packets: u64,
}

impl SimState {
    fn capturing(&self) -> bool {
        self.capture_until.is_some_and(|until| Instant::now() < until)
    }
}

/// In-process stand-in for the bridge server
#[derive(Clone, Default)]
pub struct SimulatedBridge {
    signal: SimulatedSignal,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: SimulatedSignal) -> Self {
        self.signal = signal;
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| VibMonError::Channel("simulated bridge state poisoned".to_string()))
    }

    /// Samples recorded for the current capture window
    pub fn captured(&self) -> usize {
        self.state().map(|s| s.captured.len()).unwrap_or(0)
    }
}

impl DeviceBridge for SimulatedBridge {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(vec![DeviceInfo::new(
            SIMULATED_PORT,
            "Simulated accelerometer",
        )])
    }

    fn connect(&self, port_id: &str) -> Result<String> {
        if port_id != SIMULATED_PORT {
            return Err(VibMonError::Service(format!(
                "Could not open port {}",
                port_id
            )));
        }
        let mut state = self.state()?;
        state.port = Some(port_id.to_string());
        state.packets = 0;
        Ok(port_id.to_string())
    }

    fn disconnect(&self) -> Result<()> {
        let mut state = self.state()?;
        *state = SimState::default();
        Ok(())
    }

    fn status(&self) -> Result<BridgeStatus> {
        let state = self.state()?;
        Ok(BridgeStatus {
            connected: state.port.is_some(),
            port: state.port.clone(),
            capturing: state.capturing(),
            packets_received: state.packets,
            ..Default::default()
        })
    }

    fn arm_capture(&self, duration_secs: u32) -> Result<ArmAck> {
        let mut state = self.state()?;
        if state.port.is_none() {
            return Err(VibMonError::Service("Device not connected".to_string()));
        }
        state.captured.clear();
        state.capture_until =
            Some(Instant::now() + Duration::from_secs(u64::from(duration_secs)));
        Ok(ArmAck {
            message: format!("Capture started for {} seconds", duration_secs),
            duration_secs,
        })
    }

    fn analyze(&self, _persist_data: bool) -> Result<AnalysisReport> {
        let mut state = self.state()?;
        let samples = std::mem::take(&mut state.captured);
        state.capture_until = None;
        summarize(&samples)
    }
}

impl StreamTransport for SimulatedBridge {
    fn open_stream(&self, _endpoint: &str) -> Result<Box<dyn BufRead + Send>> {
        if self.state()?.port.is_none() {
            return Err(VibMonError::Transport("device not connected".to_string()));
        }
        Ok(Box::new(BufReader::new(SimulatedStream {
            signal: self.signal,
            state: self.state.clone(),
            next_at: Instant::now(),
            counter: 0,
            pending: Vec::new(),
            pos: 0,
        })))
    }
}

/// Server-side summary of a capture
fn summarize(samples: &[Sample]) -> Result<AnalysisReport> {
    let (Some(rms), Some(peak), Some(crest), Some(deviation)) = (
        metric(samples, Sample::rms_or_zero),
        metric(samples, Sample::max_or_zero),
        metric(samples, Sample::crest_or_zero),
        metric(samples, |s| s.std.unwrap_or(0.0)),
    ) else {
        return Err(VibMonError::Service(
            "No experimental data available".to_string(),
        ));
    };

    Ok(AnalysisReport {
        risk: assess_risk(rms.mean, peak.max),
        resonance: crest.mean > RESONANCE_CREST_THRESHOLD,
        sample_count: samples.len(),
        statistics: AnalysisStatistics {
            rms,
            peak,
            crest,
            deviation: Some(MetricStats { std: None, ..deviation }),
        },
        plot_png_base64: None,
    })
}

fn metric(samples: &[Sample], f: impl Fn(&Sample) -> f64) -> Option<MetricStats> {
    MetricStats::from_values(samples.iter().map(f))
}

fn assess_risk(mean_rms: f64, peak: f64) -> RiskAssessment {
    let (level, severity, description) = if mean_rms > 0.1 {
        (
            "HIGH RISK",
            RiskSeverity::Danger,
            "Vibration exceeds safe limits",
        )
    } else if mean_rms > 0.05 {
        (
            "CAUTION",
            RiskSeverity::Warning,
            "Vibration in the warning zone",
        )
    } else {
        (
            "ACCEPTABLE",
            RiskSeverity::Success,
            "Vibration within acceptable ranges",
        )
    };

    RiskAssessment {
        level: level.to_string(),
        severity,
        description: description.to_string(),
        extra_warning: peak > 0.15,
        ..Default::default()
    }
}

/// Paced event-stream body
struct SimulatedStream {
    signal: SimulatedSignal,
    state: Arc<Mutex<SimState>>,
    next_at: Instant,
    counter: u64,
    pending: Vec<u8>,
    pos: usize,
}

impl SimulatedStream {
    /// Produce the next event; `None` once the device is disconnected
    fn next_event(&mut self) -> Option<String> {
        let now = Instant::now();
        if self.next_at > now {
            std::thread::sleep(self.next_at - now);
        }
        self.next_at += self.signal.interval;
        self.counter += 1;

        let mut state = self.state.lock().ok()?;
        state.port.as_ref()?;

        let every = self.signal.heartbeat_every;
        if every > 0 && self.counter % every == 0 {
            return Some(r#"{"heartbeat": true}"#.to_string());
        }

        let sample = self.signal.sample(self.counter);
        state.packets += 1;
        if state.capturing() {
            state.captured.push(sample);
        }
        serde_json::to_string(&sample).ok()
    }
}

impl Read for SimulatedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.pending.len() {
            let Some(payload) = self.next_event() else {
                return Ok(0);
            };
            self.pending = format!("data: {}\n\n", payload).into_bytes();
            self.pos = 0;
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{SseEvent, SseEvents};

    fn fast_bridge() -> SimulatedBridge {
        SimulatedBridge::new().with_signal(SimulatedSignal {
            interval: Duration::from_millis(1),
            heartbeat_every: 3,
            ..Default::default()
        })
    }

    #[test]
    fn test_connect_only_simulated_port() {
        let bridge = fast_bridge();
        assert_eq!(bridge.list_devices().unwrap()[0].id, SIMULATED_PORT);
        assert!(bridge.connect("COM3").is_err());
        assert_eq!(bridge.connect(SIMULATED_PORT).unwrap(), SIMULATED_PORT);
        assert!(bridge.status().unwrap().connected);
    }

    #[test]
    fn test_stream_interleaves_heartbeats() {
        let bridge = fast_bridge();
        bridge.connect(SIMULATED_PORT).unwrap();

        let reader = bridge.open_stream("sim://stream").unwrap();
        let events: Vec<String> = SseEvents::new(reader)
            .take(6)
            .map(|e| match e.unwrap() {
                SseEvent::Data(data) => data,
                SseEvent::Malformed => panic!("simulated stream is valid UTF-8"),
            })
            .collect();

        let heartbeats = events.iter().filter(|e| e.contains("heartbeat")).count();
        assert_eq!(heartbeats, 2);
        assert!(events[0].contains("\"rms\""));
    }

    #[test]
    fn test_stream_ends_on_disconnect() {
        let bridge = fast_bridge();
        bridge.connect(SIMULATED_PORT).unwrap();
        let reader = bridge.open_stream("sim://stream").unwrap();
        bridge.disconnect().unwrap();

        assert_eq!(SseEvents::new(reader).count(), 0);
        assert!(bridge.open_stream("sim://stream").is_err());
    }

    #[test]
    fn test_capture_and_analyze() {
        let bridge = fast_bridge();
        bridge.connect(SIMULATED_PORT).unwrap();
        assert!(bridge.analyze(true).is_err());

        bridge.arm_capture(5).unwrap();
        let reader = bridge.open_stream("sim://stream").unwrap();
        let _ = SseEvents::new(reader).take(9).count();
        assert_eq!(bridge.captured(), 6);

        let report = bridge.analyze(true).unwrap();
        assert_eq!(report.sample_count, 6);
        assert!(!report.resonance);
        assert_eq!(report.risk.severity, RiskSeverity::Success);
        assert!(report.statistics.rms.max >= report.statistics.rms.min);
        assert_eq!(bridge.captured(), 0);
    }

    #[test]
    fn test_risk_thresholds() {
        assert_eq!(assess_risk(0.2, 0.1).severity, RiskSeverity::Danger);
        assert_eq!(assess_risk(0.06, 0.1).severity, RiskSeverity::Warning);
        assert_eq!(assess_risk(0.01, 0.1).severity, RiskSeverity::Success);
        assert!(assess_risk(0.01, 0.2).extra_warning);
    }
}
