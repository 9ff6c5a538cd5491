//! Integration tests for backend lifecycle
//!
//! These tests run the complete backend thread against a fixture bridge:
//! - Port listing, connection and disconnection
//! - Live samples reaching the UI as readouts and chart frames
//! - A timed capture stopping on its own and being analyzed

mod common;

use common::builders::{analysis_response, failure, port_list, SampleBuilder};
use common::mock_helpers::{FixtureResponse, FixtureServer};
use common::wait_for;
use serde_json::json;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vibmon_rs::backend::{BackendMessage, FrontendReceiver, MonitorBackend};
use vibmon_rs::config::AppConfig;
use vibmon_rs::error::ErrorKind;
use vibmon_rs::session::{CaptureState, StopReason};
use vibmon_rs::types::ConnectionStatus;

fn bridge_server() -> FixtureServer {
    FixtureServer::start(|req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/arduino/puertos") => FixtureResponse::ok(port_list(&[("COM3", "Arduino Uno")])),
        ("POST", "/arduino/conectar") => {
            if req.json()["puerto"] == "COM3" {
                FixtureResponse::ok(json!({"success": true, "puerto": "COM3"}))
            } else {
                FixtureResponse::json(400, failure("Puerto no disponible"))
            }
        }
        ("GET", "/arduino/stream") => FixtureResponse::EventStream {
            events: (0..400)
                .map(|i| {
                    SampleBuilder::new()
                        .rms(0.03 + (i % 10) as f64 / 1000.0)
                        .payload()
                })
                .collect(),
            interval: Duration::from_millis(10),
            hold: Duration::from_secs(2),
        },
        ("POST", "/arduino/iniciar_experimento") => FixtureResponse::ok(json!({
            "success": true,
            "mensaje": "Experimento iniciado",
            "duracion": req.json()["duracion"]
        })),
        ("POST", "/arduino/analizar_experimento") => {
            FixtureResponse::ok(analysis_response(0.035, 1.8, 87))
        }
        ("POST", "/arduino/desconectar") => FixtureResponse::ok(json!({"success": true})),
        _ => FixtureResponse::not_found(),
    })
}

fn spawn_backend(server: &FixtureServer) -> (FrontendReceiver, JoinHandle<()>) {
    let mut config = AppConfig::default();
    config.server.base_url = server.base_url();
    config.server.request_timeout_ms = 2_000;

    let (backend, frontend) = MonitorBackend::new(config);
    let handle = thread::spawn(move || backend.run());
    (frontend, handle)
}

fn shutdown(frontend: FrontendReceiver, handle: JoinHandle<()>) {
    frontend.shutdown();
    handle.join().expect("backend thread should exit cleanly");
}

#[test]
fn test_backend_creation_and_shutdown() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    thread::sleep(Duration::from_millis(50));
    frontend.shutdown();
    handle.join().unwrap();

    let messages = frontend.drain();
    assert!(messages.iter().any(|m| matches!(m, BackendMessage::Shutdown)));
}

#[test]
fn test_refresh_devices() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    frontend.refresh_devices();
    let devices = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::DeviceList(devices) => Some(devices),
        _ => None,
    });
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "COM3");

    shutdown(frontend, handle);
}

#[test]
fn test_connect_failure_reports_service_error() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    frontend.connect("COM9");
    let (kind, message) = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Error { kind, message } => Some((kind, message)),
        BackendMessage::Connection(state) if state.connected => {
            panic!("connect should have failed")
        }
        _ => None,
    });
    assert_eq!(kind, ErrorKind::Service);
    assert!(message.contains("Puerto no disponible"), "{}", message);
    assert!(server.requests_to("/arduino/stream").is_empty());

    shutdown(frontend, handle);
}

#[test]
fn test_live_session_capture_and_analysis() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    // Connect and receive live data
    frontend.connect("COM3");
    let state = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Connection(state) => Some(state),
        BackendMessage::Error { message, .. } => panic!("connect failed: {}", message),
        _ => None,
    });
    assert_eq!(state.status(), ConnectionStatus::Connected);
    assert_eq!(state.port_id, "COM3");

    let readout = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Readout(r) if r.sample_count >= 5 => Some(r),
        _ => None,
    });
    assert!(readout.last.is_some());

    let frame = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::ChartFrame(frame) if frame.series().is_some() => Some(frame),
        _ => None,
    });
    assert!(frame.series().unwrap().len() >= 2);

    // One second capture stops on its own
    frontend.start_capture(1);
    wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Capture(snapshot) if snapshot.state.is_capturing() => Some(()),
        BackendMessage::Error { message, .. } => panic!("capture failed: {}", message),
        _ => None,
    });
    let (reason, captured) = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::CaptureStopped { reason, samples } => Some((reason, samples)),
        _ => None,
    });
    assert_eq!(reason, StopReason::Elapsed);
    assert!(captured > 0);
    assert_eq!(
        server.requests_to("/arduino/iniciar_experimento")[0].json(),
        json!({"duracion": 1})
    );

    // Analysis returns the server's report and the submitted samples
    frontend.analyze();
    let (report, samples) = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::AnalysisResult { report, samples } => Some((report, samples)),
        BackendMessage::Error { message, .. } => panic!("analysis failed: {}", message),
        _ => None,
    });
    assert_eq!(report.sample_count, 87);
    assert!(!report.resonance);
    assert_eq!(samples.len(), captured);
    assert_eq!(
        server.requests_to("/arduino/analizar_experimento")[0].json(),
        json!({"guardar_datos": true})
    );

    // Disconnect tears everything down
    frontend.disconnect();
    let state = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Connection(state) if !state.connected => Some(state),
        _ => None,
    });
    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    let readout = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Readout(r) => Some(r),
        _ => None,
    });
    assert_eq!(readout.sample_count, 0);
    assert_eq!(server.requests_to("/arduino/desconectar").len(), 1);

    shutdown(frontend, handle);
}

#[test]
fn test_analyze_without_capture_is_rejected_locally() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    frontend.connect("COM3");
    wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Connection(state) if state.connected => Some(()),
        _ => None,
    });

    frontend.analyze();
    let kind = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Error { kind, .. } => Some(kind),
        _ => None,
    });
    assert_eq!(kind, ErrorKind::Invariant);
    assert!(server.requests_to("/arduino/analizar_experimento").is_empty());

    shutdown(frontend, handle);
}

#[test]
fn test_stop_capture_early() {
    let server = bridge_server();
    let (frontend, handle) = spawn_backend(&server);

    frontend.connect("COM3");
    wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Connection(state) if state.connected => Some(()),
        _ => None,
    });

    frontend.start_capture(60);
    wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Capture(snapshot) if snapshot.state.is_capturing() => Some(()),
        _ => None,
    });
    thread::sleep(Duration::from_millis(200));
    frontend.stop_capture();

    let reason = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::CaptureStopped { reason, .. } => Some(reason),
        _ => None,
    });
    assert_eq!(reason, StopReason::Requested);

    let snapshot = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Capture(snapshot) if snapshot.state == CaptureState::Stopped => {
            Some(snapshot)
        }
        _ => None,
    });
    assert!(snapshot
        .status_text
        .as_deref()
        .is_some_and(|t| t.ends_with("samples captured")));

    shutdown(frontend, handle);
}

#[test]
#[cfg(feature = "mock-bridge")]
fn test_simulated_bridge_session() {
    use std::sync::Arc;
    use vibmon_rs::backend::{SimulatedBridge, SimulatedSignal, SIMULATED_PORT};

    let bridge = Arc::new(SimulatedBridge::new().with_signal(SimulatedSignal {
        interval: Duration::from_millis(5),
        ..Default::default()
    }));
    let (backend, frontend) = MonitorBackend::new(AppConfig::default());
    let backend = backend.with_bridge(bridge.clone(), bridge);
    let handle = thread::spawn(move || backend.run());

    frontend.connect(SIMULATED_PORT);
    let readout = wait_for(&frontend.receiver, |msg| match msg {
        BackendMessage::Readout(r) if r.sample_count >= 10 => Some(r),
        _ => None,
    });
    assert!(readout.last.is_some());

    shutdown(frontend, handle);
}
