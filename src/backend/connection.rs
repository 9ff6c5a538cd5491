//! Device connection lifecycle
//!
//! [`ConnectionManager`] performs the connect/disconnect handshake with the
//! bridge and drives everything that hangs off a live connection: the
//! stream is opened right after a successful connect, and a fresh
//! [`LiveSession`] is built. Disconnecting closes the stream and tears the
//! session down before the bridge is told, so local state is released even
//! when the bridge is unreachable.

use crate::backend::bridge::DeviceBridge;
use crate::error::{Result, VibMonError};
use crate::session::LiveSession;
use crate::stream::{StreamClient, StreamError, StreamHandle, StreamTransport};
use crate::types::{ConnectionState, DeviceInfo, Sample, StreamStats};
use std::sync::Arc;

type SessionFactory = Box<dyn Fn() -> LiveSession + Send>;

/// Owns the device link, the live stream and the session built on top of them
pub struct ConnectionManager {
    bridge: Arc<dyn DeviceBridge>,
    stream: StreamClient,
    stream_url: String,
    state: ConnectionState,
    session: Option<LiveSession>,
    new_session: SessionFactory,
}

impl ConnectionManager {
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        transport: Arc<dyn StreamTransport>,
        stream_url: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            stream: StreamClient::new(transport),
            stream_url: stream_url.into(),
            state: ConnectionState::disconnected(),
            session: None,
            new_session: Box::new(|| LiveSession::new(crate::types::MAX_CHART_POINTS)),
        }
    }

    /// Replace how sessions are built on connect
    pub fn with_session_factory(
        mut self,
        factory: impl Fn() -> LiveSession + Send + 'static,
    ) -> Self {
        self.new_session = Box::new(factory);
        self
    }

    /// Forward decoded samples of every stream this manager opens
    pub fn on_sample(&mut self, callback: impl FnMut(Sample) + Send + 'static) {
        self.stream.on_sample(callback);
    }

    /// Forward stream failures and remote close
    pub fn on_stream_error(&mut self, callback: impl FnMut(StreamError) + Send + 'static) {
        self.stream.on_error(callback);
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let devices = self.bridge.list_devices()?;
        tracing::debug!("Bridge offers {} port(s)", devices.len());
        Ok(devices)
    }

    /// Connect to `port_id` and start streaming
    ///
    /// Returns the port label reported by the bridge. An empty id is rejected
    /// without contacting the bridge.
    pub fn connect(&mut self, port_id: &str) -> Result<String> {
        let port_id = port_id.trim();
        if port_id.is_empty() {
            return Err(VibMonError::Rejected("select a port first".to_string()));
        }

        let port = self.bridge.connect(port_id)?;
        tracing::info!("Connected to {}", port);

        self.session = Some((self.new_session)());
        self.stream.open(&self.stream_url);
        self.state = ConnectionState::connected(port.clone());
        Ok(port)
    }

    /// Close the stream, release the session and disconnect the device
    ///
    /// Local teardown always happens; the bridge error, if any, is returned
    /// afterwards.
    pub fn disconnect(&mut self) -> Result<()> {
        self.stream.close();
        if let Some(mut session) = self.session.take() {
            session.teardown();
        }
        self.state = ConnectionState::disconnected();

        let result = self.bridge.disconnect();
        match &result {
            Ok(()) => tracing::info!("Disconnected"),
            Err(e) => tracing::warn!("Bridge disconnect failed: {}", e),
        }
        result
    }

    /// Open the stream again after it failed, keeping the session
    pub fn reopen_stream(&mut self) -> Option<StreamHandle> {
        if !self.state.connected {
            return None;
        }
        Some(self.stream.open(&self.stream_url))
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn session(&self) -> Option<&LiveSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut LiveSession> {
        self.session.as_mut()
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.active()
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.stream.stats()
    }

    pub fn bridge(&self) -> &Arc<dyn DeviceBridge> {
        &self.bridge
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stream.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bridge::MockDeviceBridge;
    use crate::stream::MockStreamTransport;
    use crate::types::ConnectionStatus;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;
    use std::time::Duration;

    const STREAM_URL: &str = "http://bridge/arduino/stream";

    fn transport(body: &'static str) -> Arc<MockStreamTransport> {
        let mut transport = MockStreamTransport::new();
        transport
            .expect_open_stream()
            .returning(move |_| Ok(Box::new(Cursor::new(body.as_bytes().to_vec()))));
        Arc::new(transport)
    }

    fn manager(bridge: MockDeviceBridge, body: &'static str) -> ConnectionManager {
        ConnectionManager::new(Arc::new(bridge), transport(body), STREAM_URL)
    }

    #[test]
    fn test_empty_port_rejected_without_bridge_call() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_connect().never();
        let mut manager = manager(bridge, "");

        let err = manager.connect("  ").unwrap_err();
        assert!(matches!(err, VibMonError::Rejected(_)));
        assert!(!manager.is_connected());
        assert!(manager.session().is_none());
        assert!(manager.stream().is_none());
    }

    #[test]
    fn test_connect_opens_stream_and_session() {
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_connect()
            .times(1)
            .returning(|port| {
                assert_eq!(port, "COM3");
                Ok(port.to_string())
            });
        let mut manager = manager(bridge, "data: {\"rms\": 0.25}\n\n");

        let (tx, rx) = unbounded();
        manager.on_sample(move |s| {
            let _ = tx.send(s);
        });

        assert_eq!(manager.connect("COM3").unwrap(), "COM3");
        assert_eq!(manager.state().status(), ConnectionStatus::Connected);
        assert_eq!(manager.state().label, "Connected to COM3");
        assert!(manager.session().is_some());
        assert_eq!(manager.stream().map(|h| h.endpoint()), Some(STREAM_URL));

        let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(sample.rms, Some(0.25));
    }

    #[test]
    fn test_bridge_refusal_leaves_disconnected() {
        let mut bridge = MockDeviceBridge::new();
        bridge
            .expect_connect()
            .returning(|_| Err(VibMonError::Service("Puerto ocupado".to_string())));
        let mut manager = manager(bridge, "");

        let err = manager.connect("COM9").unwrap_err();
        assert_eq!(err.to_string(), "Puerto ocupado");
        assert!(!manager.is_connected());
        assert!(manager.stream().is_none());
        assert!(manager.session().is_none());
    }

    #[test]
    fn test_disconnect_tears_down_even_if_bridge_fails() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_connect().returning(|p| Ok(p.to_string()));
        bridge
            .expect_disconnect()
            .times(1)
            .returning(|| Err(VibMonError::Transport("connection refused".to_string())));
        let mut manager = manager(bridge, "");

        manager.connect("COM3").unwrap();
        let handle = manager.stream().cloned().unwrap();
        manager
            .session_mut()
            .unwrap()
            .ingest(Sample::new(0.1, 0.2, 1.1));

        assert!(manager.disconnect().is_err());
        assert!(handle.is_closed());
        assert!(manager.session().is_none());
        assert!(!manager.is_connected());
        assert_eq!(manager.state().status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_session_factory_used_on_connect() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_connect().returning(|p| Ok(p.to_string()));
        let mut manager = manager(bridge, "").with_session_factory(|| LiveSession::new(7));

        manager.connect("COM1").unwrap();
        assert_eq!(manager.session().unwrap().buffer().capacity(), 7);
    }

    #[test]
    fn test_reopen_requires_connection() {
        let mut bridge = MockDeviceBridge::new();
        bridge.expect_connect().returning(|p| Ok(p.to_string()));
        let mut manager = manager(bridge, "");

        assert!(manager.reopen_stream().is_none());
        manager.connect("COM1").unwrap();
        let first = manager.stream().cloned().unwrap();
        let second = manager.reopen_stream().unwrap();
        assert!(first.is_closed());
        assert_ne!(first.id(), second.id());
    }
}
