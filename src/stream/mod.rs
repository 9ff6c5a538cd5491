//! Live telemetry stream client
//!
//! [`StreamClient`] owns at most one server-push connection at a time. The
//! connection is read on a background thread; every event payload goes
//! through [`StreamDecoder`], heartbeats and malformed messages are dropped,
//! and each sample is handed to the `on_sample` subscribers in arrival order.
//!
//! # Failure model
//!
//! - Opening never fails synchronously. A transport failure is reported to
//!   the `on_error` subscribers and the handle moves to [`StreamState::Error`].
//! - The remote end closing the stream moves the handle to
//!   [`StreamState::Closed`] and is reported as [`StreamError::Ended`].
//! - The client never reconnects on its own; call [`StreamClient::open`] again.
//!
//! # Example
//!
//! ```ignore
//! let mut client = StreamClient::new(Arc::new(bridge));
//! client.on_sample(move |sample| { let _ = tx.send(sample); });
//! let handle = client.open("http://127.0.0.1:5000/arduino/stream");
//! // ...
//! client.close();
//! ```

pub mod decode;
pub mod sse;

pub use decode::{decode_message, StreamDecoder, StreamMessage};
pub use sse::{SseEvent, SseEvents, SseParser};

use crate::error::Result;
use crate::types::{Sample, StreamStats};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Something that can open a byte stream of server-sent events
#[cfg_attr(test, mockall::automock)]
pub trait StreamTransport: Send + Sync {
    /// Open the event stream at `endpoint`
    fn open_stream(&self, endpoint: &str) -> Result<Box<dyn BufRead + Send>>;
}

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Transport is being opened
    Connecting,
    /// Receiving events
    Open,
    /// Transport failed; the connection is dead but the failure is recoverable
    Error,
    /// Closed locally or by the remote end
    Closed,
}

/// Error notification delivered to `on_error` subscribers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Opening or reading the transport failed
    #[error("Stream error: {0}")]
    Transport(String),
    /// The remote end finished the stream
    #[error("Stream closed by server")]
    Ended,
}

type SampleCallback = Box<dyn FnMut(Sample) + Send>;
type ErrorCallback = Box<dyn FnMut(StreamError) + Send>;

#[derive(Default)]
struct Subscribers {
    samples: Vec<SampleCallback>,
    errors: Vec<ErrorCallback>,
}

struct HandleShared {
    closed: AtomicBool,
    state: Mutex<StreamState>,
}

impl HandleShared {
    fn set_state(&self, state: StreamState) {
        if let Ok(mut current) = self.state.lock() {
            // Closed is terminal
            if *current != StreamState::Closed {
                *current = state;
            }
        }
    }
}

/// Handle to one opened connection
#[derive(Clone)]
pub struct StreamHandle {
    id: u64,
    endpoint: String,
    shared: Arc<HandleShared>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl StreamHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> StreamState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(StreamState::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Stop delivering events from this connection; idempotent
    ///
    /// The reader thread notices on its next read and exits. Samples it
    /// reads after this call are discarded.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.set_state(StreamState::Closed);
            tracing::info!("Stream {} closed", self.id);
        }
    }
}

/// Client for the live telemetry stream
pub struct StreamClient {
    transport: Arc<dyn StreamTransport>,
    subscribers: Arc<Mutex<Subscribers>>,
    stats: Arc<Mutex<StreamStats>>,
    active: Option<StreamHandle>,
    next_id: u64,
}

impl StreamClient {
    pub fn new(transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            stats: Arc::new(Mutex::new(StreamStats::default())),
            active: None,
            next_id: 1,
        }
    }

    /// Register a handler called once per sample, in arrival order
    pub fn on_sample(&mut self, callback: impl FnMut(Sample) + Send + 'static) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.samples.push(Box::new(callback));
        }
    }

    /// Register a handler for transport errors and remote close
    pub fn on_error(&mut self, callback: impl FnMut(StreamError) + Send + 'static) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.errors.push(Box::new(callback));
        }
    }

    /// Open a connection to `endpoint`, closing any previous one first
    pub fn open(&mut self, endpoint: &str) -> StreamHandle {
        self.close();

        let id = self.next_id;
        self.next_id += 1;

        let handle = StreamHandle {
            id,
            endpoint: endpoint.to_string(),
            shared: Arc::new(HandleShared {
                closed: AtomicBool::new(false),
                state: Mutex::new(StreamState::Connecting),
            }),
        };

        if let Ok(mut stats) = self.stats.lock() {
            *stats = StreamStats::default();
        }

        let reader = StreamReader {
            transport: self.transport.clone(),
            handle: handle.clone(),
            subscribers: self.subscribers.clone(),
            stats: self.stats.clone(),
        };
        let spawned = std::thread::Builder::new()
            .name(format!("stream-{}", handle.id))
            .spawn(move || reader.run());

        if let Err(e) = spawned {
            handle.shared.set_state(StreamState::Error);
            notify_error(
                &self.subscribers,
                StreamError::Transport(format!("failed to spawn reader: {}", e)),
            );
        }

        tracing::info!("Stream {} opening {}", handle.id, endpoint);
        self.active = Some(handle.clone());
        handle
    }

    /// Close the active connection, if any; idempotent
    pub fn close(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.close();
        }
    }

    /// The active connection, if one was opened and not closed locally
    pub fn active(&self) -> Option<&StreamHandle> {
        self.active.as_ref()
    }

    /// Counters for the current connection
    pub fn stats(&self) -> StreamStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn notify_error(subscribers: &Mutex<Subscribers>, error: StreamError) {
    if let Ok(mut subs) = subscribers.lock() {
        for callback in subs.errors.iter_mut() {
            callback(error.clone());
        }
    }
}

/// Background side of one connection
struct StreamReader {
    transport: Arc<dyn StreamTransport>,
    handle: StreamHandle,
    subscribers: Arc<Mutex<Subscribers>>,
    stats: Arc<Mutex<StreamStats>>,
}

impl StreamReader {
    fn run(self) {
        let id = self.handle.id;
        let reader = match self.transport.open_stream(&self.handle.endpoint) {
            Ok(reader) => reader,
            Err(e) => {
                if !self.handle.is_closed() {
                    tracing::warn!("Stream {} failed to open: {}", id, e);
                    self.handle.shared.set_state(StreamState::Error);
                    notify_error(&self.subscribers, StreamError::Transport(e.to_string()));
                }
                return;
            }
        };

        if self.handle.is_closed() {
            return;
        }
        self.handle.shared.set_state(StreamState::Open);
        tracing::debug!("Stream {} open", id);

        let mut decoder = StreamDecoder::new();
        for event in SseEvents::new(reader) {
            if self.handle.is_closed() {
                return;
            }
            match event {
                Ok(event) => {
                    let sample = match event {
                        SseEvent::Data(data) => decoder.handle(&data),
                        SseEvent::Malformed => {
                            decoder.reject("line is not valid UTF-8");
                            None
                        }
                    };
                    self.publish_stats(decoder.stats());
                    if let Some(sample) = sample {
                        self.deliver(sample);
                    }
                }
                Err(e) => {
                    if !self.handle.is_closed() {
                        tracing::warn!("Stream {} read error: {}", id, e);
                        self.handle.shared.set_state(StreamState::Error);
                        notify_error(&self.subscribers, StreamError::Transport(e.to_string()));
                    }
                    return;
                }
            }
        }

        if !self.handle.is_closed() {
            tracing::info!("Stream {} ended by server", id);
            self.handle.shared.set_state(StreamState::Closed);
            notify_error(&self.subscribers, StreamError::Ended);
        }
    }

    /// Publish counters unless a newer connection already owns them
    fn publish_stats(&self, latest: StreamStats) {
        if let Ok(mut stats) = self.stats.lock() {
            // open() resets the counters after closing this handle
            if !self.handle.is_closed() {
                *stats = latest;
            }
        }
    }

    fn deliver(&self, sample: Sample) {
        if let Ok(mut subs) = self.subscribers.lock() {
            // Re-check under the lock so nothing is delivered after close()
            if self.handle.is_closed() {
                return;
            }
            for callback in subs.samples.iter_mut() {
                callback(sample);
            }
        }
    }
}
