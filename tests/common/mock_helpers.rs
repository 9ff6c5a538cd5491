//! In-process HTTP fixture server standing in for the bridge
//!
//! Serves one response per connection (`Connection: close`). Event-stream
//! responses write their events with a pause between them, optionally keep
//! the connection open for a while, then close it.

use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// A request as seen by the fixture server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    /// Body parsed as JSON, `Null` when it is not JSON
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// What the fixture answers
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    Json { status: u16, body: Value },
    Text { status: u16, body: String },
    EventStream {
        events: Vec<String>,
        interval: Duration,
        /// How long to keep the connection open after the last event
        hold: Duration,
    },
}

impl FixtureResponse {
    pub fn ok(body: Value) -> Self {
        FixtureResponse::Json { status: 200, body }
    }

    pub fn json(status: u16, body: Value) -> Self {
        FixtureResponse::Json { status, body }
    }

    pub fn not_found() -> Self {
        FixtureResponse::Text {
            status: 404,
            body: "not found".to_string(),
        }
    }

    pub fn events(events: Vec<String>) -> Self {
        FixtureResponse::EventStream {
            events,
            interval: Duration::from_millis(5),
            hold: Duration::ZERO,
        }
    }
}

type Handler = Arc<dyn Fn(&RecordedRequest) -> FixtureResponse + Send + Sync>;

/// Bridge stand-in listening on a random local port
pub struct FixtureServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FixtureServer {
    pub fn start(
        handler: impl Fn(&RecordedRequest) -> FixtureResponse + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
        listener
            .set_nonblocking(true)
            .expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");

        let handler: Handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let requests = requests.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, _)) => {
                            let handler = handler.clone();
                            let requests = requests.clone();
                            let shutdown = shutdown.clone();
                            std::thread::spawn(move || {
                                serve(stream, &handler, &requests, &shutdown)
                            });
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            })
        };

        Self {
            addr,
            requests,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests to `path`
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A base URL nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

fn serve(
    stream: TcpStream,
    handler: &Handler,
    requests: &Mutex<Vec<RecordedRequest>>,
    shutdown: &AtomicBool,
) {
    let _ = stream.set_nonblocking(false);
    let Some(request) = read_request(&stream) else {
        return;
    };
    requests.lock().unwrap().push(request.clone());

    let mut stream = stream;
    match handler(&request) {
        FixtureResponse::Json { status, body } => {
            write_body(&mut stream, status, "application/json", &body.to_string());
        }
        FixtureResponse::Text { status, body } => {
            write_body(&mut stream, status, "text/plain", &body);
        }
        FixtureResponse::EventStream {
            events,
            interval,
            hold,
        } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
                        Cache-Control: no-cache\r\nConnection: close\r\n\r\n";
            if stream.write_all(head.as_bytes()).is_err() {
                return;
            }
            for event in events {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                let frame = format!("data: {}\n\n", event);
                if stream.write_all(frame.as_bytes()).is_err() || stream.flush().is_err() {
                    return;
                }
                std::thread::sleep(interval);
            }
            let mut held = Duration::ZERO;
            while held < hold && !shutdown.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
                held += Duration::from_millis(10);
            }
        }
    }
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_body(stream: &mut TcpStream, status: u16, content_type: &str, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
