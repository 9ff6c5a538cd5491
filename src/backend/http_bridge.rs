//! HTTP client for the bridge server
//!
//! Every request/response endpoint answers with a JSON envelope carrying a
//! `success` flag and, on failure, an `error` message. A failed envelope is
//! surfaced verbatim as [`VibMonError::Service`]; a transport failure as
//! [`VibMonError::Transport`].
//!
//! The live stream uses a second client without a total request timeout:
//! the response body stays open for as long as the device is connected.

use crate::analysis::AnalysisReport;
use crate::backend::bridge::{ArmAck, BridgeStatus, DeviceBridge};
use crate::config::ServerConfig;
use crate::error::{Result, VibMonError};
use crate::stream::StreamTransport;
use crate::types::DeviceInfo;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::time::Duration;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct PortEntry {
    puerto: String,
    #[serde(default)]
    descripcion: String,
}

#[derive(Deserialize)]
struct PortList {
    #[serde(default)]
    puertos: Vec<PortEntry>,
}

#[derive(Deserialize)]
struct Connected {
    #[serde(default)]
    puerto: Option<String>,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    estado: BridgeStatus,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    puerto: &'a str,
}

#[derive(Serialize)]
struct ArmRequest {
    duracion: u32,
}

#[derive(Serialize)]
struct AnalyzeRequest {
    guardar_datos: bool,
}

/// Bridge reached over HTTP
pub struct HttpBridge {
    client: Client,
    stream_client: Client,
    server: ServerConfig,
}

impl HttpBridge {
    pub fn new(server: ServerConfig) -> Result<Self> {
        let timeout = Duration::from_millis(server.request_timeout_ms);
        let client = Client::builder().timeout(timeout).build()?;
        let stream_client = Client::builder()
            .connect_timeout(timeout)
            .timeout(None::<Duration>)
            .build()?;

        tracing::debug!("HTTP bridge targeting {}", server.base_url);
        Ok(Self {
            client,
            stream_client,
            server,
        })
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.server.url(path);
        tracing::trace!("GET {}", url);
        let response = self.client.get(&url).send()?;
        read_envelope(response)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let url = self.server.url(path);
        tracing::trace!("POST {}", url);
        let response = self.client.post(&url).json(body).send()?;
        read_envelope(response)
    }
}

/// Check the `success` flag and decode the rest of the body
fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text()?;

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(VibMonError::Transport(format!(
                "bridge answered HTTP {}",
                status
            )));
        }
        Err(e) => {
            return Err(VibMonError::Service(format!("malformed response: {}", e)));
        }
    };

    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| VibMonError::Service(format!("malformed response: {}", e)))?;
    if !envelope.success {
        return Err(VibMonError::Service(envelope.error.unwrap_or_else(|| {
            format!("request failed with HTTP {}", status)
        })));
    }

    serde_json::from_value(value)
        .map_err(|e| VibMonError::Service(format!("malformed response: {}", e)))
}

impl DeviceBridge for HttpBridge {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let list: PortList = self.get(&self.server.endpoints.devices)?;
        Ok(list
            .puertos
            .into_iter()
            .map(|p| DeviceInfo::new(p.puerto, p.descripcion))
            .collect())
    }

    fn connect(&self, port_id: &str) -> Result<String> {
        let connected: Connected = self.post(
            &self.server.endpoints.connect,
            &ConnectRequest { puerto: port_id },
        )?;
        Ok(connected.puerto.unwrap_or_else(|| port_id.to_string()))
    }

    fn disconnect(&self) -> Result<()> {
        let _: Value = self.post(&self.server.endpoints.disconnect, &serde_json::json!({}))?;
        Ok(())
    }

    fn status(&self) -> Result<BridgeStatus> {
        let status: Status = self.get(&self.server.endpoints.status)?;
        Ok(status.estado)
    }

    fn arm_capture(&self, duration_secs: u32) -> Result<ArmAck> {
        self.post(
            &self.server.endpoints.arm_capture,
            &ArmRequest {
                duracion: duration_secs,
            },
        )
    }

    fn analyze(&self, persist_data: bool) -> Result<AnalysisReport> {
        self.post(
            &self.server.endpoints.analyze,
            &AnalyzeRequest {
                guardar_datos: persist_data,
            },
        )
    }
}

impl StreamTransport for HttpBridge {
    fn open_stream(&self, endpoint: &str) -> Result<Box<dyn BufRead + Send>> {
        let response = self
            .stream_client
            .get(endpoint)
            .header(ACCEPT, "text/event-stream")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(VibMonError::Transport(format!(
                "stream request failed with HTTP {}",
                status
            )));
        }
        Ok(Box::new(BufReader::new(response)))
    }
}
