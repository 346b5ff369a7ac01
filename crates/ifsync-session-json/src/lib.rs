// # JSON-lines telemetry transport
//
// This crate provides a concrete telemetry session and config pusher for
// ifsync, speaking newline-delimited JSON over a plain TCP connection.
//
// ## Protocol
//
// The client opens a connection and writes a single subscribe request:
//
// ```json
// {"type":"subscribe","paths":["/interfaces/..."],"username":"admin"}
// ```
//
// The server then streams one message per line:
//
// ```json
// {"type":"update","prefix":"/interfaces/interface[name=Ethernet1]","updates":[{"path":"state/admin-status","value":"UP"}]}
// {"type":"sync","complete":true}
// {"type":"error","message":"..."}
// ```
//
// Configuration writes use a separate short-lived connection per request:
//
// ```json
// {"type":"set","path":"...","value":{"config":{"ip":"10.0.1.1","prefix-length":24}}}
// {"type":"set_response","ok":true}
// ```
//
// ## TLS
//
// This is a plaintext transport. The configuration surface accepts TLS
// material for the benefit of other transports; constructors here reject a
// config that asks for TLS rather than silently ignoring it.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use ifsync_core::config::SessionConfig;
use ifsync_core::traits::{ConfigPusher, LeafUpdate, TelemetryMessage, TelemetrySession};
use ifsync_core::{Error, Result};

/// Configuration path template for an interface's IPv4 address
fn ipv4_config_path(interface: &str, address: &str) -> String {
    format!(
        "/interfaces/interface[name={interface}]/subinterfaces/subinterface[index=0]\
         /ipv4/addresses/address[ip={address}]"
    )
}

/// One line sent by the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientRequest {
    Subscribe {
        paths: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    Set {
        path: String,
        value: serde_json::Value,
    },
}

/// One line sent by the server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Update {
        prefix: String,
        updates: Vec<WireLeaf>,
    },
    Sync {
        complete: bool,
    },
    Error {
        message: String,
    },
    SetResponse {
        ok: bool,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct WireLeaf {
    path: String,
    value: String,
}

fn reject_tls(config: &SessionConfig) -> Result<()> {
    if config.tls
        || config.ca_file.is_some()
        || config.cert_file.is_some()
        || config.key_file.is_some()
    {
        return Err(Error::config(
            "the json transport is plaintext; TLS options are not supported",
        ));
    }
    Ok(())
}

async fn write_line(stream: &mut TcpStream, request: &ClientRequest) -> Result<()> {
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Telemetry session over newline-delimited JSON/TCP
pub struct JsonTelemetrySession {
    config: SessionConfig,
}

impl JsonTelemetrySession {
    /// Create a session from validated configuration
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        reject_tls(&config)?;
        Ok(Self { config })
    }
}

impl TelemetrySession for JsonTelemetrySession {
    fn subscribe(
        &self,
        paths: &[&str],
    ) -> Pin<Box<dyn Stream<Item = Result<TelemetryMessage>> + Send + 'static>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();

        // The reader task ends when the connection does or the stream is
        // dropped; either way there is nothing to clean up beyond the socket.
        tokio::spawn(async move {
            if let Err(e) = run_subscription(config, paths, &tx).await {
                let _ = tx.send(Err(e));
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

async fn run_subscription(
    config: SessionConfig,
    paths: Vec<String>,
    tx: &mpsc::UnboundedSender<Result<TelemetryMessage>>,
) -> Result<()> {
    let mut stream = TcpStream::connect(&config.addr).await?;
    info!(addr = config.addr.as_str(), "telemetry session established");

    write_line(
        &mut stream,
        &ClientRequest::Subscribe {
            paths,
            username: config.username.clone(),
            password: config.password.clone(),
        },
    )
    .await?;

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let forwarded = match serde_json::from_str::<ServerMessage>(&line)? {
            ServerMessage::Update { prefix, updates } => TelemetryMessage::Updates {
                prefix,
                updates: updates
                    .into_iter()
                    .map(|leaf| LeafUpdate::new(leaf.path, leaf.value))
                    .collect(),
            },
            ServerMessage::Sync { complete } => TelemetryMessage::SyncComplete(complete),
            ServerMessage::Error { message } => return Err(Error::session(message)),
            ServerMessage::SetResponse { .. } => {
                return Err(Error::session("unexpected set response on subscription"));
            }
        };

        if tx.send(Ok(forwarded)).is_err() {
            // Stream dropped by the consumer.
            debug!("subscription receiver dropped, closing session");
            return Ok(());
        }
    }

    // Connection closed by the server; the consumer treats stream end as a
    // fatal session condition.
    Ok(())
}

/// Config pusher over newline-delimited JSON/TCP
///
/// Opens a short-lived connection per set request; one write, one response.
pub struct JsonConfigPusher {
    config: SessionConfig,
}

impl JsonConfigPusher {
    /// Create a pusher from validated configuration
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        reject_tls(&config)?;
        Ok(Self { config })
    }
}

#[async_trait::async_trait]
impl ConfigPusher for JsonConfigPusher {
    async fn set_address(&self, interface: &str, address: &str, prefix_len: u8) -> Result<()> {
        let request = ClientRequest::Set {
            path: ipv4_config_path(interface, address),
            value: serde_json::json!({
                "config": { "ip": address, "prefix-length": prefix_len }
            }),
        };

        let mut stream = TcpStream::connect(&self.config.addr).await?;
        write_line(&mut stream, &request).await?;

        let mut lines = BufReader::new(stream).lines();
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| Error::push("connection closed before set response"))?;

        match serde_json::from_str::<ServerMessage>(&line)? {
            ServerMessage::SetResponse { ok: true, .. } => {
                debug!(interface, address, prefix_len, "configuration accepted");
                Ok(())
            }
            ServerMessage::SetResponse { ok: false, message } => Err(Error::push(
                message.unwrap_or_else(|| "set request rejected".to_string()),
            )),
            _ => Err(Error::push("unexpected response to set request")),
        }
    }

    fn pusher_name(&self) -> &'static str {
        "json-tcp"
    }
}
