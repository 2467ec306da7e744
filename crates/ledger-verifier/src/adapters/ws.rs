//! WebSocket transport to a Validator.
//!
//! Each message is one JSON text frame `{"event": <kind>, "data": <payload>}`.
//! A writer task drains a command queue into the socket sink; a reader task
//! decodes frames onto the inbound channel and answers pings. Closing the
//! connection aborts the reader, which ends the inbound stream.

use crate::domain::{InboundMessage, OutboundMessage, SocketOptions, TransportError};
use crate::ports::{Connection, Transport, TransportChannel, TransportEvent};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Inbound queue depth per connection.
const INBOUND_CAPACITY: usize = 256;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Map `http(s)://` Validator addresses onto `ws(s)://`.
pub fn to_ws_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

/// `Transport` backed by tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }

    fn tls_connector(url: &str, options: &SocketOptions) -> Result<Option<Connector>, TransportError> {
        if !url.starts_with("wss://") || options.reject_unauthorized {
            return Ok(None);
        }
        // Validators commonly present self-signed certificates.
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| TransportError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(Connector::NativeTls(connector)))
    }

    async fn connect_once(url: &str, options: &SocketOptions) -> Result<WsStream, TransportError> {
        let connector = Self::tls_connector(url, options)?;
        let handshake = connect_async_tls_with_config(url, None, false, connector);

        match tokio::time::timeout(options.timeout, handshake).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(TransportError::ConnectFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TransportError::ConnectTimeout {
                url: url.to_string(),
                timeout: options.timeout,
            }),
        }
    }

    fn spawn_channel(stream: WsStream) -> TransportChannel {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let (mut write, mut read) = stream.split();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::channel(INBOUND_CAPACITY);

        tokio::spawn(async move {
            while let Some(frame) = cmd_rx.recv().await {
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = write.send(frame).await {
                    debug!(serial, error = %e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let pong_tx = cmd_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<InboundMessage>(text.as_str()) {
                            Ok(message) => {
                                if event_tx.send(TransportEvent::Message(message)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(serial, error = %e, "Ignoring unrecognised Validator frame");
                            }
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        let _ = event_tx
                            .send(TransportEvent::Error(TransportError::Channel(e.to_string())))
                            .await;
                        break;
                    }
                }
            }
            debug!(serial, "WebSocket reader finished");
        });

        let connection = Arc::new(WsConnection {
            serial,
            commands: cmd_tx,
            closed: AtomicBool::new(false),
            reader: Mutex::new(Some(reader)),
        });

        TransportChannel {
            connection,
            inbound: event_rx,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(
        &self,
        url: &str,
        options: &SocketOptions,
    ) -> Result<TransportChannel, TransportError> {
        let ws_url = to_ws_url(url);
        let attempts = options.reconnection.attempts();
        let mut attempt = 1;

        loop {
            match Self::connect_once(&ws_url, options).await {
                Ok(stream) => {
                    debug!(url = %ws_url, attempt, "Connected to Validator");
                    return Ok(Self::spawn_channel(stream));
                }
                Err(e) if attempt < attempts => {
                    let delay = options.reconnection.backoff(attempt);
                    warn!(
                        url = %ws_url,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

struct WsConnection {
    serial: u64,
    commands: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection for WsConnection {
    fn serial(&self) -> u64 {
        self.serial
    }

    fn emit(&self, message: OutboundMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let text =
            serde_json::to_string(&message).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.commands
            .send(Message::Text(text.into()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.commands.send(Message::Close(None));
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        debug!(serial = self.serial, "WebSocket connection closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}
