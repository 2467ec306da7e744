//! In-process transport.
//!
//! Every `connect` hands the other end of the connection to whoever is
//! accepting on the transport, as a [`ValidatorEndpoint`]. Used by tests and
//! by embedders that run a Validator in the same process.

use crate::domain::{
    EventNotification, InboundMessage, OutboundMessage, RequestId, ResponseEnvelope,
    SocketOptions, TransportError,
};
use crate::ports::{Connection, Transport, TransportChannel, TransportEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const INBOUND_CAPACITY: usize = 256;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

type InboundSlot = Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>;

/// In-memory `Transport`.
#[derive(Clone)]
pub struct InMemoryTransport {
    accepted_tx: mpsc::UnboundedSender<ValidatorEndpoint>,
    accepted_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<ValidatorEndpoint>>>,
    refusal: Arc<Mutex<Option<TransportError>>>,
    connects: Arc<AtomicUsize>,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            accepted_tx,
            accepted_rx: Arc::new(tokio::sync::Mutex::new(accepted_rx)),
            refusal: Arc::new(Mutex::new(None)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for the next client connection.
    pub async fn accept(&self) -> Option<ValidatorEndpoint> {
        self.accepted_rx.lock().await.recv().await
    }

    /// Fail every subsequent connect with `error`; `None` accepts again.
    pub fn refuse_connects(&self, error: Option<TransportError>) {
        *self.refusal.lock() = error;
    }

    /// Connections established so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(
        &self,
        url: &str,
        _options: &SocketOptions,
    ) -> Result<TransportChannel, TransportError> {
        if let Some(error) = self.refusal.lock().clone() {
            return Err(error);
        }

        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inbound: InboundSlot = Arc::new(Mutex::new(Some(inbound_tx)));
        let closed = Arc::new(AtomicBool::new(false));

        let endpoint = ValidatorEndpoint {
            url: url.to_string(),
            serial,
            outbound: outbound_rx,
            inbound: Arc::clone(&inbound),
            closed: Arc::clone(&closed),
        };
        self.accepted_tx
            .send(endpoint)
            .map_err(|_| TransportError::ConnectFailed {
                url: url.to_string(),
                reason: "no validator endpoint accepting".into(),
            })?;
        self.connects.fetch_add(1, Ordering::Relaxed);
        debug!(url, serial, "In-memory connection established");

        Ok(TransportChannel {
            connection: Arc::new(MemoryConnection {
                serial,
                outbound: Mutex::new(Some(outbound_tx)),
                inbound,
                closed,
            }),
            inbound: inbound_rx,
        })
    }
}

struct MemoryConnection {
    serial: u64,
    outbound: Mutex<Option<mpsc::UnboundedSender<OutboundMessage>>>,
    inbound: InboundSlot,
    closed: Arc<AtomicBool>,
}

impl Connection for MemoryConnection {
    fn serial(&self) -> u64 {
        self.serial
    }

    fn emit(&self, message: OutboundMessage) -> Result<(), TransportError> {
        match self.outbound.lock().as_ref() {
            Some(tx) => tx.send(message).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.outbound.lock().take();
        self.inbound.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Validator side of an in-memory connection.
pub struct ValidatorEndpoint {
    url: String,
    serial: u64,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound: InboundSlot,
    closed: Arc<AtomicBool>,
}

impl ValidatorEndpoint {
    /// Address the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Next message sent by the client; `None` once the client closed.
    pub async fn next_message(&mut self) -> Option<OutboundMessage> {
        self.outbound.recv().await
    }

    /// Deliver a message to the client. `false` if the client is gone.
    pub fn send(&self, message: InboundMessage) -> bool {
        self.push(TransportEvent::Message(message))
    }

    /// Answer request `id`.
    pub fn respond(&self, id: &RequestId, res_obj: Value) -> bool {
        self.send(InboundMessage::Response(ResponseEnvelope {
            id: id.clone(),
            res_obj,
        }))
    }

    /// Emit an `eventReceived` notification.
    pub fn emit_event(&self, status: Value, block_data: Value) -> bool {
        self.send(InboundMessage::EventReceived(EventNotification { status, block_data }))
    }

    /// Report a channel error to the client.
    pub fn fail(&self, error: TransportError) -> bool {
        self.push(TransportEvent::Error(error))
    }

    /// Drop the connection from the Validator side.
    pub fn disconnect(&self) {
        self.inbound.lock().take();
    }

    /// Whether the client closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn push(&self, event: TransportEvent) -> bool {
        match self.inbound.lock().as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }
}
