//! WebSocket relay of signed transactions
//!
//! Each client connection triggers one build-sign cycle. The serialized
//! transaction is pushed to the listener as a JSON envelope before
//! submission, and the broadcast fires once the configured delay from
//! signing has elapsed, regardless of relay delivery outcome. Once a
//! transaction is signed there is no cancellation path.
//!
//! Simultaneous connections do not get unbounded concurrent signing: a
//! semaphore caps in-flight build-sign cycles (single-flight by default).

use crate::builder::SignedTransaction;
use crate::config::RelayConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::gateway::Broadcaster;
use async_trait::async_trait;
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::sleep_until;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

/// Envelope pushed to a listener: one message per connection
///
/// Wire shape: `{"transactions":[{"data":[..],"meta":{"size":N}}]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// The relayed transactions (always exactly one here)
    pub transactions: Vec<RelayPacket>,
}

/// A single relayed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPacket {
    /// Raw serialized transaction bytes
    pub data: Vec<u8>,

    /// Packet metadata
    pub meta: PacketMeta,
}

/// Metadata accompanying a relayed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketMeta {
    /// Byte length of `data`
    pub size: u64,
}

impl RelayEnvelope {
    /// Wrap one serialized transaction
    pub fn single(bytes: &[u8]) -> Self {
        Self {
            transactions: vec![RelayPacket {
                data: bytes.to_vec(),
                meta: PacketMeta {
                    size: bytes.len() as u64,
                },
            }],
        }
    }
}

/// Produces the signed transaction relayed on each connection
///
/// The production implementation runs the configured swap build-sign
/// flow; tests substitute a mock.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Build and sign the next transaction to relay
    async fn next_transaction(&self) -> PipelineResult<SignedTransaction>;
}

/// WebSocket relay server
pub struct RelayServer {
    source: Arc<dyn TransactionSource>,
    broadcaster: Arc<dyn Broadcaster>,
    broadcast_delay: Duration,
    permits: Arc<Semaphore>,
}

impl RelayServer {
    /// Create a server from configuration
    pub fn new(
        source: Arc<dyn TransactionSource>,
        broadcaster: Arc<dyn Broadcaster>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            source,
            broadcaster,
            broadcast_delay: Duration::from_millis(config.broadcast_delay_ms),
            permits: Arc::new(Semaphore::new(config.max_inflight)),
        }
    }

    /// Bind the listening socket
    pub async fn bind(addr: &str) -> PipelineResult<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| PipelineError::Relay(format!("bind {} failed: {}", addr, e)))
    }

    /// Accept connections until the listener fails
    ///
    /// Each connection runs in its own task; a failed cycle never takes
    /// down the accept loop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> PipelineResult<()> {
        info!(
            addr = %listener.local_addr().map_err(|e| PipelineError::Relay(e.to_string()))?,
            "Relay server listening"
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        info!(peer = %peer, "Client connected");

        let mut ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(peer = %peer, error = %e, "WebSocket handshake failed");
                return;
            }
        };

        // Cap concurrent build-sign cycles across connections
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let signed = match self.source.next_transaction().await {
            Ok(signed) => signed,
            Err(e) => {
                // Contained: this connection is done, the server stays up
                error!(peer = %peer, category = e.category(), error = %e, "Build-sign cycle failed");
                return;
            }
        };
        drop(permit);

        // Broadcast is scheduled from the signing instant, not from relay
        // delivery
        let deadline = signed.signed_at + self.broadcast_delay;

        self.push_envelope(&mut ws, &signed, peer).await;

        sleep_until(deadline).await;

        // Unconditional once signed: relay failure does not cancel it
        match self.broadcaster.broadcast(&signed.tx).await {
            Ok(signature) => {
                info!(peer = %peer, signature = %signature, "Transaction broadcast");
            }
            Err(e) => {
                error!(peer = %peer, category = e.category(), error = %e, "Broadcast failed");
            }
        }
    }

    async fn push_envelope(
        &self,
        ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
        signed: &SignedTransaction,
        peer: SocketAddr,
    ) {
        let envelope = RelayEnvelope::single(&signed.bytes);
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Envelope serialization failed");
                return;
            }
        };

        match ws.send(Message::Text(payload)).await {
            Ok(()) => {
                info!(peer = %peer, size = signed.len(), "Relayed pending transaction");
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Relay send failed, broadcast proceeds");
            }
        }
    }
}
