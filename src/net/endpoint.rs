//! Network endpoint.
//!
//! # Responsibilities
//! - Bind the listen address under the decoded identity
//! - Hold the latest signed announcement published by the provider
//! - Serve that announcement to every peer that connects
//!
//! # Wire format
//! One JSON line per connection, then the connection is closed:
//! ```text
//! {"peer_id":"<hex>","announcement":{"peer_id":..,"topic":..,"head":..,"seq":..,"signature":..}}
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::net::identity::{Identity, PeerId};
use crate::net::multiaddr::Multiaddr;
use crate::observability::metrics;
use crate::store::Cid;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: Multiaddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept loop terminated abnormally: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A head announcement signed by the endpoint identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAnnouncement {
    pub peer_id: PeerId,
    pub topic: String,
    pub head: Cid,
    pub seq: u64,
    /// Hex-encoded ed25519 signature over `topic`, `head` and `seq`.
    pub signature: String,
}

impl SignedAnnouncement {
    fn signing_payload(topic: &str, head: &Cid, seq: u64) -> Vec<u8> {
        format!("{topic}\n{head}\n{seq}").into_bytes()
    }

    /// Check the signature against the announcing peer id.
    pub fn verify(&self) -> bool {
        let Ok(signature) = hex::decode(&self.signature) else {
            return false;
        };
        let payload = Self::signing_payload(&self.topic, &self.head, self.seq);
        self.peer_id.verify(&payload, &signature)
    }
}

/// Response written to each connecting peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadResponse {
    pub peer_id: PeerId,
    pub announcement: Option<SignedAnnouncement>,
}

/// Publishes announcements through the endpoint. Cheap to clone.
#[derive(Clone)]
pub struct Announcer {
    identity: Identity,
    latest: Arc<ArcSwapOption<SignedAnnouncement>>,
    seq: Arc<AtomicU64>,
}

impl Announcer {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            latest: Arc::new(ArcSwapOption::empty()),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sign and publish `head` on `topic`, replacing the previous announcement.
    pub fn publish(&self, topic: &str, head: &Cid) -> Arc<SignedAnnouncement> {
        let seq = self.seq.fetch_add(1, Ordering::AcqRel) + 1;
        let payload = SignedAnnouncement::signing_payload(topic, head, seq);
        let announcement = Arc::new(SignedAnnouncement {
            peer_id: self.identity.peer_id(),
            topic: topic.to_string(),
            head: head.clone(),
            seq,
            signature: hex::encode(self.identity.sign(&payload)),
        });
        self.latest.store(Some(announcement.clone()));

        tracing::debug!(topic = %topic, head = %head, seq, "Announcement published");
        announcement
    }

    pub fn latest(&self) -> Option<Arc<SignedAnnouncement>> {
        self.latest.load_full()
    }

    pub fn peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }
}

/// The daemon's network endpoint.
pub struct NetworkEndpoint {
    peer_id: PeerId,
    local_addr: SocketAddr,
    announcer: Announcer,
    shutdown: Shutdown,
    task: Option<JoinHandle<()>>,
}

impl NetworkEndpoint {
    /// Bind `addr` and start serving announcements.
    pub async fn bind(identity: Identity, addr: Multiaddr) -> Result<Self, EndpointError> {
        let listener = TcpListener::bind(addr.socket_addr())
            .await
            .map_err(|source| EndpointError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| EndpointError::Bind { addr, source })?;

        let peer_id = identity.peer_id();
        let announcer = Announcer::new(identity);
        let shutdown = Shutdown::new();
        let task = tokio::spawn(serve(listener, announcer.clone(), shutdown.subscribe()));

        Ok(Self {
            peer_id,
            local_addr,
            announcer,
            shutdown,
            task: Some(task),
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The bound address (resolves port 0 to the real port).
    pub fn local_addr(&self) -> Multiaddr {
        Multiaddr::from(self.local_addr)
    }

    pub fn announcer(&self) -> Announcer {
        self.announcer.clone()
    }

    /// Stop accepting connections. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), EndpointError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.shutdown.trigger();
        task.await?;
        tracing::info!(peer_id = %self.peer_id, "Network endpoint closed");
        Ok(())
    }
}

impl Drop for NetworkEndpoint {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn serve(listener: TcpListener, announcer: Announcer, mut shutdown: ShutdownListener) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    let response = HeadResponse {
                        peer_id: announcer.peer_id(),
                        announcement: announcer.latest().map(|a| (*a).clone()),
                    };
                    tokio::spawn(async move {
                        if let Err(e) = write_response(stream, &response).await {
                            tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to serve announcement");
                        } else {
                            metrics::record_announcement_served();
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            },
            _ = shutdown.recv() => {
                tracing::debug!("Endpoint accept loop stopping");
                break;
            }
        }
    }
}

async fn write_response(mut stream: TcpStream, response: &HeadResponse) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    stream.write_all(&line).await?;
    stream.shutdown().await
}
