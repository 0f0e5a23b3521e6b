//! Ingestion provider.
//!
//! # Responsibilities
//! - Consume tasks from the queue handed to the monitor
//! - Link each payload into an advertisement chain
//! - Persist the chain head and announce it through the network endpoint
//!
//! # Design Decisions
//! - A single worker task owns the chain head, so advertisements never fork
//! - On close the worker stops taking new work but drains what is already queued

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::PandoConfig;
use crate::lifecycle::shutdown::{Shutdown, ShutdownListener};
use crate::net::endpoint::{Announcer, NetworkEndpoint};
use crate::net::identity::{IdentityError, PeerId};
use crate::net::multiaddr::{Multiaddr, MultiaddrError};
use crate::observability::metrics;
use crate::provider::queue::{Task, TaskQueue, DEFAULT_QUEUE_CAPACITY};
use crate::store::blockstore::InvalidCid;
use crate::store::{Cid, Datastore, LinkError, LinkSystem, StoreError};

/// Datastore key holding the latest advertisement link.
pub const HEAD_KEY: &str = "/sync/latest";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid coordinator address '{addr}': {source}")]
    CoordinatorAddress {
        addr: String,
        #[source]
        source: MultiaddrError,
    },

    #[error("invalid coordinator peer id: {0}")]
    CoordinatorPeer(#[source] IdentityError),

    #[error("announcement topic must not be empty")]
    EmptyTopic,

    #[error("persisted head is corrupt: {0}")]
    CorruptHead(#[from] InvalidCid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("provider worker terminated abnormally: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Where and how the provider announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PandoInfo {
    pub multiaddr: Multiaddr,
    pub peer_id: Option<PeerId>,
    pub topic: String,
}

impl PandoInfo {
    pub fn from_config(config: &PandoConfig) -> Result<Self, ProviderError> {
        let multiaddr = config
            .multiaddr
            .parse()
            .map_err(|source| ProviderError::CoordinatorAddress {
                addr: config.multiaddr.clone(),
                source,
            })?;
        let peer_id = match config.peer_id.trim() {
            "" => None,
            id => Some(id.parse().map_err(ProviderError::CoordinatorPeer)?),
        };
        if config.topic.trim().is_empty() {
            return Err(ProviderError::EmptyTopic);
        }
        Ok(Self {
            multiaddr,
            peer_id,
            topic: config.topic.clone(),
        })
    }
}

/// One link in the advertisement chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub provider: PeerId,
    pub topic: String,
    pub previous: Option<Cid>,
    pub task_id: Uuid,
    pub source: String,
    pub payload: serde_json::Value,
}

struct Publisher {
    provider: PeerId,
    topic: String,
    datastore: Datastore,
    links: LinkSystem,
    announcer: Announcer,
    head: Arc<ArcSwapOption<Cid>>,
}

impl Publisher {
    async fn publish(&self, task: Task) -> Result<Cid, ProviderError> {
        let advertisement = Advertisement {
            provider: self.provider,
            topic: self.topic.clone(),
            previous: self.head.load_full().map(|cid| (*cid).clone()),
            task_id: task.id,
            source: task.source,
            payload: task.payload,
        };
        let cid = self.links.store(&advertisement)?;
        self.datastore.put(HEAD_KEY, cid.to_string().into_bytes())?;
        // The head is durable before anyone can observe it.
        self.datastore.flush().await?;
        self.head.store(Some(Arc::new(cid.clone())));
        self.announcer.publish(&self.topic, &cid);
        metrics::record_advertisement_published();
        Ok(cid)
    }

    async fn handle(&self, task: Task) {
        let task_id = task.id;
        match self.publish(task).await {
            Ok(cid) => tracing::info!(task_id = %task_id, head = %cid, "Advertisement published"),
            Err(e) => tracing::error!(task_id = %task_id, error = %e, "Failed to publish advertisement"),
        }
    }
}

/// The ingestion provider service.
pub struct IngestionProvider {
    info: PandoInfo,
    queue: TaskQueue,
    head: Arc<ArcSwapOption<Cid>>,
    shutdown: Shutdown,
    task: Option<JoinHandle<()>>,
}

impl IngestionProvider {
    /// Construct the provider and start its worker.
    pub fn new(
        endpoint: &NetworkEndpoint,
        datastore: Datastore,
        links: LinkSystem,
        info: PandoInfo,
    ) -> Result<Self, ProviderError> {
        let restored = match datastore.get(HEAD_KEY)? {
            Some(bytes) => Some(String::from_utf8_lossy(&bytes).parse::<Cid>()?),
            None => None,
        };

        let announcer = endpoint.announcer();
        if let Some(head) = &restored {
            announcer.publish(&info.topic, head);
        }

        let head = Arc::new(ArcSwapOption::new(restored.clone().map(Arc::new)));
        let publisher = Publisher {
            provider: endpoint.peer_id(),
            topic: info.topic.clone(),
            datastore,
            links,
            announcer,
            head: head.clone(),
        };

        let (queue, rx) = TaskQueue::channel(DEFAULT_QUEUE_CAPACITY);
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run(publisher, rx, shutdown.subscribe()));

        tracing::info!(
            coordinator = %info.multiaddr,
            coordinator_peer = ?info.peer_id,
            topic = %info.topic,
            head = ?restored,
            "Ingestion provider started"
        );

        Ok(Self {
            info,
            queue,
            head,
            shutdown,
            task: Some(task),
        })
    }

    /// Handle to the provider's task queue.
    pub fn task_queue(&self) -> TaskQueue {
        self.queue.clone()
    }

    /// Latest advertisement link, if any.
    pub fn head(&self) -> Option<Cid> {
        self.head.load_full().map(|cid| (*cid).clone())
    }

    /// Stop the worker after draining queued tasks. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), ProviderError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.shutdown.trigger();
        task.await?;
        tracing::info!(head = ?self.head(), topic = %self.info.topic, "Ingestion provider closed");
        Ok(())
    }
}

impl Drop for IngestionProvider {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(publisher: Publisher, mut rx: mpsc::Receiver<Task>, mut shutdown: ShutdownListener) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            task = rx.recv() => match task {
                Some(task) => publisher.handle(task).await,
                None => break,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Ok(task) = rx.try_recv() {
        publisher.handle(task).await;
        drained += 1;
    }
    tracing::debug!(drained, "Provider worker stopped");
}
