//! Closeable resource handles owned by the orchestrator.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::monitor::Monitor;
use crate::net::endpoint::NetworkEndpoint;
use crate::provider::IngestionProvider;
use crate::store::Datastore;

/// Boxed cause of a failed close.
pub type CloseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The resources the daemon owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    NetworkEndpoint,
    Datastore,
    IngestionProvider,
    Monitor,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkEndpoint => "network_endpoint",
            Self::Datastore => "datastore",
            Self::IngestionProvider => "ingestion_provider",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed close of one resource.
#[derive(Debug, Error)]
#[error("error closing {resource}: {source}")]
pub struct ShutdownError {
    pub resource: ResourceKind,
    #[source]
    pub source: CloseError,
}

/// A handle with a single close operation.
///
/// Implementations must tolerate being closed more than once; the coordinator
/// itself never closes a handle twice.
#[async_trait]
pub trait Closeable: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn close(&mut self) -> Result<(), CloseError>;
}

#[async_trait]
impl Closeable for NetworkEndpoint {
    fn kind(&self) -> ResourceKind {
        ResourceKind::NetworkEndpoint
    }

    async fn close(&mut self) -> Result<(), CloseError> {
        NetworkEndpoint::close(self).await.map_err(Into::into)
    }
}

#[async_trait]
impl Closeable for Datastore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Datastore
    }

    async fn close(&mut self) -> Result<(), CloseError> {
        Datastore::close(self).await.map_err(Into::into)
    }
}

#[async_trait]
impl Closeable for IngestionProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IngestionProvider
    }

    async fn close(&mut self) -> Result<(), CloseError> {
        IngestionProvider::close(self).await.map_err(Into::into)
    }
}

#[async_trait]
impl Closeable for Monitor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Monitor
    }

    async fn close(&mut self) -> Result<(), CloseError> {
        Monitor::close(self).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_error_display() {
        let err = ShutdownError {
            resource: ResourceKind::IngestionProvider,
            source: "ProviderCloseError".into(),
        };
        assert_eq!(
            err.to_string(),
            "error closing ingestion_provider: ProviderCloseError"
        );
    }

    #[tokio::test]
    async fn test_datastore_close_through_trait() {
        let dir = tempfile::tempdir().unwrap();
        let mut store: Box<dyn Closeable> = Box::new(Datastore::open(dir.path()).unwrap());
        assert_eq!(store.kind(), ResourceKind::Datastore);
        store.close().await.unwrap();
        store.close().await.unwrap();
    }
}
