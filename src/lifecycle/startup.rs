//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct every subsystem in dependency order
//! - Hand each constructed handle to the next constructor
//! - Report which step failed
//!
//! # Design Decisions
//! - Fail fast: the first failing step aborts startup, nothing after it runs
//! - No retries
//! - No rollback: handles built before the failing step are not closed

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{loader, DaemonConfig};
use crate::lifecycle::resource::Closeable;
use crate::monitor::{Monitor, MonitorError, MonitorSettings};
use crate::net::endpoint::{EndpointError, NetworkEndpoint};
use crate::net::identity::{Identity, IdentityError};
use crate::net::multiaddr::{Multiaddr, MultiaddrError};
use crate::observability::metrics;
use crate::provider::{IngestionProvider, PandoInfo, ProviderError};
use crate::store::{self, Blockstore, Datastore, LinkSystem, StoreError};

/// Startup pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    NetworkEndpoint,
    Datastore,
    LinkSystem,
    IngestionProvider,
    Monitor,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::NetworkEndpoint,
        Stage::Datastore,
        Stage::LinkSystem,
        Stage::IngestionProvider,
        Stage::Monitor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkEndpoint => "network_endpoint",
            Self::Datastore => "datastore",
            Self::LinkSystem => "link_system",
            Self::IngestionProvider => "ingestion_provider",
            Self::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("bad p2p address in config {addr}: {source}")]
    Config {
        addr: String,
        #[source]
        source: MultiaddrError,
    },

    #[error("cannot decode identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("cannot start network endpoint: {0}")]
    Network(#[from] EndpointError),

    #[error("only {supported} datastore type supported, {0:?} not supported", supported = store::SUPPORTED_BACKEND)]
    UnsupportedBackend(String),

    #[error("datastore at {} unavailable: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("cannot create ingestion provider: {0}")]
    ProviderInit(#[source] ProviderError),

    #[error("cannot create monitor: {0}")]
    MonitorInit(#[source] MonitorError),
}

impl StartupError {
    /// The step that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config { .. } | Self::Identity(_) | Self::Network(_) => Stage::NetworkEndpoint,
            Self::UnsupportedBackend(_) | Self::StoreUnavailable { .. } => Stage::Datastore,
            Self::ProviderInit(_) => Stage::IngestionProvider,
            Self::MonitorInit(_) => Stage::Monitor,
        }
    }
}

/// Records which steps were entered and which finished.
#[derive(Debug, Default, Clone)]
pub struct StartupProgress {
    attempted: Vec<Stage>,
    completed: Vec<Stage>,
}

impl StartupProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, stage: Stage) {
        tracing::debug!(stage = %stage, "Startup step starting");
        self.attempted.push(stage);
    }

    fn finish<T>(&mut self, stage: Stage, result: Result<T, StartupError>) -> Result<T, StartupError> {
        metrics::record_startup_stage(stage.as_str(), result.is_ok());
        match &result {
            Ok(_) => self.completed.push(stage),
            Err(e) => tracing::error!(stage = %stage, error = %e, "Startup step failed"),
        }
        result
    }

    pub fn attempted(&self) -> &[Stage] {
        &self.attempted
    }

    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }
}

/// Every handle built during startup.
pub struct Handles {
    pub endpoint: NetworkEndpoint,
    pub datastore: Datastore,
    pub link_system: LinkSystem,
    pub provider: IngestionProvider,
    pub monitor: Monitor,
}

impl Handles {
    /// Consume the handles in reverse construction order:
    /// monitor, provider, datastore, endpoint.
    pub fn into_close_order(self) -> Vec<Box<dyn Closeable>> {
        vec![
            Box::new(self.monitor),
            Box::new(self.provider),
            Box::new(self.datastore),
            Box::new(self.endpoint),
        ]
    }
}

/// Run the startup pipeline.
///
/// `root` is the config root that relative store paths resolve against.
pub async fn initialize(
    config: &DaemonConfig,
    root: &Path,
    progress: &mut StartupProgress,
) -> Result<Handles, StartupError> {
    progress.begin(Stage::NetworkEndpoint);
    let endpoint = progress.finish(Stage::NetworkEndpoint, start_endpoint(config).await)?;

    progress.begin(Stage::Datastore);
    let datastore = progress.finish(Stage::Datastore, open_datastore(config, root))?;

    progress.begin(Stage::LinkSystem);
    let link_system = LinkSystem::new(Blockstore::new(datastore.clone()));
    progress.finish::<()>(Stage::LinkSystem, Ok(()))?;

    progress.begin(Stage::IngestionProvider);
    let provider = progress.finish(
        Stage::IngestionProvider,
        PandoInfo::from_config(&config.pando)
            .and_then(|info| {
                IngestionProvider::new(&endpoint, datastore.clone(), link_system.clone(), info)
            })
            .map_err(StartupError::ProviderInit),
    )?;

    progress.begin(Stage::Monitor);
    let monitor = progress.finish(
        Stage::Monitor,
        Monitor::new(
            link_system.clone(),
            &config.monitor.data_url,
            provider.task_queue(),
            datastore.clone(),
            MonitorSettings::from(&config.monitor),
        )
        .map_err(StartupError::MonitorInit),
    )?;

    Ok(Handles {
        endpoint,
        datastore,
        link_system,
        provider,
        monitor,
    })
}

async fn start_endpoint(config: &DaemonConfig) -> Result<NetworkEndpoint, StartupError> {
    let identity = Identity::decode(&config.identity)?;

    let listen = &config.provider_server.listen_multiaddr;
    let addr: Multiaddr = listen.parse().map_err(|source| StartupError::Config {
        addr: listen.clone(),
        source,
    })?;

    let endpoint = NetworkEndpoint::bind(identity, addr).await?;
    tracing::info!(
        host_id = %endpoint.peer_id(),
        multiaddr = %endpoint.local_addr(),
        "Network endpoint initialized"
    );
    Ok(endpoint)
}

fn open_datastore(config: &DaemonConfig, root: &Path) -> Result<Datastore, StartupError> {
    if config.datastore.kind != store::SUPPORTED_BACKEND {
        return Err(StartupError::UnsupportedBackend(config.datastore.kind.clone()));
    }

    let path = loader::path(root, &config.datastore.dir);
    let unavailable = |source| StartupError::StoreUnavailable {
        path: path.clone(),
        source,
    };
    store::check_writable(&path).map_err(unavailable)?;
    Datastore::open(&path).map_err(unavailable)
}
