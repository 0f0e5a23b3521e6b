//! Daemon facade tying startup, run state and shutdown together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::DaemonConfig;
use crate::lifecycle::coordinator::ShutdownCoordinator;
use crate::lifecycle::outcome::DaemonResult;
use crate::lifecycle::resource::ShutdownError;
use crate::lifecycle::shutdown::ShutdownListener;
use crate::lifecycle::startup::{initialize, StartupError, StartupProgress};
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::lifecycle::watchdog::{ProcessExit, Terminator};
use crate::net::identity::PeerId;
use crate::net::multiaddr::Multiaddr;

/// Errors surfaced to the process exit path.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon did not start correctly: {0}")]
    Start(#[from] StartupError),

    #[error("daemon did not stop gracefully: {0}")]
    Stop(#[from] ShutdownError),

    /// Only reachable when the watchdog's terminator returns instead of exiting.
    #[error("daemon did not stop within its shutdown budget")]
    Overrun,
}

/// A started daemon holding every subsystem handle.
pub struct Daemon {
    lifecycle: Lifecycle,
    coordinator: ShutdownCoordinator,
    peer_id: PeerId,
    listen_addr: Multiaddr,
}

impl Daemon {
    /// Start every subsystem. A watchdog expiry exits the process.
    pub async fn start(config: &DaemonConfig, root: &Path) -> Result<Self, StartupError> {
        Self::start_with(config, root, Arc::new(ProcessExit)).await
    }

    /// Start with a custom watchdog side effect.
    pub async fn start_with(
        config: &DaemonConfig,
        root: &Path,
        terminator: Arc<dyn Terminator>,
    ) -> Result<Self, StartupError> {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Initializing);

        let mut progress = StartupProgress::new();
        let handles = match initialize(config, root, &mut progress).await {
            Ok(handles) => handles,
            Err(e) => {
                lifecycle.transition(LifecycleState::Failed);
                return Err(e);
            }
        };

        let peer_id = handles.endpoint.peer_id();
        let listen_addr = handles.endpoint.local_addr();
        let budget = Duration::from_secs(config.shutdown.timeout_secs);
        let coordinator = ShutdownCoordinator::new(budget, terminator)
            .with_resources(handles.into_close_order());

        lifecycle.transition(LifecycleState::Running);
        tracing::info!(peer_id = %peer_id, multiaddr = %listen_addr, "Daemon running");

        Ok(Self {
            lifecycle,
            coordinator,
            peer_id,
            listen_addr,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Address the network endpoint is bound to.
    pub fn listen_addr(&self) -> Multiaddr {
        self.listen_addr
    }

    /// Block until the stop signal fires.
    pub async fn wait(&self, mut stop: ShutdownListener) {
        stop.recv().await;
        tracing::info!("Shutting down daemon");
    }

    /// Close every handle under the watchdog. Later calls are no-ops.
    pub async fn shutdown(&mut self) -> DaemonResult {
        if self.lifecycle.state() != LifecycleState::Running {
            tracing::debug!(state = %self.lifecycle.state(), "Daemon already shut down");
            return DaemonResult::default();
        }
        self.lifecycle.transition(LifecycleState::ShuttingDown);

        let result = self.coordinator.shutdown().await;
        let next = if result.watchdog_fired() {
            LifecycleState::ForceTerminated
        } else {
            LifecycleState::Stopped
        };
        self.lifecycle.transition(next);
        tracing::info!("node stopped");
        result
    }

    /// Wait for the stop signal, then shut down.
    pub async fn run_until_stopped(mut self, stop: ShutdownListener) -> DaemonResult {
        self.wait(stop).await;
        self.shutdown().await
    }
}
