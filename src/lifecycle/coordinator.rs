//! Shutdown coordination.
//!
//! # Responsibilities
//! - Close every owned resource in reverse construction order
//! - Keep going when a close fails
//! - Race the whole sequence against the watchdog budget

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::lifecycle::outcome::{DaemonResult, ErrorAggregator};
use crate::lifecycle::resource::{Closeable, ShutdownError};
use crate::lifecycle::watchdog::{Terminator, Watchdog};
use crate::observability::metrics;

/// Default shutdown budget.
pub const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

/// Owns the resources to close and the budget to close them in.
pub struct ShutdownCoordinator {
    /// Resources in close order.
    resources: Vec<Box<dyn Closeable>>,
    budget: Duration,
    terminator: Arc<dyn Terminator>,
}

impl ShutdownCoordinator {
    pub fn new(budget: Duration, terminator: Arc<dyn Terminator>) -> Self {
        Self {
            resources: Vec::new(),
            budget,
            terminator,
        }
    }

    /// Append a resource to the close sequence.
    pub fn push(&mut self, resource: Box<dyn Closeable>) {
        self.resources.push(resource);
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Box<dyn Closeable>>) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Number of resources still waiting to be closed.
    pub fn pending(&self) -> usize {
        self.resources.len()
    }

    /// Close every resource once, in order, under the watchdog.
    ///
    /// Each resource is removed from the coordinator before its close is
    /// attempted, so calling this again afterwards is a no-op.
    pub async fn shutdown(&mut self) -> DaemonResult {
        if self.resources.is_empty() {
            tracing::debug!("Shutdown requested with nothing left to close");
            return DaemonResult::default();
        }

        tracing::info!(
            resources = self.resources.len(),
            budget_secs = self.budget.as_secs_f64(),
            "Shutting down"
        );

        let watchdog = Watchdog::arm(self.budget, self.terminator.clone());
        let mut aggregator = ErrorAggregator::new();

        for mut resource in std::mem::take(&mut self.resources) {
            let kind = resource.kind();
            let started = Instant::now();
            let result = resource.close().await.map_err(|source| ShutdownError {
                resource: kind,
                source,
            });
            metrics::record_resource_close(kind.as_str(), result.is_ok(), started);

            match &result {
                Ok(()) => tracing::info!(resource = %kind, "Resource closed"),
                Err(e) => tracing::error!(resource = %kind, error = %e.source, "Error closing resource"),
            }
            aggregator.record(kind, result);
        }

        let fired = watchdog.disarm().await;
        let result = aggregator.finish(fired);
        if result.is_ok() {
            tracing::info!("Shutdown complete");
        } else {
            tracing::warn!(failures = result.failures().count(), "Shutdown completed with errors");
        }
        result
    }
}
