//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Decode identity → bind endpoint → open datastore → link system
//!         → ingestion provider → monitor
//!
//! Run state (daemon.rs):
//!     Wait on the stop trigger (shutdown.rs), fired by signals.rs
//!
//! Shutdown (coordinator.rs):
//!     Arm watchdog (watchdog.rs) → close monitor, provider, datastore, endpoint
//!         → aggregate outcomes (outcome.rs) → disarm watchdog
//! ```
//!
//! # Design Decisions
//! - Ordered startup, fail fast, no retries
//! - Ordered shutdown, reverse of construction, continue on error
//! - Shutdown has a budget: forced exit after the deadline

pub mod coordinator;
pub mod daemon;
pub mod outcome;
pub mod resource;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;
pub mod watchdog;

pub use coordinator::{ShutdownCoordinator, DEFAULT_SHUTDOWN_BUDGET};
pub use daemon::{Daemon, DaemonError};
pub use outcome::{DaemonResult, ErrorAggregator, ShutdownOutcome};
pub use resource::{CloseError, Closeable, ResourceKind, ShutdownError};
pub use shutdown::{Shutdown, ShutdownListener};
pub use startup::{initialize, Handles, Stage, StartupError, StartupProgress};
pub use state::{Lifecycle, LifecycleState};
pub use watchdog::{ProcessExit, Terminator, Watchdog, FORCED_TERMINATION_EXIT_CODE};
