//! Ingestion provider subsystem.
//!
//! # Data Flow
//! ```text
//! monitor → TaskQueue (queue.rs)
//!     → ingest.rs worker
//!         → LinkSystem (advertisement node, linked to previous head)
//!         → Datastore (/sync/latest)
//!         → Announcer (signed head served by the network endpoint)
//! ```

pub mod ingest;
pub mod queue;

pub use ingest::{Advertisement, IngestionProvider, PandoInfo, ProviderError, HEAD_KEY};
pub use queue::{QueueClosed, Task, TaskQueue};
