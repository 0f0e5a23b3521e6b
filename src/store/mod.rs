//! Persistent storage subsystem.
//!
//! # Data Flow
//! ```text
//! datastore.rs (opaque records, persisted to <dir>/records.json)
//!     → blockstore.rs (blocks keyed by BLAKE3 content id)
//!     → linksystem.rs (typed JSON nodes resolved by content id)
//! ```
//!
//! # Design Decisions
//! - Only the datastore has a lifecycle; the layers above are pure composition
//! - The orchestrator closes the datastore after every component holding a clone

pub mod blockstore;
pub mod datastore;
pub mod linksystem;

pub use blockstore::{Blockstore, Cid};
pub use datastore::{check_writable, Datastore, StoreError, SUPPORTED_BACKEND};
pub use linksystem::{LinkError, LinkSystem};
