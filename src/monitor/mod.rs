//! Remote data monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! ticker → HTTP GET data_url (reqwest, per-request timeout)
//!     → fingerprint body (Cid) → compare with /monitor/last
//!     → changed: link snapshot → push Task onto provider queue → record fingerprint
//! ```
//!
//! # Design Decisions
//! - Fetch errors are logged and retried on the next tick, never fatal
//! - The fingerprint is recorded only after the task is queued, so a
//!   failed hand-off is retried on the next tick

pub mod poller;

pub use poller::{FetchOutcome, Monitor, MonitorError, MonitorSettings, LAST_FETCH_KEY};
