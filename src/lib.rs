//! Pando provider daemon library.

pub mod config;
pub mod lifecycle;
pub mod monitor;
pub mod net;
pub mod observability;
pub mod provider;
pub mod store;

pub use config::schema::DaemonConfig;
pub use lifecycle::{Daemon, DaemonError, DaemonResult};
