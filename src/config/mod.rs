//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! <root>/config.toml
//!     → loader.rs (resolve root, read & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → borrowed by the startup pipeline, never mutated afterwards
//!
//! `init` command:
//!     loader.rs generates identity → writes default config.toml
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - A missing file is a distinct `NotInitialized` error, not an IO error

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::DaemonConfig;
pub use schema::DatastoreConfig;
pub use schema::IdentityConfig;
pub use schema::LogFormat;
pub use schema::MonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::PandoConfig;
