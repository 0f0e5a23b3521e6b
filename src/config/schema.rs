//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the provider daemon.
//! All types derive Serde traits for deserialization from the TOML config file.

use serde::{Deserialize, Serialize};

use crate::lifecycle::DEFAULT_SHUTDOWN_BUDGET;

/// Root configuration for the provider daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Identity key material for the network endpoint.
    pub identity: IdentityConfig,

    /// Network endpoint settings (listen address).
    pub provider_server: ProviderServerConfig,

    /// Persistent store backend and location.
    pub datastore: DatastoreConfig,

    /// Remote coordinator the ingestion provider announces to.
    pub pando: PandoConfig,

    /// Remote data source polled by the monitor.
    pub monitor: MonitorConfig,

    /// Shutdown budget.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identity key material.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Hex-encoded public key. Empty means "derive from `priv_key`".
    pub peer_id: String,

    /// Base64-encoded 32-byte ed25519 secret key.
    pub priv_key: String,
}

/// Network endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderServerConfig {
    /// Listen address (e.g., "/ip4/0.0.0.0/tcp/3104").
    pub listen_multiaddr: String,
}

impl Default for ProviderServerConfig {
    fn default() -> Self {
        Self {
            listen_multiaddr: "/ip4/0.0.0.0/tcp/3104".to_string(),
        }
    }
}

/// Datastore configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Backend kind. Only "levelds" is supported.
    #[serde(rename = "type")]
    pub kind: String,

    /// Store directory, relative to the config root unless absolute.
    pub dir: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            kind: "levelds".to_string(),
            dir: "datastore".to_string(),
        }
    }
}

/// Coordinator the ingestion provider announces to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PandoConfig {
    /// Coordinator address.
    pub multiaddr: String,

    /// Coordinator peer id (hex). Optional.
    pub peer_id: String,

    /// Announcement topic.
    pub topic: String,
}

impl Default for PandoConfig {
    fn default() -> Self {
        Self {
            multiaddr: "/ip4/127.0.0.1/tcp/9002".to_string(),
            peer_id: String::new(),
            topic: "/pando/v0.0.1".to_string(),
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// URL of the remote JSON document to watch.
    pub data_url: String,

    /// Polling interval in seconds.
    pub interval_secs: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_url: "https://hub.textile.io/thread/bafkwblbznyqkmqx5l677z3kjsslhxo2vbbqh6wluunvvdbmqattrdya/buckets/bafzbeibjg7kky45npdwnogui5ffla7dint62xpttvvlzrsbewlrfmbusya/miner-locations-latest.json".to_string(),
            interval_secs: 600,
            request_timeout_secs: 30,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Budget for closing every resource, in seconds.
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SHUTDOWN_BUDGET.as_secs(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
