//! Configuration loading from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::DaemonConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::net::identity;

/// Name of the config file inside the root directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the config root.
pub const ROOT_ENV_VAR: &str = "PANDO_PROVIDER_PATH";

const DEFAULT_ROOT_DIR: &str = ".pando-provider";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file exists yet; the operator must run `init` first.
    #[error("config file not found at {}", .0.display())]
    NotInitialized(PathBuf),

    /// `init` was asked to write over an existing config.
    #[error("config file already exists at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// Neither an explicit root, the env override nor `$HOME` is available.
    #[error("cannot determine config root: set {ROOT_ENV_VAR} or HOME")]
    NoRoot,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the config root directory.
///
/// Precedence: explicit override, then `PANDO_PROVIDER_PATH`, then `$HOME/.pando-provider`.
pub fn config_root(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(DEFAULT_ROOT_DIR))
        .ok_or(ConfigError::NoRoot)
}

/// Resolve a configured directory against the config root.
pub fn path(root: &Path, dir: &str) -> PathBuf {
    let dir = Path::new(dir);
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// Load and validate the configuration stored under `root`.
pub fn load(root: &Path) -> Result<DaemonConfig, ConfigError> {
    let file = root.join(CONFIG_FILE_NAME);
    let content = match fs::read_to_string(&file) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::NotInitialized(file));
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };
    let config: DaemonConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Write a fresh default configuration with a newly generated identity.
pub fn init(root: &Path) -> Result<DaemonConfig, ConfigError> {
    let file = root.join(CONFIG_FILE_NAME);
    if file.exists() {
        return Err(ConfigError::AlreadyInitialized(file));
    }

    let mut config = DaemonConfig::default();
    config.identity = identity::generate();

    fs::create_dir_all(root)?;
    fs::write(&file, toml::to_string_pretty(&config)?)?;

    tracing::info!(
        path = %file.display(),
        peer_id = %config.identity.peer_id,
        "Initialized provider config"
    );
    Ok(config)
}
