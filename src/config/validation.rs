//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (budgets and intervals > 0)
//! - Reject empty required fields
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Addresses, backend kind and URLs are checked by the startup pipeline,
//!   so those failures are reported against the step that needs them

use thiserror::Error;

use crate::config::schema::DaemonConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.identity.priv_key.trim().is_empty() {
        errors.push(ValidationError::new("identity.priv_key", "must not be empty"));
    }
    if config.datastore.dir.trim().is_empty() {
        errors.push(ValidationError::new("datastore.dir", "must not be empty"));
    }
    if config.pando.topic.trim().is_empty() {
        errors.push(ValidationError::new("pando.topic", "must not be empty"));
    }
    if config.monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be greater than zero"));
    }
    if config.monitor.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "monitor.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::new("shutdown.timeout_secs", "must be greater than zero"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
