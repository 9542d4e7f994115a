//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate base URLs (parseable, http or https)
//! - Validate value ranges (delays, timeouts, attempts > 0)
//! - Check the long-poll deadline outlasts the server's hold window
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SyncConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BackoffStrategy, ClientEndpointConfig, SyncConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("http.url must name at least one endpoint")]
    NoEndpoints,

    #[error("http.url entry '{url}' is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http.{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("http.listen_timeout ({listen}s) must exceed http.long_poll_window ({window}s)")]
    ListenTimeoutTooShort { listen: u64, window: u64 },

    #[error("http.max_backoff ({max}s) must not be below http.delay_time ({delay}s)")]
    BackoffCapTooLow { max: u64, delay: u64 },

    #[error("http.groups must not be empty")]
    NoGroups,

    #[error("http.{field} must start with '/': {value}")]
    RelativePath { field: &'static str, value: String },
}

/// Validate the whole configuration.
pub fn validate_config(config: &SyncConfig) -> Result<(), Vec<ValidationError>> {
    let errors = validate_endpoint(&config.http);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint(http: &ClientEndpointConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let endpoints = http.endpoints();
    if endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }
    for endpoint in endpoints {
        match url::Url::parse(&endpoint) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => errors.push(ValidationError::InvalidUrl {
                url: endpoint.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidUrl {
                url: endpoint.clone(),
                reason: e.to_string(),
            }),
        }
    }

    for (field, value) in [
        ("delay_time", http.delay_time),
        ("connection_timeout", http.connection_timeout),
        ("listen_timeout", http.listen_timeout),
        ("startup_max_attempts", u64::from(http.startup_max_attempts)),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if http.listen_timeout <= http.long_poll_window {
        errors.push(ValidationError::ListenTimeoutTooShort {
            listen: http.listen_timeout,
            window: http.long_poll_window,
        });
    }

    if http.backoff == BackoffStrategy::Exponential && http.max_backoff < http.delay_time {
        errors.push(ValidationError::BackoffCapTooLow {
            max: http.max_backoff,
            delay: http.delay_time,
        });
    }

    if http.groups.is_empty() {
        errors.push(ValidationError::NoGroups);
    }

    for (field, value) in [
        ("fetch_path", &http.fetch_path),
        ("listener_path", &http.listener_path),
    ] {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }

    errors
}
