//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! The recognized option names of the HTTP sync client (`url`, `delayTime`,
//! `connectionTimeout`) are accepted as aliases next to the snake_case names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::DataGroup;

/// Root configuration for the sync agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Connection to the config authority.
    pub http: ClientEndpointConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How the delay between failed listen attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Always wait `delay_time`.
    #[default]
    Fixed,
    /// Double from `delay_time` up to `max_backoff`, with jitter.
    Exponential,
}

/// Connection target and timing of the HTTP sync client.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientEndpointConfig {
    /// One or more base URLs, comma-delimited, used round robin on transport error.
    pub url: String,

    /// Seconds between retry attempts on transient failure.
    #[serde(alias = "delayTime")]
    pub delay_time: u64,

    /// Seconds for the connect and read timeout of a fetch call.
    #[serde(alias = "connectionTimeout")]
    pub connection_timeout: u64,

    /// Client-side deadline of one long-poll, in seconds.
    #[serde(alias = "listenTimeout")]
    pub listen_timeout: u64,

    /// How long the server is expected to hold a long-poll, in seconds.
    #[serde(alias = "longPollWindow")]
    pub long_poll_window: u64,

    /// Attempts of the initial full fetch before startup fails.
    #[serde(alias = "startupMaxAttempts")]
    pub startup_max_attempts: u32,

    /// Growth of the delay between failed listen attempts.
    pub backoff: BackoffStrategy,

    /// Upper bound of the exponential backoff, in seconds.
    #[serde(alias = "maxBackoff")]
    pub max_backoff: u64,

    /// Path of the fetch endpoint below each base URL.
    pub fetch_path: String,

    /// Path of the long-poll endpoint below each base URL.
    pub listener_path: String,

    /// Data groups to synchronize.
    pub groups: Vec<DataGroup>,
}

impl Default for ClientEndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9095".to_string(),
            delay_time: 5,
            connection_timeout: 10,
            listen_timeout: 90,
            long_poll_window: 60,
            startup_max_attempts: 3,
            backoff: BackoffStrategy::Fixed,
            max_backoff: 60,
            fetch_path: "/configs/fetch".to_string(),
            listener_path: "/configs/listener".to_string(),
            groups: DataGroup::ALL.to_vec(),
        }
    }
}

impl ClientEndpointConfig {
    /// Create a config pointing at the given (comma-delimited) base URLs.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Base URLs in configured order, trimmed and without trailing slash.
    pub fn endpoints(&self) -> Vec<String> {
        self.url
            .split(',')
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.delay_time)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    pub fn listen_deadline(&self) -> Duration {
        Duration::from_secs(self.listen_timeout)
    }

    pub fn max_backoff_delay(&self) -> Duration {
        Duration::from_secs(self.max_backoff)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
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
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
