//! Error taxonomy for fetch, listen and startup.
//!
//! Transport errors (connection refused, DNS, client timeout) and protocol
//! errors (non-2xx, malformed JSON, unexpected `code`) are recoverable and
//! retried by the engine. `StartupExhausted` is fatal and keeps the gateway
//! from becoming ready. A long-poll that ends with nothing new is not an
//! error at all, see `ListenOutcome::Timeout`.

use std::time::Duration;

use thiserror::Error;

use crate::model::DataGroup;

/// Broad class of a `SyncError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Fatal,
}

/// Errors that can occur while synchronizing with the config authority.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Connection refused, DNS failure or any other network error.
    #[error("transport error against {url}: {message}")]
    Transport { url: String, message: String },

    /// The client-side deadline elapsed before the server answered.
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// Non-2xx HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    /// Envelope `code` other than 200.
    #[error("server returned code={code}, message={message}")]
    ServerCode { code: i64, message: String },

    /// Body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A group that was asked for is absent from the fetch response.
    #[error("group {0} missing from fetch response")]
    MissingGroup(DataGroup),

    /// A configured base URL could not be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Startup fetch failed on every permitted attempt.
    #[error("startup sync exhausted after {attempts} attempts: {last}")]
    StartupExhausted { attempts: u32, last: Box<SyncError> },

    /// The engine was stopped before the operation completed.
    #[error("sync engine stopped")]
    Stopped,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transport { .. } | SyncError::Timeout { .. } => ErrorKind::Transport,
            SyncError::Status { .. }
            | SyncError::ServerCode { .. }
            | SyncError::Malformed(_)
            | SyncError::MissingGroup(_) => ErrorKind::Protocol,
            SyncError::InvalidEndpoint(_)
            | SyncError::StartupExhausted { .. }
            | SyncError::Stopped => ErrorKind::Fatal,
        }
    }

    /// Whether the failure is attributable to the connection rather than
    /// the server's answer, which makes rotating to another base URL useful.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Short label used as a metrics dimension.
    pub fn label(&self) -> &'static str {
        match self {
            SyncError::Transport { .. } => "transport",
            SyncError::Timeout { .. } => "timeout",
            SyncError::Status { .. } => "status",
            SyncError::ServerCode { .. } => "server_code",
            SyncError::Malformed(_) => "malformed",
            SyncError::MissingGroup(_) => "missing_group",
            SyncError::InvalidEndpoint(_) => "invalid_endpoint",
            SyncError::StartupExhausted { .. } => "startup_exhausted",
            SyncError::Stopped => "stopped",
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
