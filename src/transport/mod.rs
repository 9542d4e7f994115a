//! Transport to the config authority.
//!
//! # Data Flow
//! ```text
//! SyncEngine
//!     → SyncTransport::fetch(groups)      GET  {base}/configs/fetch
//!     → SyncTransport::listen(versions)   POST {base}/configs/listener
//!
//! http.rs:      reqwest implementation, one attempt per call
//! endpoints.rs: round-robin rotation across base URLs on transport error
//! wire.rs:      JSON envelope { code, message, data }
//! ```
//!
//! # Design Decisions
//! - The engine only sees the trait, so tests substitute an in-memory fake
//! - No retry inside a call; retry policy belongs to the engine
//! - A long-poll ending with nothing new is `ListenOutcome::Timeout`, not an error

pub mod endpoints;
pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{ConfigSnapshot, DataGroup, ListenOutcome, ListenRequest};

pub use endpoints::Endpoints;
pub use http::HttpTransport;

/// One-shot fetch and long-poll calls against the config authority.
#[async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    /// Fetch the full current payload of `groups`.
    ///
    /// Groups the server leaves out are absent from the returned snapshot.
    async fn fetch(&self, groups: &[DataGroup]) -> SyncResult<ConfigSnapshot>;

    /// Long-poll for changes relative to the versions in `request`.
    ///
    /// Returns once the server reports a change or its hold window elapses.
    async fn listen(&self, request: &ListenRequest) -> SyncResult<ListenOutcome>;
}
