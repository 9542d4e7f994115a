//! HTTP long-poll configuration synchronization for an API gateway.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod resilience;
pub mod sync;
pub mod transport;

pub use config::{ClientEndpointConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use model::{
    ChangeNotification, ConfigSnapshot, DataGroup, GroupSnapshot, ListenOutcome, ListenRequest,
    VersionToken,
};
pub use sync::{
    DataSubscriber, EngineHandle, EngineSettings, EngineState, SubscriberRegistry, SyncEngine,
};
pub use transport::{HttpTransport, SyncTransport};
