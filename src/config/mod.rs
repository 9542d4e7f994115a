//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SyncConfig (validated, immutable)
//!     → ClientEndpointConfig handed to the transport and the engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BackoffStrategy;
pub use schema::ClientEndpointConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::SyncConfig;
