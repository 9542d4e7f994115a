//! Synchronization core.
//!
//! # Data Flow
//! ```text
//! engine.rs ──listen──▶ transport ──[changed groups]──▶ engine.rs
//!     ──fetch(group)──▶ transport ──GroupSnapshot──▶ versions.rs (advance?)
//!     ──▶ registry.rs (publish) ──▶ gateway runtime
//! ```

pub mod engine;
pub mod registry;
pub mod versions;

pub use engine::{EngineHandle, EngineSettings, EngineState, SyncEngine};
pub use registry::{DataSubscriber, FnSubscriber, SubscriberRegistry};
pub use versions::{Advance, VersionTable};
