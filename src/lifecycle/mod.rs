//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Engine start → initial full fetch → Readiness::mark_ready
//!                                      → or mark_failed (StartupExhausted)
//!
//! Shutdown (shutdown.rs):
//!     EngineHandle::stop → Shutdown::trigger
//!     → in-flight long-poll, fetch or retry sleep is abandoned
//!     → loop exits, no further publish
//! ```
//!
//! # Design Decisions
//! - Readiness gates the gateway: no traffic before the first full sync
//! - Shutdown is cooperative but prompt: every await in the loop races it

pub mod shutdown;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{ReadinessWatch, Readiness, ReadyState};
