//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed fetch or listen:
//!     → retries.rs (pick the delay for this consecutive failure)
//!     → backoff.rs (exponential growth with jitter, when configured)
//!     → engine sleeps, interruptible by shutdown
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline (set on the HTTP client)
//! - A server-side long-poll timeout is not a failure and never waits
//! - Retry parameters come from configuration, not constants

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
