//! Readiness gate.
//!
//! # Responsibilities
//! - Report whether the initial full sync has completed
//! - Surface a fatal startup error to the bootstrap or health-check system
//!
//! # Design Decisions
//! - The gateway must not serve traffic before the first SYNCED transition
//! - A failed startup is terminal; readiness never flips back to pending

use tokio::sync::watch;

use crate::error::SyncError;

/// Readiness of the sync engine.
#[derive(Debug, Clone)]
pub enum ReadyState {
    /// Initial fetch still in progress.
    Pending,
    /// Every group was fetched and published once.
    Ready,
    /// Startup failed; the gateway must not become ready.
    Failed(SyncError),
}

/// Writer side, owned by the engine.
#[derive(Debug)]
pub struct Readiness {
    tx: watch::Sender<ReadyState>,
}

impl Readiness {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ReadyState::Pending);
        Self { tx }
    }

    pub fn mark_ready(&self) {
        self.tx.send_replace(ReadyState::Ready);
    }

    pub fn mark_failed(&self, error: SyncError) {
        self.tx.send_replace(ReadyState::Failed(error));
    }

    pub fn watcher(&self) -> ReadinessWatch {
        ReadinessWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side, handed to the bootstrap collaborator.
#[derive(Debug, Clone)]
pub struct ReadinessWatch {
    rx: watch::Receiver<ReadyState>,
}

impl ReadinessWatch {
    pub fn state(&self) -> ReadyState {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.rx.borrow(), ReadyState::Ready)
    }

    /// Wait until startup either completes or fails.
    pub async fn wait(&mut self) -> Result<(), SyncError> {
        let state = self
            .rx
            .wait_for(|s| !matches!(s, ReadyState::Pending))
            .await
            .map(|s| s.clone());

        match state {
            Ok(ReadyState::Ready) => Ok(()),
            Ok(ReadyState::Failed(e)) => Err(e),
            // The engine went away without deciding.
            Ok(ReadyState::Pending) | Err(_) => Err(SyncError::Stopped),
        }
    }
}
