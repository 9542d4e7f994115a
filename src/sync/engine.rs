//! Sync engine: the fetch and long-poll control loop.
//!
//! # States
//! ```text
//! INITIALIZING ──(full fetch ok)──▶ SYNCED ──▶ LISTENING ◀──┐
//!      │                                          │         │
//!      └─(attempts exhausted)─▶ STOPPED           ▼         │
//!                                             FETCHING ─────┘
//! any state ──(stop)──▶ STOPPED
//! ```
//!
//! # Design Decisions
//! - One task runs the whole protocol: listen, then fetch, then listen again.
//!   At most one long-poll is ever in flight, and the version table is owned
//!   by that task alone.
//! - A server-side long-poll timeout loops immediately; errors wait per the
//!   retry policy and retry forever.
//! - A group whose fetch fails keeps its old version, so the next long-poll
//!   reports it again.
//! - A notified group that does not advance (stale or unchanged fetch, or a
//!   group this engine does not sync) waits out the retry delay like a
//!   failure; the server will keep reporting it.
//! - Nothing is applied or published once shutdown has been requested.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ClientEndpointConfig;
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::{ReadinessWatch, Readiness, Shutdown, ShutdownSignal};
use crate::model::{ChangeNotification, DataGroup, GroupSnapshot, ListenOutcome};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::sync::registry::SubscriberRegistry;
use crate::sync::versions::{Advance, VersionTable};
use crate::transport::{HttpTransport, SyncTransport};

/// Observable state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Synced,
    Listening,
    Fetching,
    Stopped,
}

impl EngineState {
    /// Numeric code exported as a gauge.
    pub fn code(&self) -> u8 {
        match self {
            EngineState::Initializing => 0,
            EngineState::Synced => 1,
            EngineState::Listening => 2,
            EngineState::Fetching => 3,
            EngineState::Stopped => 4,
        }
    }
}

/// Tunables of the control loop.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Groups fetched at startup and listened on afterwards.
    pub groups: Vec<DataGroup>,
    /// Attempts of the startup fetch before `StartupExhausted`.
    pub startup_max_attempts: u32,
    /// Fixed delay between startup attempts.
    pub startup_delay: std::time::Duration,
    /// Delay schedule after steady-state failures.
    pub retry: RetryPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &ClientEndpointConfig) -> Self {
        Self {
            groups: config.groups.clone(),
            startup_max_attempts: config.startup_max_attempts.max(1),
            startup_delay: config.retry_delay(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Result of one FETCHING pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RefreshReport {
    published: usize,
    failed: usize,
    /// Notified groups that fetched fine but did not advance.
    unsettled: usize,
    interrupted: bool,
}

impl RefreshReport {
    fn needs_pause(&self) -> bool {
        self.failed > 0 || self.unsettled > 0
    }
}

/// The synchronization engine, before it is started.
pub struct SyncEngine<T: SyncTransport> {
    transport: Arc<T>,
    registry: Arc<SubscriberRegistry>,
    settings: EngineSettings,
    versions: VersionTable,
    state_tx: watch::Sender<EngineState>,
    readiness: Readiness,
}

impl SyncEngine<HttpTransport> {
    /// Engine talking HTTP to the endpoints of `config`.
    pub fn new(
        config: &ClientEndpointConfig,
        registry: Arc<SubscriberRegistry>,
    ) -> SyncResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            registry,
            EngineSettings::from_config(config),
        ))
    }
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Engine over an arbitrary transport.
    pub fn with_transport(
        transport: Arc<T>,
        registry: Arc<SubscriberRegistry>,
        settings: EngineSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(EngineState::Initializing);
        Self {
            transport,
            registry,
            settings,
            versions: VersionTable::new(),
            state_tx,
            readiness: Readiness::new(),
        }
    }

    /// Spawn the control loop on the current Tokio runtime.
    pub fn start(self) -> EngineHandle {
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let state = self.state_tx.subscribe();
        let readiness = self.readiness.watcher();

        let task = tokio::spawn(self.run(signal));

        EngineHandle {
            shutdown,
            state,
            readiness,
            task,
        }
    }

    async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(groups = ?self.settings.groups, "Sync engine starting");
        self.set_state(EngineState::Initializing);

        match self.initialize(&mut shutdown).await {
            Ok(()) => {
                self.set_state(EngineState::Synced);
                self.readiness.mark_ready();
                tracing::info!("Initial configuration synced");
                self.listen_loop(&mut shutdown).await;
            }
            Err(e) => {
                if matches!(e, SyncError::Stopped) {
                    tracing::info!("Sync engine stopped during startup");
                } else {
                    tracing::error!(error = %e, "Initial configuration sync failed");
                }
                self.readiness.mark_failed(e);
            }
        }

        self.set_state(EngineState::Stopped);
        tracing::info!("Sync engine stopped");
    }

    /// INITIALIZING: full fetch with bounded, fixed-delay retries.
    async fn initialize(&mut self, shutdown: &mut ShutdownSignal) -> SyncResult<()> {
        let groups = self.settings.groups.clone();
        let max_attempts = self.settings.startup_max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => return Err(SyncError::Stopped),
                result = self.transport.fetch(&groups) => result,
            };

            match result {
                Ok(snapshot) => {
                    if shutdown.is_triggered() {
                        return Err(SyncError::Stopped);
                    }
                    for group in &groups {
                        if snapshot.get(*group).is_none() {
                            tracing::warn!(group = %group, "Group missing from startup fetch");
                        }
                    }
                    for (group, group_snapshot) in snapshot {
                        if groups.contains(&group) {
                            metrics::record_fetch(group.as_str(), "ok");
                            self.apply(group, group_snapshot);
                        }
                    }
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_fetch("all", e.label());
                    if attempt >= max_attempts {
                        return Err(SyncError::StartupExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    let delay = self.settings.startup_delay;
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        error = %e,
                        "Startup fetch failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => return Err(SyncError::Stopped),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// LISTENING ⇄ FETCHING until shutdown.
    async fn listen_loop(&mut self, shutdown: &mut ShutdownSignal) {
        let mut failures: u32 = 0;

        loop {
            if shutdown.is_triggered() {
                return;
            }
            self.set_state(EngineState::Listening);
            let request = self.versions.listen_request(&self.settings.groups);

            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => return,
                result = self.transport.listen(&request) => result,
            };

            match result {
                Ok(ListenOutcome::Timeout) => {
                    metrics::record_listen("timeout");
                    tracing::trace!("Long-poll returned without changes");
                    failures = 0;
                }
                Ok(ListenOutcome::Changed(notification)) => {
                    metrics::record_listen("changed");
                    tracing::info!(
                        groups = ?notification.groups(),
                        "Configuration change detected"
                    );
                    failures = 0;

                    self.set_state(EngineState::Fetching);
                    let report = self.refresh(&notification, shutdown).await;
                    if report.interrupted {
                        return;
                    }
                    if report.needs_pause() {
                        failures = failures.saturating_add(1);
                        if !self.pause(failures, shutdown).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    metrics::record_listen(e.label());
                    failures = failures.saturating_add(1);
                    tracing::warn!(error = %e, consecutive_failures = failures, "Long-poll failed");
                    if !self.pause(failures, shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    /// FETCHING: fetch each changed group on its own.
    async fn refresh(
        &mut self,
        notification: &ChangeNotification,
        shutdown: &mut ShutdownSignal,
    ) -> RefreshReport {
        let mut report = RefreshReport::default();

        for &group in notification.groups() {
            if !self.settings.groups.contains(&group) {
                tracing::debug!(group = %group, "Ignoring change for unsynchronized group");
                report.unsettled += 1;
                continue;
            }

            let requested = [group];
            let result = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    report.interrupted = true;
                    return report;
                }
                result = self.transport.fetch(&requested) => result,
            };

            let outcome = result.and_then(|mut snapshot| {
                snapshot.take(group).ok_or(SyncError::MissingGroup(group))
            });

            match outcome {
                Ok(group_snapshot) => {
                    if shutdown.is_triggered() {
                        report.interrupted = true;
                        return report;
                    }
                    metrics::record_fetch(group.as_str(), "ok");
                    match self.apply(group, group_snapshot) {
                        Advance::Advanced => report.published += 1,
                        Advance::Unchanged | Advance::Stale => report.unsettled += 1,
                    }
                }
                Err(e) => {
                    metrics::record_fetch(group.as_str(), e.label());
                    report.failed += 1;
                    tracing::warn!(
                        group = %group,
                        held_version = ?self.versions.get(group).map(|v| v.to_string()),
                        error = %e,
                        "Fetch failed, keeping last good snapshot"
                    );
                }
            }
        }

        report
    }

    /// Advance the version of `group` and publish, or drop a stale snapshot.
    fn apply(&mut self, group: DataGroup, snapshot: GroupSnapshot) -> Advance {
        let outcome = self.versions.advance(group, &snapshot.version);
        match outcome {
            Advance::Advanced => {
                tracing::info!(
                    group = %group,
                    version = %snapshot.version,
                    items = snapshot.items.len(),
                    "Applying snapshot"
                );
                self.registry.publish(group, Arc::new(snapshot));
            }
            Advance::Unchanged => {
                tracing::debug!(
                    group = %group,
                    version = %snapshot.version,
                    "Snapshot already applied"
                );
            }
            Advance::Stale => {
                tracing::warn!(
                    group = %group,
                    version = %snapshot.version,
                    held_version = ?self.versions.get(group).map(|v| v.to_string()),
                    "Discarding stale snapshot"
                );
            }
        }
        outcome
    }

    /// Wait out the retry delay; `false` if shutdown came first.
    async fn pause(&self, failures: u32, shutdown: &mut ShutdownSignal) -> bool {
        let delay = self.settings.retry.delay_for(failures);
        tracing::debug!(delay = ?delay, consecutive_failures = failures, "Backing off");
        tokio::select! {
            biased;
            _ = shutdown.recv() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn set_state(&self, state: EngineState) {
        metrics::record_engine_state(state.code());
        self.state_tx.send_replace(state);
    }
}

/// Controllable handle of a started engine.
///
/// The handle owns the shutdown coordinator: dropping it without calling
/// [`EngineHandle::stop`] also ends synchronization, at the next await point
/// of the loop. Keep the handle alive for as long as configuration should
/// follow the authority.
#[derive(Debug)]
pub struct EngineHandle {
    shutdown: Shutdown,
    state: watch::Receiver<EngineState>,
    readiness: ReadinessWatch,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Readiness gate for the bootstrap or health-check system.
    pub fn readiness(&self) -> ReadinessWatch {
        self.readiness.clone()
    }

    /// Wait until the initial sync either completes or fails.
    pub async fn wait_ready(&self) -> SyncResult<()> {
        self.readiness.clone().wait().await
    }

    /// Wait until the engine reaches `state`.
    pub async fn wait_for_state(&self, state: EngineState) -> SyncResult<()> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == state)
            .await
            .map(|_| ())
            .map_err(|_| SyncError::Stopped)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Sync engine task failed");
        }
    }
}
