//! Subscriber registry.
//!
//! # Responsibilities
//! - Hold one subscriber per data group (last registration wins)
//! - Deliver published snapshots synchronously to that subscriber
//! - Keep the last published snapshot of every group for lock-free reads
//!
//! # Design Decisions
//! - Publishes for the same group are serialized by a per-group lock
//! - A blocking subscriber stalls the caller (the sync loop); this is the
//!   backpressure path, a slow subscriber delays sync instead of corrupting it
//! - A panicking subscriber is logged and does not take the loop down

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;

use crate::model::{DataGroup, GroupSnapshot};
use crate::observability::metrics;

/// Receives configuration for one data group.
pub trait DataSubscriber: Send + Sync + 'static {
    /// Called with every new snapshot of `group`, in version order.
    fn on_snapshot(&self, group: DataGroup, snapshot: Arc<GroupSnapshot>);
}

/// A subscriber that invokes a closure.
pub struct FnSubscriber<F>
where
    F: Fn(DataGroup, Arc<GroupSnapshot>) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(DataGroup, Arc<GroupSnapshot>) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> DataSubscriber for FnSubscriber<F>
where
    F: Fn(DataGroup, Arc<GroupSnapshot>) + Send + Sync + 'static,
{
    fn on_snapshot(&self, group: DataGroup, snapshot: Arc<GroupSnapshot>) {
        (self.f)(group, snapshot);
    }
}

#[derive(Default)]
struct Slot {
    publish_lock: Mutex<()>,
    current: ArcSwapOption<GroupSnapshot>,
}

/// The set of local consumers of synchronized configuration.
pub struct SubscriberRegistry {
    subscribers: DashMap<DataGroup, Arc<dyn DataSubscriber>>,
    slots: BTreeMap<DataGroup, Slot>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            slots: DataGroup::ALL.iter().map(|&g| (g, Slot::default())).collect(),
        }
    }

    /// Register the subscriber of `group`, replacing any previous one.
    ///
    /// Returns the replaced subscriber.
    pub fn register(
        &self,
        group: DataGroup,
        subscriber: Arc<dyn DataSubscriber>,
    ) -> Option<Arc<dyn DataSubscriber>> {
        let previous = self.subscribers.insert(group, subscriber);
        if previous.is_some() {
            tracing::warn!(group = %group, "Replacing existing subscriber");
        } else {
            tracing::debug!(group = %group, "Subscriber registered");
        }
        previous
    }

    /// Register a closure as the subscriber of `group`.
    pub fn register_fn<F>(&self, group: DataGroup, f: F) -> Option<Arc<dyn DataSubscriber>>
    where
        F: Fn(DataGroup, Arc<GroupSnapshot>) + Send + Sync + 'static,
    {
        self.register(group, Arc::new(FnSubscriber::new(f)))
    }

    pub fn is_registered(&self, group: DataGroup) -> bool {
        self.subscribers.contains_key(&group)
    }

    /// Last snapshot published for `group`.
    pub fn current(&self, group: DataGroup) -> Option<Arc<GroupSnapshot>> {
        self.slots.get(&group).and_then(|slot| slot.current.load_full())
    }

    /// Make `snapshot` the current one for `group` and hand it to the subscriber.
    ///
    /// Returns `true` when a subscriber received it without panicking.
    pub fn publish(&self, group: DataGroup, snapshot: Arc<GroupSnapshot>) -> bool {
        let Some(slot) = self.slots.get(&group) else {
            return false;
        };
        let _guard = slot
            .publish_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        slot.current.store(Some(snapshot.clone()));
        metrics::record_publish(group);

        // Clone out so the map shard is not held while the subscriber runs.
        let subscriber = self.subscribers.get(&group).map(|s| s.value().clone());
        let Some(subscriber) = subscriber else {
            tracing::debug!(group = %group, version = %snapshot.version, "No subscriber for group");
            return false;
        };

        let version = snapshot.version.clone();
        match catch_unwind(AssertUnwindSafe(|| subscriber.on_snapshot(group, snapshot))) {
            Ok(()) => {
                tracing::debug!(group = %group, version = %version, "Snapshot published");
                true
            }
            Err(_) => {
                tracing::error!(group = %group, version = %version, "Subscriber panicked");
                false
            }
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<DataGroup> = self.subscribers.iter().map(|e| *e.key()).collect();
        f.debug_struct("SubscriberRegistry")
            .field("registered", &registered)
            .finish()
    }
}
