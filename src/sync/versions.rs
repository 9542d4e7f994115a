//! Per-group version tracking.
//!
//! Owned exclusively by the engine loop, so it needs no locking.

use std::collections::HashMap;

use crate::model::{DataGroup, ListenRequest, VersionToken};

/// Result of offering a fetched version to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Different from the held version and not older (or the first one); now held.
    Advanced,
    /// Same as the held version; nothing to publish.
    Unchanged,
    /// An older revision than the held one; discarded.
    Stale,
}

/// Last successfully applied version of each group.
#[derive(Debug, Default)]
pub struct VersionTable {
    versions: HashMap<DataGroup, VersionToken>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group: DataGroup) -> Option<&VersionToken> {
        self.versions.get(&group)
    }

    /// Whether `candidate` would advance `group`, without changing anything.
    pub fn check(&self, group: DataGroup, candidate: &VersionToken) -> Advance {
        match self.versions.get(&group) {
            None => Advance::Advanced,
            Some(held) if candidate == held => Advance::Unchanged,
            Some(held) if candidate.is_older_than(held) => Advance::Stale,
            Some(_) => Advance::Advanced,
        }
    }

    /// Record `candidate` for `group` if it advances the held version.
    pub fn advance(&mut self, group: DataGroup, candidate: &VersionToken) -> Advance {
        let outcome = self.check(group, candidate);
        if outcome == Advance::Advanced {
            self.versions.insert(group, candidate.clone());
        }
        outcome
    }

    /// Long-poll body covering `groups`.
    pub fn listen_request(&self, groups: &[DataGroup]) -> ListenRequest {
        let mut request = ListenRequest::new();
        for &group in groups {
            request.insert(group, self.versions.get(&group).cloned());
        }
        request
    }
}
