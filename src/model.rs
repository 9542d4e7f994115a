//! Configuration data model shared by the transport and the sync engine.
//!
//! # Types
//! - `DataGroup`: the fixed set of independently synchronized categories
//! - `VersionToken`: opaque, ordered freshness marker for one group
//! - `GroupSnapshot`: full payload of one group at one version
//! - `ConfigSnapshot`: a fetch result, possibly covering only some groups
//! - `ChangeNotification`: groups reported as changed by one long-poll
//! - `ListenRequest`: the caller's last-known versions sent with a long-poll

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// A named category of gateway configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataGroup {
    Plugin,
    Selector,
    Rule,
    AppAuth,
    MetaData,
}

impl DataGroup {
    /// Every group, in the order they are fetched at startup.
    pub const ALL: [DataGroup; 5] = [
        DataGroup::Plugin,
        DataGroup::Selector,
        DataGroup::Rule,
        DataGroup::AppAuth,
        DataGroup::MetaData,
    ];

    /// Wire name of the group.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataGroup::Plugin => "PLUGIN",
            DataGroup::Selector => "SELECTOR",
            DataGroup::Rule => "RULE",
            DataGroup::AppAuth => "APP_AUTH",
            DataGroup::MetaData => "META_DATA",
        }
    }
}

impl fmt::Display for DataGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire name does not denote a known group.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data group: {0}")]
pub struct UnknownGroup(pub String);

impl FromStr for DataGroup {
    type Err = UnknownGroup;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataGroup::ALL
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownGroup(s.to_string()))
    }
}

/// Freshness marker for a group snapshot.
///
/// Tokens made only of decimal digits are revision counters and are ordered
/// numerically. Anything else (an md5 digest, say) only tells equal from
/// different. The server may send either a JSON string or a JSON number.
#[derive(Debug, Clone)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<&str> {
        if !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit()) {
            Some(self.0.trim_start_matches('0'))
        } else {
            None
        }
    }

    /// Order against `other`, when both tokens are revision counters.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let (a, b) = (self.numeric()?, other.numeric()?);
        // Leading zeros stripped, so a longer digit string is a larger number.
        Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
    }

    /// Whether this token is a strictly older revision than `held`.
    ///
    /// Always `false` for unordered tokens.
    pub fn is_older_than(&self, held: &Self) -> bool {
        self.compare(held) == Some(Ordering::Less)
    }
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        match self.compare(other) {
            Some(order) => order == Ordering::Equal,
            None => self.0 == other.0,
        }
    }
}

impl Eq for VersionToken {}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for VersionToken {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for VersionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VersionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenVisitor;

        impl Visitor<'_> for TokenVisitor {
            type Value = VersionToken;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a version string or unsigned integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(VersionToken::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(VersionToken::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(VersionToken::from)
                    .map_err(|_| E::custom("version must not be negative"))
            }
        }

        deserializer.deserialize_any(TokenVisitor)
    }
}

/// Full payload of one data group at a given version.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GroupSnapshot {
    pub version: VersionToken,
    pub items: Vec<Value>,
}

impl GroupSnapshot {
    pub fn new(version: impl Into<VersionToken>, items: Vec<Value>) -> Self {
        Self {
            version: version.into(),
            items,
        }
    }

    /// Decode the opaque records into a subscriber's own record type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.items
            .iter()
            .cloned()
            .map(serde_json::from_value)
            .collect()
    }
}

/// Result of one fetch: the groups the server returned, each at its version.
///
/// Groups missing from the map were not part of the response and must be
/// left untouched by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    groups: BTreeMap<DataGroup, GroupSnapshot>,
}

impl ConfigSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: DataGroup, snapshot: GroupSnapshot) {
        self.groups.insert(group, snapshot);
    }

    pub fn get(&self, group: DataGroup) -> Option<&GroupSnapshot> {
        self.groups.get(&group)
    }

    pub fn take(&mut self, group: DataGroup) -> Option<GroupSnapshot> {
        self.groups.remove(&group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl IntoIterator for ConfigSnapshot {
    type Item = (DataGroup, GroupSnapshot);
    type IntoIter = std::collections::btree_map::IntoIter<DataGroup, GroupSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// Groups whose version advanced on the server, in the order reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeNotification {
    groups: Vec<DataGroup>,
}

impl ChangeNotification {
    /// Build a notification, dropping repeated groups.
    pub fn new(groups: impl IntoIterator<Item = DataGroup>) -> Self {
        let mut unique = Vec::new();
        for group in groups {
            if !unique.contains(&group) {
                unique.push(group);
            }
        }
        Self { groups: unique }
    }

    pub fn groups(&self) -> &[DataGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Outcome of a long-poll that completed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    /// At least one group changed.
    Changed(ChangeNotification),
    /// The server held the request and had nothing new.
    Timeout,
}

/// Last-known version of every listened group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenRequest {
    entries: BTreeMap<DataGroup, Option<VersionToken>>,
}

impl ListenRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: DataGroup, version: Option<VersionToken>) {
        self.entries.insert(group, version);
    }

    /// Version sent for `group`; `None` when the group is not listened or has
    /// never been fetched.
    pub fn version(&self, group: DataGroup) -> Option<&VersionToken> {
        self.entries.get(&group).and_then(Option::as_ref)
    }

    pub fn groups(&self) -> impl Iterator<Item = DataGroup> + '_ {
        self.entries.keys().copied()
    }

    /// JSON body form: group name to version, empty string when none is held.
    pub fn to_wire(&self) -> BTreeMap<&'static str, String> {
        self.entries
            .iter()
            .map(|(group, version)| {
                let token = version.as_ref().map(|v| v.to_string()).unwrap_or_default();
                (group.as_str(), token)
            })
            .collect()
    }
}
