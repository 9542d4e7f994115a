//! JSON wire format of the config authority.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    ChangeNotification, ConfigSnapshot, DataGroup, GroupSnapshot, ListenOutcome, VersionToken,
};

/// Success code carried in the envelope.
pub const SUCCESS_CODE: i64 = 200;

/// Common response envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Reject any envelope whose `code` is not the success code.
    pub fn into_data(self) -> SyncResult<Option<T>> {
        if self.code != SUCCESS_CODE {
            return Err(SyncError::ServerCode {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self.data)
    }
}

/// One group's entry in a fetch response.
#[derive(Debug, Deserialize)]
pub struct WireGroup {
    #[serde(alias = "md5")]
    pub version: VersionToken,
    #[serde(default, alias = "data")]
    pub items: Vec<Value>,
}

/// Decode a fetch response body.
///
/// Unknown group names are skipped.
pub fn decode_fetch(body: &[u8]) -> SyncResult<ConfigSnapshot> {
    let envelope: Envelope<BTreeMap<String, WireGroup>> =
        serde_json::from_slice(body).map_err(|e| SyncError::Malformed(e.to_string()))?;

    let mut snapshot = ConfigSnapshot::new();
    for (name, group) in envelope.into_data()?.unwrap_or_default() {
        match name.parse::<DataGroup>() {
            Ok(data_group) => {
                snapshot.insert(data_group, GroupSnapshot::new(group.version, group.items))
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring group in fetch response"),
        }
    }
    Ok(snapshot)
}

/// Decode a long-poll response body.
///
/// An absent or empty `data` list means the server had nothing new.
pub fn decode_listen(body: &[u8]) -> SyncResult<ListenOutcome> {
    let envelope: Envelope<Vec<String>> =
        serde_json::from_slice(body).map_err(|e| SyncError::Malformed(e.to_string()))?;

    let groups: Vec<DataGroup> = envelope
        .into_data()?
        .unwrap_or_default()
        .iter()
        .filter_map(|name| match name.parse::<DataGroup>() {
            Ok(group) => Some(group),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring group in listener response");
                None
            }
        })
        .collect();

    if groups.is_empty() {
        Ok(ListenOutcome::Timeout)
    } else {
        Ok(ListenOutcome::Changed(ChangeNotification::new(groups)))
    }
}
