//! Reserved metadata keys and the typed `VersionMeta` projection.
//!
//! Metadata crossing the engine boundary is an open string-keyed JSON map
//! (`Metadata`). Internally, each `replicate` call parses it once into
//! `VersionMeta` and writes any changed flags back explicitly before the
//! item is handed to storage — this keeps schema assumptions out of the
//! decision logic in `behavior.rs` and out of `historian.rs`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{IngestError, Result};

/// Open key/value metadata as it crosses the storage boundary.
pub type Metadata = BTreeMap<String, Value>;

/// The reserved metadata keys the engine reads or writes. No other keys
/// are interpreted — everything else passes through untouched.
pub mod keys {
    pub const DELETE_MARKER: &str = "@delete-marker";
    pub const SOURCE: &str = "@replication-source";
    pub const VERSION: &str = "@replication-version";
    pub const HISTORY: &str = "@replication-history";
    pub const CONFLICT: &str = "@replication-conflict";
    pub const CONFLICT_DOC: &str = "@replication-conflict-doc";
    pub const RESOLVER_DELETE_MARKER: &str = "@resolver-delete-marker";
}

/// Suggested bound on `@replication-history` length (invariant 3).
pub const HISTORY_MAX_DEFAULT: usize = 50;

/// A single (source, version) pair — the unit a causal history is made of.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionStamp {
    pub source: String,
    pub version: u64,
}

impl VersionStamp {
    pub fn new(source: impl Into<String>, version: u64) -> Self {
        Self {
            source: source.into(),
            version,
        }
    }

    fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.source.clone()),
            Value::Number(self.version.into()),
        ])
    }

    fn from_json(v: &Value) -> Option<Self> {
        let arr = v.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        let source = arr[0].as_str()?.to_string();
        let version = arr[1].as_u64()?;
        Some(Self { source, version })
    }
}

/// The typed projection of an item's reserved metadata keys.
///
/// `source`/`version` are `None` when absent from the incoming metadata —
/// callers must not assume a default of `(String::new(), 0)`, since a
/// missing version disqualifies a descendance claim (§4.1 tie-breaks).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMeta {
    pub source: Option<String>,
    pub version: Option<u64>,
    pub history: Vec<VersionStamp>,
    pub delete_marker: bool,
    pub conflict: bool,
    pub conflict_doc: bool,
    pub resolver_delete_marker: bool,
}

impl VersionMeta {
    /// Parses the reserved keys out of an open metadata map. Never fails —
    /// malformed individual fields are treated as absent; callers that need
    /// to reject malformed input call `require_stamp` afterward.
    pub fn parse(meta: &Metadata) -> Self {
        let source = meta
            .get(keys::SOURCE)
            .and_then(Value::as_str)
            .map(str::to_string);
        let version = meta.get(keys::VERSION).and_then(Value::as_u64);
        let history = meta
            .get(keys::HISTORY)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(VersionStamp::from_json).collect())
            .unwrap_or_default();
        let delete_marker = meta
            .get(keys::DELETE_MARKER)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let conflict = meta
            .get(keys::CONFLICT)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let conflict_doc = meta
            .get(keys::CONFLICT_DOC)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let resolver_delete_marker = meta
            .get(keys::RESOLVER_DELETE_MARKER)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Self {
            source,
            version,
            history,
            delete_marker,
            conflict,
            conflict_doc,
            resolver_delete_marker,
        }
    }

    /// This version's own (source, version) stamp, if both fields are present.
    pub fn stamp(&self) -> Option<VersionStamp> {
        Some(VersionStamp::new(self.source.clone()?, self.version?))
    }

    /// `stamp()`, but rejects metadata missing source/version — the
    /// `MalformedMetadata` case from the error handling table, for items
    /// that are not brand new (a first-ever put with no local record is
    /// allowed to carry no identity for the purposes of this check only
    /// at the call sites that need it; `replicate` does not call this for
    /// the add-to-empty branch).
    pub fn require_stamp(&self, id: &str) -> Result<VersionStamp> {
        self.stamp().ok_or_else(|| IngestError::MalformedMetadata {
            id: id.to_string(),
            reason: "missing @replication-source or @replication-version".to_string(),
        })
    }

    /// The causal closure of this version: its own stamp plus every entry
    /// in its history. Used by `historian::relation`.
    pub fn closure(&self) -> Vec<VersionStamp> {
        let mut set = self.history.clone();
        if let Some(stamp) = self.stamp() {
            set.push(stamp);
        }
        set
    }

    /// Appends `new_entries` to `history` (skipping exact duplicates),
    /// preserving order, then evicts the oldest entries until the bound
    /// is satisfied (invariant 3).
    pub fn merge_history(&mut self, new_entries: &[VersionStamp], max: usize) {
        for entry in new_entries {
            if !self.history.contains(entry) {
                self.history.push(entry.clone());
            }
        }
        while self.history.len() > max {
            self.history.remove(0);
        }
    }

    /// Pushes `stamp` onto the end of history (used when fast-forwarding:
    /// the outgoing record's own prior stamp becomes a history entry of
    /// the new one), capped at `max`.
    pub fn push_history(&mut self, stamp: VersionStamp, max: usize) {
        if !self.history.contains(&stamp) {
            self.history.push(stamp);
        }
        while self.history.len() > max {
            self.history.remove(0);
        }
    }

    /// Writes every reserved flag/field back into an open metadata map,
    /// overwriting whatever was there. Non-reserved keys are left alone.
    pub fn write_back(&self, meta: &mut Metadata) {
        match &self.source {
            Some(s) => {
                meta.insert(keys::SOURCE.to_string(), Value::String(s.clone()));
            }
            None => {
                meta.remove(keys::SOURCE);
            }
        }
        match self.version {
            Some(v) => {
                meta.insert(keys::VERSION.to_string(), Value::Number(v.into()));
            }
            None => {
                meta.remove(keys::VERSION);
            }
        }
        meta.insert(
            keys::HISTORY.to_string(),
            Value::Array(self.history.iter().map(VersionStamp::to_json).collect()),
        );
        set_flag(meta, keys::DELETE_MARKER, self.delete_marker);
        set_flag(meta, keys::CONFLICT, self.conflict);
        set_flag(meta, keys::CONFLICT_DOC, self.conflict_doc);
        set_flag(meta, keys::RESOLVER_DELETE_MARKER, self.resolver_delete_marker);
    }
}

fn set_flag(meta: &mut Metadata, key: &str, value: bool) {
    if value {
        meta.insert(key.to_string(), Value::Bool(true));
    } else {
        meta.remove(key);
    }
}

/// Builds an artifact id of the form `<parentId>/conflicts/<replicaTag>`.
pub fn artifact_id(parent_id: &str, replica_tag: &str) -> String {
    format!("{parent_id}/conflicts/{replica_tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(pairs: &[(&str, Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn parse_defaults_missing_history_to_empty() {
        let meta = meta_with(&[
            (keys::SOURCE, Value::String("X".into())),
            (keys::VERSION, Value::Number(1.into())),
        ]);
        let vm = VersionMeta::parse(&meta);
        assert!(vm.history.is_empty());
        assert_eq!(vm.stamp(), Some(VersionStamp::new("X", 1)));
    }

    #[test]
    fn parse_missing_version_disqualifies_stamp() {
        let meta = meta_with(&[(keys::SOURCE, Value::String("X".into()))]);
        let vm = VersionMeta::parse(&meta);
        assert_eq!(vm.stamp(), None);
    }

    #[test]
    fn merge_history_dedupes_and_caps() {
        let mut vm = VersionMeta::default();
        vm.merge_history(&[VersionStamp::new("X", 1), VersionStamp::new("X", 2)], 10);
        vm.merge_history(&[VersionStamp::new("X", 1), VersionStamp::new("Y", 1)], 10);
        assert_eq!(vm.history.len(), 3);

        let mut bounded = VersionMeta::default();
        for i in 0..5u64 {
            bounded.push_history(VersionStamp::new("X", i), 3);
        }
        assert_eq!(bounded.history.len(), 3);
        assert_eq!(bounded.history[0], VersionStamp::new("X", 2));
        assert_eq!(bounded.history[2], VersionStamp::new("X", 4));
    }

    #[test]
    fn write_back_round_trips_through_parse() {
        let mut vm = VersionMeta {
            source: Some("X".to_string()),
            version: Some(3),
            history: vec![VersionStamp::new("X", 1), VersionStamp::new("X", 2)],
            delete_marker: false,
            conflict: true,
            conflict_doc: false,
            resolver_delete_marker: false,
        };
        let mut meta = Metadata::new();
        vm.write_back(&mut meta);
        let parsed = VersionMeta::parse(&meta);
        assert_eq!(parsed, vm);

        vm.conflict = false;
        vm.write_back(&mut meta);
        assert!(!meta.contains_key(keys::CONFLICT));
    }

    #[test]
    fn artifact_id_format() {
        assert_eq!(artifact_id("a", "X"), "a/conflicts/X");
    }
}
