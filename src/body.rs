//! Body-shape bounds the engine needs, kept out of the decision logic.
//!
//! The engine is generic over `Body` (§9: "two concrete capability sets —
//! documents / attachments — are injected"). Two things about a body still
//! need to be knowable generically:
//!
//! - whether it is JSON-shaped, so `TriggerBridge::on_resolved_put` can
//!   skip opaque byte blobs (§4.4);
//! - how to materialize/read the conflict-placeholder body that enumerates
//!   contending artifact ids (§3 invariant 2) — a plain `Vec<u8>`
//!   attachment body has no native notion of "a list of ids", so it needs
//!   a JSON-encoded representation same as a document would use natively.

use serde_json::{json, Value};

/// Bodies that can report whether they are structured JSON.
pub trait AsJson {
    fn as_json(&self) -> Option<&Value>;
}

/// Bodies that can represent the conflict-placeholder shape: an ordered
/// list of artifact ids.
pub trait ConflictPlaceholder: Sized {
    fn placeholder(artifact_ids: &[String]) -> Self;
    fn artifact_ids(&self) -> Option<Vec<String>>;
}

const PLACEHOLDER_KEY: &str = "_conflicts";

impl AsJson for Value {
    fn as_json(&self) -> Option<&Value> {
        Some(self)
    }
}

impl ConflictPlaceholder for Value {
    fn placeholder(artifact_ids: &[String]) -> Self {
        json!({ (PLACEHOLDER_KEY): artifact_ids })
    }

    fn artifact_ids(&self) -> Option<Vec<String>> {
        self.get(PLACEHOLDER_KEY)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

impl AsJson for Vec<u8> {
    fn as_json(&self) -> Option<&Value> {
        None
    }
}

impl ConflictPlaceholder for Vec<u8> {
    fn placeholder(artifact_ids: &[String]) -> Self {
        serde_json::to_vec(&json!({ PLACEHOLDER_KEY: artifact_ids })).unwrap_or_default()
    }

    fn artifact_ids(&self) -> Option<Vec<String>> {
        let value: Value = serde_json::from_slice(self).ok()?;
        value.artifact_ids()
    }
}
