//! A minimal in-memory `ItemStore`, enforcing the same etag/optimistic
//! concurrency contract a real backend would (§6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{IngestError, Result};
use crate::metadata::Metadata;
use crate::storage::{Etag, ExistingRecord, ItemStore};

struct Slot<Body> {
    meta: Metadata,
    body: Body,
    etag: Etag,
    deleted: bool,
}

/// Single-process, lock-backed `ItemStore`. One store instance holds one
/// item-kind's worth of records, same as a real capability set would.
/// Cheaply `Clone`: clones share the same backing state, so a test can
/// keep a handle for assertions after handing one to an engine.
pub struct InMemoryStore<Body> {
    records: Arc<RwLock<HashMap<String, Slot<Body>>>>,
    next_etag: Arc<AtomicU64>,
}

impl<Body> Clone for InMemoryStore<Body> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            next_etag: self.next_etag.clone(),
        }
    }
}

impl<Body> InMemoryStore<Body> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            next_etag: Arc::new(AtomicU64::new(1)),
        }
    }

    fn fresh_etag(&self) -> Etag {
        let n = self.next_etag.fetch_add(1, Ordering::Relaxed);
        Etag(format!("et{n}"))
    }
}

impl<Body> Default for InMemoryStore<Body> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<Body> ItemStore<Body> for InMemoryStore<Body>
where
    Body: Send + Sync + Clone + Default,
{
    async fn try_get_existing(&self, id: &str) -> Result<Option<ExistingRecord<Body>>> {
        let records = self.records.read();
        Ok(records.get(id).map(|slot| ExistingRecord {
            meta: slot.meta.clone(),
            body: slot.body.clone(),
            etag: slot.etag.clone(),
            deleted: slot.deleted,
        }))
    }

    async fn add_without_conflict(
        &self,
        id: &str,
        etag: Option<Etag>,
        meta: Metadata,
        body: Body,
    ) -> Result<Etag> {
        let mut records = self.records.write();
        if let Some(expected) = &etag {
            match records.get(id) {
                Some(slot) if slot.etag == *expected => {}
                other => {
                    return Err(IngestError::StorageConflict {
                        id: id.to_string(),
                        expected: other.map(|s| s.etag.0.clone()),
                    });
                }
            }
        }
        let new_etag = self.fresh_etag();
        records.insert(
            id.to_string(),
            Slot {
                meta,
                body,
                etag: new_etag.clone(),
                deleted: false,
            },
        );
        Ok(new_etag)
    }

    async fn delete_item(&self, id: &str, etag: Option<Etag>) -> Result<()> {
        let mut records = self.records.write();
        if let Some(expected) = &etag {
            match records.get(id) {
                Some(slot) if slot.etag == *expected => {}
                other => {
                    return Err(IngestError::StorageConflict {
                        id: id.to_string(),
                        expected: other.map(|s| s.etag.0.clone()),
                    });
                }
            }
        }
        records.remove(id);
        Ok(())
    }

    async fn mark_as_deleted(&self, id: &str, meta: Metadata) -> Result<Etag> {
        let mut records = self.records.write();
        let new_etag = self.fresh_etag();
        // A preceding `DeleteItem` may already have removed the record —
        // tombstones carry no meaningful body, so fall back to empty.
        let body = records.remove(id).map(|s| s.body).unwrap_or_default();
        records.insert(
            id.to_string(),
            Slot {
                meta,
                body,
                etag: new_etag.clone(),
                deleted: true,
            },
        );
        Ok(new_etag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_without_etag_always_succeeds_and_overwrites() {
        let store = InMemoryStore::<serde_json::Value>::new();
        store
            .add_without_conflict("a", None, Metadata::new(), json!({"n": 1}))
            .await
            .unwrap();
        store
            .add_without_conflict("a", None, Metadata::new(), json!({"n": 2}))
            .await
            .unwrap();
        let rec = store.try_get_existing("a").await.unwrap().unwrap();
        assert_eq!(rec.body, json!({"n": 2}));
    }

    #[tokio::test]
    async fn add_with_stale_etag_is_rejected() {
        let store = InMemoryStore::<serde_json::Value>::new();
        let etag = store
            .add_without_conflict("a", None, Metadata::new(), json!({"n": 1}))
            .await
            .unwrap();
        store
            .add_without_conflict("a", Some(etag.clone()), Metadata::new(), json!({"n": 2}))
            .await
            .unwrap();
        let err = store
            .add_without_conflict("a", Some(etag), Metadata::new(), json!({"n": 3}))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn mark_as_deleted_retains_body_and_sets_deleted_flag() {
        let store = InMemoryStore::<serde_json::Value>::new();
        store
            .add_without_conflict("a", None, Metadata::new(), json!({"n": 1}))
            .await
            .unwrap();
        store.mark_as_deleted("a", Metadata::new()).await.unwrap();
        let rec = store.try_get_existing("a").await.unwrap().unwrap();
        assert!(rec.deleted);
        assert_eq!(rec.body, json!({"n": 1}));
    }
}
