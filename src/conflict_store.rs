//! C2 — ConflictStore: persists losing and contending versions under
//! synthetic ids, and appends to the artifact list on already-conflicted
//! parents (§4.2).

use crate::body::ConflictPlaceholder;
use crate::error::{IngestError, Result};
use crate::metadata::{artifact_id, Metadata, VersionMeta};
use crate::storage::{Etag, ItemStore};

/// Result of materializing or extending a conflict. `etag` is the
/// post-write version token of the parent record, used in notifications.
#[derive(Debug, Clone)]
pub struct CreatedConflict {
    pub etag: Etag,
    pub artifact_ids: Vec<String>,
}

pub struct ConflictStore<'s, S> {
    store: &'s S,
}

impl<'s, S> ConflictStore<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }
}

impl<'s, S> ConflictStore<'s, S> {
    /// Writes `<id>/conflicts/<incoming.source>` with `@replication-conflict-doc`
    /// and `@replication-conflict` both set, overwriting unconditionally —
    /// artifact identity is its key, not an etag.
    pub async fn save_contender<Body>(
        &self,
        id: &str,
        incoming_meta: &Metadata,
        incoming_body: Body,
    ) -> Result<String>
    where
        S: ItemStore<Body>,
        Body: Send + Sync,
    {
        let mut vm = VersionMeta::parse(incoming_meta);
        let tag = vm.require_stamp(id)?.source;
        vm.conflict_doc = true;
        vm.conflict = true;

        let mut meta = incoming_meta.clone();
        vm.write_back(&mut meta);

        let new_id = artifact_id(id, &tag);
        self.store
            .add_without_conflict(&new_id, None, meta, incoming_body)
            .await?;
        Ok(new_id)
    }

    /// Materializes the current winning record as its own artifact, then
    /// replaces the parent with a conflict placeholder enumerating both
    /// artifact ids.
    pub async fn create_conflict_parent<Body>(
        &self,
        id: &str,
        new_artifact_id: &str,
        existing_artifact_id: &str,
        existing_body: Body,
        existing_meta: Metadata,
    ) -> Result<CreatedConflict>
    where
        S: ItemStore<Body>,
        Body: Send + Sync + ConflictPlaceholder,
    {
        let mut artifact_vm = VersionMeta::parse(&existing_meta);
        artifact_vm.conflict_doc = true;
        artifact_vm.conflict = true;
        let mut artifact_meta = existing_meta;
        artifact_vm.write_back(&mut artifact_meta);

        self.store
            .add_without_conflict(existing_artifact_id, None, artifact_meta, existing_body)
            .await?;

        let artifact_ids = vec![
            existing_artifact_id.to_string(),
            new_artifact_id.to_string(),
        ];

        let mut parent_vm = VersionMeta::default();
        parent_vm.conflict = true;
        let mut parent_meta = Metadata::new();
        parent_vm.write_back(&mut parent_meta);

        let body = Body::placeholder(&artifact_ids);
        let etag = self
            .store
            .add_without_conflict(id, None, parent_meta, body)
            .await?;

        Ok(CreatedConflict { etag, artifact_ids })
    }

    /// Appends `new_artifact_id` to an already-conflicted parent's artifact
    /// list, unless it is already present.
    pub async fn append_to_existing_conflict<Body>(
        &self,
        id: &str,
        new_artifact_id: &str,
        parent_meta: Metadata,
        parent_body: &Body,
    ) -> Result<CreatedConflict>
    where
        S: ItemStore<Body>,
        Body: Send + Sync + ConflictPlaceholder,
    {
        let mut artifact_ids = parent_body.artifact_ids().ok_or_else(|| {
            IngestError::Internal(format!(
                "conflict placeholder at '{id}' has no readable artifact list"
            ))
        })?;
        if !artifact_ids.iter().any(|a| a == new_artifact_id) {
            artifact_ids.push(new_artifact_id.to_string());
        }

        let body = Body::placeholder(&artifact_ids);
        let etag = self
            .store
            .add_without_conflict(id, None, parent_meta, body)
            .await?;

        Ok(CreatedConflict { etag, artifact_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory::InMemoryStore;
    use serde_json::json;

    fn meta_with(source: &str, version: u64) -> Metadata {
        let mut vm = VersionMeta::default();
        vm.source = Some(source.to_string());
        vm.version = Some(version);
        let mut m = Metadata::new();
        vm.write_back(&mut m);
        m
    }

    #[tokio::test]
    async fn save_contender_names_artifact_by_incoming_source() {
        let store = InMemoryStore::<serde_json::Value>::new();
        let cs = ConflictStore::new(&store);
        let meta = meta_with("Y", 1);
        let id = cs
            .save_contender("a", &meta, json!({"n": 2}))
            .await
            .unwrap();
        assert_eq!(id, "a/conflicts/Y");

        let rec = store.try_get_existing(&id).await.unwrap().unwrap();
        let vm = VersionMeta::parse(&rec.meta);
        assert!(vm.conflict_doc);
        assert!(vm.conflict);
    }

    #[tokio::test]
    async fn create_conflict_parent_enumerates_both_artifacts() {
        let store = InMemoryStore::<serde_json::Value>::new();
        let cs = ConflictStore::new(&store);

        let existing_meta = meta_with("X", 1);
        let created = cs
            .create_conflict_parent(
                "a",
                "a/conflicts/Y",
                "a/conflicts/X",
                json!({"n": 1}),
                existing_meta,
            )
            .await
            .unwrap();

        assert_eq!(created.artifact_ids, vec!["a/conflicts/X", "a/conflicts/Y"]);

        let parent = store.try_get_existing("a").await.unwrap().unwrap();
        let vm = VersionMeta::parse(&parent.meta);
        assert!(vm.conflict);
        assert_eq!(
            parent.body.get("_conflicts").unwrap().as_array().unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn append_to_existing_conflict_is_idempotent_for_duplicates() {
        let store = InMemoryStore::<serde_json::Value>::new();
        let cs = ConflictStore::new(&store);

        let parent_meta = meta_with("", 0);
        let placeholder =
            <serde_json::Value as crate::body::ConflictPlaceholder>::placeholder(&[
                "a/conflicts/X".to_string(),
                "a/conflicts/Y".to_string(),
            ]);

        let created = cs
            .append_to_existing_conflict("a", "a/conflicts/Y", parent_meta.clone(), &placeholder)
            .await
            .unwrap();
        assert_eq!(created.artifact_ids.len(), 2, "duplicate not appended twice");

        let created = cs
            .append_to_existing_conflict("a", "a/conflicts/Z", parent_meta, &placeholder)
            .await
            .unwrap();
        assert_eq!(created.artifact_ids.len(), 3);
    }
}
