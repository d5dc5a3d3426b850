//! C5 — ReplicationBehavior: the decision state machine composing
//! Historian, ConflictStore, ResolverChain, and TriggerBridge (§4.5).
//!
//! Entry point: [`ReplicationBehavior::replicate`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::body::{AsJson, ConflictPlaceholder};
use crate::cancellation::CancellationToken;
use crate::config::ReplicationConfig;
use crate::conflict_store::ConflictStore;
use crate::error::{IngestError, Result};
use crate::historian::{self, VersionRelation};
use crate::metadata::{artifact_id, Metadata, VersionMeta};
use crate::notification::{
    ItemType, NotificationDispatcher, OperationType, ReplicationConflictNotification,
};
use crate::resolver::ResolverChain;
use crate::storage::ItemStore;
use crate::trigger_bridge::TriggerBridge;

/// The full decision engine for one item-kind. Generic over `Body` so the
/// same machine serves both documents and attachments (§9).
pub struct ReplicationBehavior<Body, S> {
    store: S,
    resolvers: ResolverChain<Body>,
    trigger_bridge: TriggerBridge<Body>,
    notifier: NotificationDispatcher,
    config: ReplicationConfig,
    item_type: ItemType,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<Body, S> ReplicationBehavior<Body, S>
where
    Body: Send + Sync + Clone + Default + AsJson + ConflictPlaceholder,
    S: ItemStore<Body>,
{
    /// Fails to construct if replication would be active with no
    /// remove-conflict trigger registered (§4.4, §7 `ConfigurationError`)
    /// — callers cannot omit `trigger_bridge`, so that check is
    /// structural rather than a runtime assertion.
    pub fn new(
        store: S,
        resolvers: ResolverChain<Body>,
        trigger_bridge: TriggerBridge<Body>,
        notifier: NotificationDispatcher,
        config: ReplicationConfig,
        item_type: ItemType,
    ) -> Self {
        Self {
            store,
            resolvers,
            trigger_bridge,
            notifier,
            config,
            item_type,
            locks: DashMap::new(),
        }
    }

    async fn lock_for(&self, id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// `replicate(id, metadata, body_or_null)` (§4.5). The first branch on
    /// `@delete-marker` selects the put or delete sub-machine. Holds the
    /// per-id lock for the duration of the call (§5 strategy 1) and
    /// additionally retries on `StorageConflict` up to
    /// `config.max_resolution_retries` (§5 strategy 2, defense in depth).
    pub async fn replicate(
        &self,
        id: &str,
        metadata: Metadata,
        body: Option<Body>,
        token: &CancellationToken,
    ) -> Result<()> {
        let is_delete = VersionMeta::parse(&metadata).delete_marker;
        let mut attempt = 0usize;

        loop {
            token.check(id)?;
            let _guard = self.lock_for(id).await;

            let outcome = if is_delete {
                self.delete_path(id, &metadata, token).await
            } else {
                let body = body.clone().ok_or_else(|| IngestError::MalformedMetadata {
                    id: id.to_string(),
                    reason: "put requires a body".to_string(),
                })?;
                self.put_path(id, metadata.clone(), body, token).await
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.config.max_resolution_retries => {
                    attempt += 1;
                    log::warn!(
                        "storage conflict replicating '{id}', retrying ({attempt}/{})",
                        self.config.max_resolution_retries
                    );
                    continue;
                }
                other => return other,
            }
        }
    }

    async fn put_path(
        &self,
        id: &str,
        meta: Metadata,
        body: Body,
        token: &CancellationToken,
    ) -> Result<()> {
        let local = self.store.try_get_existing(id).await?;

        let Some(local) = local else {
            log::debug!("'{id}': no local record, plain add");
            self.store.add_without_conflict(id, None, meta, body).await?;
            return Ok(());
        };

        let incoming_vm = VersionMeta::parse(&meta);
        let local_vm = VersionMeta::parse(&local.meta);
        let relation = historian::relation(&incoming_vm, &local_vm);

        if relation == VersionRelation::IdenticalReplay {
            log::trace!("'{id}': identical replay suppressed");
            return Ok(());
        }

        let parent_is_conflicted = local_vm.conflict;
        token.check(id)?;

        if !parent_is_conflicted && relation == VersionRelation::IncomingDescendsLocal {
            let etag = if local.deleted { None } else { Some(local.etag.clone()) };
            log::debug!("'{id}': fast-forward put");
            self.store.add_without_conflict(id, etag, meta, body).await?;
            return Ok(());
        }

        token.check(id)?;
        let offered = self
            .resolvers
            .offer(id, &meta, Some(&body), &local.body)
            .await;

        if let Some((resolved_meta, resolved_body)) = offered {
            let resolved_vm = VersionMeta::parse(&resolved_meta);
            if resolved_vm.resolver_delete_marker {
                log::debug!("'{id}': resolver accepted with delete");
                self.store.delete_item(id, None).await?;
                self.store.mark_as_deleted(id, resolved_meta).await?;
                return Ok(());
            }

            let etag = if local.deleted { None } else { Some(local.etag.clone()) };
            if resolved_body.as_json().is_some() {
                self.trigger_bridge
                    .on_resolved_put(id, &resolved_meta, &resolved_body, etag.as_ref().map(|e| e.0.as_str()))
                    .await?;
            }
            log::debug!("'{id}': resolver accepted");
            self.store
                .add_without_conflict(id, etag, resolved_meta, resolved_body)
                .await?;
            return Ok(());
        }

        token.check(id)?;
        log::warn!("'{id}': concurrent conflict, materializing (put)");
        let created = self
            .materialize_conflict(id, &meta, body, parent_is_conflicted, local.meta, local.body)
            .await?;
        self.notifier.dispatch(ReplicationConflictNotification {
            id: id.to_string(),
            etag: created.0,
            item_type: self.item_type,
            operation_type: OperationType::Put,
            conflicts: created.1,
        });
        Ok(())
    }

    async fn delete_path(
        &self,
        id: &str,
        meta: &Metadata,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(local) = self.store.try_get_existing(id).await? else {
            log::trace!("'{id}': delete of nothing, no-op");
            return Ok(());
        };

        let incoming_vm = VersionMeta::parse(meta);
        let local_vm = VersionMeta::parse(&local.meta);
        let relation = historian::relation(&incoming_vm, &local_vm);

        if relation == VersionRelation::IdenticalReplay {
            log::trace!("'{id}': identical replay suppressed (delete)");
            return Ok(());
        }

        token.check(id)?;

        if local_vm.delete_marker {
            log::debug!("'{id}': delete over local tombstone, merging history");
            // The mark carries incoming's own (source, version) and flags —
            // only `@replication-history` is replaced, with local's history
            // folded in so neither side's ancestry is lost.
            let mut merged_vm = incoming_vm.clone();
            merged_vm.history = local_vm.history.clone();
            merged_vm.merge_history(&incoming_vm.history, self.config.history_max);
            let mut new_meta = meta.clone();
            merged_vm.write_back(&mut new_meta);
            self.store.mark_as_deleted(id, new_meta).await?;
            return Ok(());
        }

        token.check(id)?;
        if relation == VersionRelation::IncomingDescendsLocal {
            log::debug!("'{id}': fast-forward delete");
            self.store.delete_item(id, Some(local.etag.clone())).await?;
            self.store.mark_as_deleted(id, meta.clone()).await?;
            return Ok(());
        }

        token.check(id)?;
        let offered = self
            .resolvers
            .offer(id, meta, None, &local.body)
            .await;

        if let Some((resolved_meta, resolved_body)) = offered {
            let resolved_vm = VersionMeta::parse(&resolved_meta);
            if resolved_vm.resolver_delete_marker {
                log::debug!("'{id}': resolver accepted delete-vs-update with delete");
                self.store.delete_item(id, None).await?;
                self.store.mark_as_deleted(id, resolved_meta).await?;
            } else {
                log::debug!("'{id}': resolver accepted delete-vs-update with put");
                self.store
                    .add_without_conflict(id, Some(local.etag.clone()), resolved_meta, resolved_body)
                    .await?;
            }
            return Ok(());
        }

        token.check(id)?;
        log::warn!("'{id}': concurrent conflict, materializing (delete)");
        // The incoming side carries no body on the delete path; an empty
        // body stands in for the tombstone's (absent) payload in the
        // contender artifact.
        let created = self
            .materialize_conflict(
                id,
                meta,
                Body::default(),
                local_vm.conflict,
                local.meta,
                local.body,
            )
            .await?;
        self.notifier.dispatch(ReplicationConflictNotification {
            id: id.to_string(),
            etag: created.0,
            item_type: self.item_type,
            operation_type: OperationType::Delete,
            conflicts: created.1,
        });
        Ok(())
    }

    async fn materialize_conflict(
        &self,
        id: &str,
        incoming_meta: &Metadata,
        incoming_body: Body,
        parent_is_conflicted: bool,
        local_meta: Metadata,
        local_body: Body,
    ) -> Result<(String, Vec<String>)> {
        let cs = ConflictStore::new(&self.store);
        let new_artifact_id = cs.save_contender(id, incoming_meta, incoming_body).await?;

        let created = if parent_is_conflicted {
            cs.append_to_existing_conflict(id, &new_artifact_id, local_meta, &local_body)
                .await?
        } else {
            let existing_artifact_id = artifact_id(id, &self.config.local_replica_tag);
            cs.create_conflict_parent(
                id,
                &new_artifact_id,
                &existing_artifact_id,
                local_body,
                local_meta,
            )
            .await?
        };

        Ok((created.etag.0, created.artifact_ids))
    }
}
