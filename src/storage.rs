//! The storage capability set consumed by the engine (§6, §9).
//!
//! `ItemStore<Body>` is the trait two concrete capability sets — one for
//! documents, one for attachments — implement and inject into
//! `ReplicationBehavior`. The engine never depends on a concrete storage
//! backend; it only depends on this trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::metadata::Metadata;

/// Opaque storage-layer version token used for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Etag(pub String);

/// The local record projection `TryGetExisting` surfaces for a given id.
#[derive(Debug, Clone)]
pub struct ExistingRecord<Body> {
    pub meta: Metadata,
    pub body: Body,
    pub etag: Etag,
    /// "Locally-deleted" — a tombstone retained to preserve history.
    pub deleted: bool,
}

/// The synchronous, transactional storage interface the engine requires
/// per item-kind (§6). All writes bypass normal triggers — that is the
/// whole reason `TriggerBridge` exists.
#[async_trait]
pub trait ItemStore<Body>: Send + Sync
where
    Body: Send + Sync,
{
    /// Returns `None` iff no record (neither live nor tombstone) exists
    /// for `id`.
    async fn try_get_existing(&self, id: &str) -> Result<Option<ExistingRecord<Body>>>;

    /// Upserts `id` with optimistic concurrency iff `etag` is `Some`.
    async fn add_without_conflict(
        &self,
        id: &str,
        etag: Option<Etag>,
        meta: Metadata,
        body: Body,
    ) -> Result<Etag>;

    /// Hard-deletes `id`. `etag` enforces optimistic concurrency when present.
    async fn delete_item(&self, id: &str, etag: Option<Etag>) -> Result<()>;

    /// Writes a tombstone at `id` preserving `meta` (in particular its
    /// history).
    async fn mark_as_deleted(&self, id: &str, meta: Metadata) -> Result<Etag>;
}
