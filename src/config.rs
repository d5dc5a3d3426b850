//! Construction-time configuration (§6: "No CLI / env vars / file formats
//! at this layer. Configuration... is passed at construction"), mirroring
//! the `*Config` structs with `Default` impls used throughout
//! `rusty-db::replication::{conflicts,manager,monitor,slots,snapshots,wal}`.

use crate::metadata::HISTORY_MAX_DEFAULT;

#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Bound on `@replication-history` length (invariant 3).
    pub history_max: usize,
    /// Bounded retry count on `StorageConflict` from the underlying store
    /// (§5 strategy 2, layered as defense in depth over the lock table).
    pub max_resolution_retries: usize,
    /// This replica's own stable tag, used to name local conflict
    /// artifacts (`<id>/conflicts/<local_replica_tag>`).
    pub local_replica_tag: String,
}

impl ReplicationConfig {
    pub fn new(local_replica_tag: impl Into<String>) -> Self {
        Self {
            local_replica_tag: local_replica_tag.into(),
            ..Self::default()
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            history_max: HISTORY_MAX_DEFAULT,
            max_resolution_retries: 5,
            local_replica_tag: String::new(),
        }
    }
}
