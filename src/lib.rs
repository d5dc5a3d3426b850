//! Per-item replication ingestion core.
//!
//! Given an incoming `(id, metadata, body)` tuple from a peer replica, this
//! crate decides deterministically whether to fast-forward a put,
//! fast-forward a delete, suppress a duplicate replay, apply an automatic
//! conflict resolution, or materialize a conflict preserving all
//! contending versions. The engine is generic over item kind (document or
//! attachment) via the [`ItemStore`](storage::ItemStore) capability set it
//! is constructed with; it owns no concrete storage backend, transport, or
//! trigger host.
//!
//! Entry point: [`behavior::ReplicationBehavior::replicate`].

pub mod behavior;
pub mod body;
pub mod cancellation;
pub mod config;
pub mod conflict_store;
pub mod error;
pub mod historian;
pub mod metadata;
pub mod notification;
pub mod resolver;
pub mod resolvers;
pub mod storage;
pub mod trigger_bridge;

#[doc(hidden)]
pub mod test_support;

pub use behavior::ReplicationBehavior;
pub use cancellation::CancellationToken;
pub use config::ReplicationConfig;
pub use error::{IngestError, Result};
pub use notification::{ItemType, OperationType, ReplicationConflictNotification};
