//! Shared fixtures for the black-box scenario tests: a recording
//! notification bus and a no-op conflict-cleanup trigger, standing in for
//! the plugin host and pub/sub bus this crate treats as external
//! collaborators (spec §1 "out of scope").

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use replicore::behavior::ReplicationBehavior;
use replicore::config::ReplicationConfig;
use replicore::error::Result;
use replicore::metadata::Metadata;
use replicore::notification::{NotificationBus, NotificationDispatcher, ReplicationConflictNotification};
use replicore::resolver::ResolverChain;
use replicore::test_support::memory::InMemoryStore;
use replicore::trigger_bridge::{ConflictCleanupTrigger, TriggerBridge};
use replicore::ItemType;

pub struct RecordingBus(pub Mutex<Vec<ReplicationConflictNotification>>);

impl RecordingBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    pub fn notifications(&self) -> Vec<ReplicationConflictNotification> {
        self.0.lock().clone()
    }
}

impl NotificationBus for RecordingBus {
    fn publish(&self, notification: ReplicationConflictNotification) {
        self.0.lock().push(notification);
    }
}

pub struct NoopTrigger;

#[async_trait]
impl ConflictCleanupTrigger<Value> for NoopTrigger {
    async fn on_put(
        &self,
        _id: &str,
        _body: &Value,
        _meta: &Metadata,
        _etag: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Builds a document-flavored engine with no registered resolvers, and
/// returns it alongside a handle to its backing store so the test can
/// seed state and assert on it directly (the engine only ever sees the
/// `ItemStore` trait surface).
pub fn document_engine(
    bus: Arc<RecordingBus>,
    local_replica_tag: &str,
) -> (ReplicationBehavior<Value, InMemoryStore<Value>>, InMemoryStore<Value>) {
    document_engine_with_resolvers(bus, local_replica_tag, ResolverChain::empty())
}

/// Same, but takes a caller-supplied resolver chain (for the
/// resolver-accepts-with-delete scenario).
pub fn document_engine_with_resolvers(
    bus: Arc<RecordingBus>,
    local_replica_tag: &str,
    resolvers: ResolverChain<Value>,
) -> (ReplicationBehavior<Value, InMemoryStore<Value>>, InMemoryStore<Value>) {
    let store = InMemoryStore::<Value>::new();
    let handle = store.clone();
    let trigger_bridge = TriggerBridge::new(Arc::new(NoopTrigger));
    let notifier = NotificationDispatcher::new(bus, None);
    let config = ReplicationConfig::new(local_replica_tag);
    let engine = ReplicationBehavior::new(
        store,
        resolvers,
        trigger_bridge,
        notifier,
        config,
        ItemType::Document,
    );
    (engine, handle)
}
