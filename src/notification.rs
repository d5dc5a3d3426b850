//! The notification contract (§6, §9 "Deferred notification").
//!
//! A `ReplicationConflictNotification` is posted to the bus iff a conflict
//! was materialized by this `replicate` call. Delivery honors "execute
//! immediately if no active storage transaction, else on commit" via the
//! small `TxHook` abstraction: when a transaction is active on the calling
//! thread, the publish is queued into its on-commit hook instead of firing
//! synchronously.

use std::fmt;

/// The kind of item a notification concerns. The engine is otherwise
/// generic over body type; this enum is the one place it still needs to
/// know which concrete capability set is in play, purely for the wire
/// shape of the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Document,
    Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Put,
    Delete,
}

/// Posted to the bus after the materializing transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConflictNotification {
    pub id: String,
    pub etag: String,
    pub item_type: ItemType,
    pub operation_type: OperationType,
    pub conflicts: Vec<String>,
}

impl fmt::Display for ReplicationConflictNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict on {} ({:?} {:?}): {} contender(s)",
            self.id,
            self.item_type,
            self.operation_type,
            self.conflicts.len()
        )
    }
}

/// The pub/sub bus the engine posts conflict notifications to. Append-only
/// and thread-safe by contract (§5) — the engine never holds a lock across
/// a call to `publish`.
pub trait NotificationBus: Send + Sync {
    fn publish(&self, notification: ReplicationConflictNotification);
}

/// Per-thread transaction hook surfaced by the storage capability set.
/// `ItemStore` implementations that run each `replicate` call inside a
/// real transaction return `Some(hook)`; implementations with no
/// transaction concept (or tests) can omit it entirely.
pub trait TxHook: Send + Sync {
    /// True if a storage transaction is currently active on this thread.
    fn is_active(&self) -> bool;

    /// Registers `f` to run once the active transaction commits. Only
    /// called when `is_active()` is true.
    fn on_commit(&self, f: Box<dyn FnOnce() + Send>);
}

/// Dispatches a notification either immediately or via the transaction's
/// on-commit hook, per §9's deferred-notification design note.
pub struct NotificationDispatcher {
    bus: std::sync::Arc<dyn NotificationBus>,
    tx_hook: Option<std::sync::Arc<dyn TxHook>>,
}

impl NotificationDispatcher {
    pub fn new(
        bus: std::sync::Arc<dyn NotificationBus>,
        tx_hook: Option<std::sync::Arc<dyn TxHook>>,
    ) -> Self {
        Self { bus, tx_hook }
    }

    pub fn dispatch(&self, notification: ReplicationConflictNotification) {
        match &self.tx_hook {
            Some(hook) if hook.is_active() => {
                let bus = self.bus.clone();
                hook.on_commit(Box::new(move || bus.publish(notification)));
            }
            _ => self.bus.publish(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingBus(Mutex<Vec<ReplicationConflictNotification>>);

    impl NotificationBus for RecordingBus {
        fn publish(&self, notification: ReplicationConflictNotification) {
            self.0.lock().push(notification);
        }
    }

    fn sample() -> ReplicationConflictNotification {
        ReplicationConflictNotification {
            id: "a".to_string(),
            etag: "et1".to_string(),
            item_type: ItemType::Document,
            operation_type: OperationType::Put,
            conflicts: vec!["a/conflicts/X".to_string()],
        }
    }

    #[test]
    fn dispatch_publishes_immediately_with_no_tx_hook() {
        let bus = Arc::new(RecordingBus(Mutex::new(Vec::new())));
        let dispatcher = NotificationDispatcher::new(bus.clone(), None);
        dispatcher.dispatch(sample());
        assert_eq!(bus.0.lock().len(), 1);
    }

    struct AlwaysActiveHook(Mutex<Vec<Box<dyn FnOnce() + Send>>>);

    impl TxHook for AlwaysActiveHook {
        fn is_active(&self) -> bool {
            true
        }
        fn on_commit(&self, f: Box<dyn FnOnce() + Send>) {
            self.0.lock().push(f);
        }
    }

    #[test]
    fn dispatch_defers_to_on_commit_when_tx_active() {
        let bus = Arc::new(RecordingBus(Mutex::new(Vec::new())));
        let hook = Arc::new(AlwaysActiveHook(Mutex::new(Vec::new())));
        let dispatcher = NotificationDispatcher::new(bus.clone(), Some(hook.clone()));
        dispatcher.dispatch(sample());

        assert_eq!(bus.0.lock().len(), 0, "must not publish before commit");
        let queued = hook.0.lock().drain(..).collect::<Vec<_>>();
        for f in queued {
            f();
        }
        assert_eq!(bus.0.lock().len(), 1);
    }
}
