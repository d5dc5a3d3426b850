//! C4 — TriggerBridge: manually re-invokes the "remove-conflict-on-put"
//! trigger on resolver-mediated writes, because the replication write path
//! bypasses normal triggers (§4.4).

use async_trait::async_trait;

use crate::body::AsJson;
use crate::error::Result;
use crate::metadata::Metadata;

/// The single trigger the engine is required to re-invoke itself:
/// `on_put` for "remove-conflict-on-put". Concrete implementations
/// delegate to whatever plugin/trigger host the application runs; this
/// crate only needs the one seam.
#[async_trait]
pub trait ConflictCleanupTrigger<Body>: Send + Sync
where
    Body: Send + Sync,
{
    async fn on_put(&self, id: &str, body: &Body, meta: &Metadata, etag: Option<&str>)
        -> Result<()>;
}

/// Bridges the engine to a registered `ConflictCleanupTrigger`. Runs only
/// when the resolved body is JSON-shaped (§4.4); skipped for opaque byte
/// blobs, matching `Body::as_json() -> None` for attachments.
pub struct TriggerBridge<Body> {
    trigger: std::sync::Arc<dyn ConflictCleanupTrigger<Body>>,
}

impl<Body> TriggerBridge<Body>
where
    Body: Send + Sync + AsJson,
{
    pub fn new(trigger: std::sync::Arc<dyn ConflictCleanupTrigger<Body>>) -> Self {
        Self { trigger }
    }

    /// Invoked before `AddWithoutConflict` on a resolver-mediated,
    /// non-delete put (§4.5.1 step 5).
    pub async fn on_resolved_put(
        &self,
        id: &str,
        resolved_meta: &Metadata,
        resolved_body: &Body,
        etag: Option<&str>,
    ) -> Result<()> {
        if resolved_body.as_json().is_none() {
            log::trace!("skipping conflict-cleanup trigger on '{id}': body is not JSON-shaped");
            return Ok(());
        }
        self.trigger
            .on_put(id, resolved_body, resolved_meta, etag)
            .await
    }
}
