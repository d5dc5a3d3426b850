//! C3 — ResolverChain: an ordered list of pluggable resolvers, first
//! success wins (§4.3).

use async_trait::async_trait;

use crate::error::Result;
use crate::metadata::Metadata;

/// A single pluggable conflict resolver. Resolvers are side-effect free
/// with respect to storage — they compute a proposed `(meta, body)`, or
/// decline by returning `Ok(None)`.
///
/// A resolver that wants the resolution to materialize as a delete rather
/// than a put sets `@resolver-delete-marker=true` on the returned metadata
/// (§3); the engine reads that flag, not a separate return value.
///
/// `incoming_body` is `None` on the delete path (§6): only `existing_body`
/// is meaningful there, since the incoming side carries no body.
#[async_trait]
pub trait Resolver<Body>: Send + Sync {
    async fn try_resolve(
        &self,
        id: &str,
        incoming_meta: &Metadata,
        incoming_body: Option<&Body>,
        existing_body: &Body,
    ) -> Result<Option<(Metadata, Body)>>;

    /// Used in logging only.
    fn name(&self) -> &str;
}

/// Ordered sequence of resolvers. Order is authoritative.
pub struct ResolverChain<Body> {
    resolvers: Vec<std::sync::Arc<dyn Resolver<Body>>>,
}

impl<Body> ResolverChain<Body> {
    pub fn new(resolvers: Vec<std::sync::Arc<dyn Resolver<Body>>>) -> Self {
        Self { resolvers }
    }

    pub fn empty() -> Self {
        Self { resolvers: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Calls each resolver in order; the first `Some` result wins. A
    /// resolver error is logged at error level and treated as a decline
    /// (§4.5.3, §7 `ResolverFailure`) — it never aborts the chain or the
    /// call.
    pub async fn offer(
        &self,
        id: &str,
        incoming_meta: &Metadata,
        incoming_body: Option<&Body>,
        existing_body: &Body,
    ) -> Option<(Metadata, Body)> {
        for resolver in &self.resolvers {
            match resolver
                .try_resolve(id, incoming_meta, incoming_body, existing_body)
                .await
            {
                Ok(Some(result)) => return Some(result),
                Ok(None) => continue,
                Err(e) => {
                    log::error!(
                        "resolver '{}' failed on '{id}': {e}",
                        resolver.name()
                    );
                    continue;
                }
            }
        }
        None
    }
}
