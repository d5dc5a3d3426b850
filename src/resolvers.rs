//! Illustrative built-in resolvers, grounded in
//! `rusty-db::replication::conflicts::{LastWriteWinsResolver,
//! FirstWriteWinsResolver}`'s pattern of two symmetric trivial strategies.
//!
//! The resolver interface (§6) passes only `incoming_meta`, never
//! `existing_meta` — there is no version-vector or wall-clock data
//! available on the existing side to compare against, so these are not a
//! faithful "pick the higher version" strategy; they are the closest
//! analogue reachable with the data the interface actually supplies:
//! always take one side's body unconditionally. Neither is registered by
//! default — applications opt in.

use async_trait::async_trait;

use crate::error::Result;
use crate::metadata::Metadata;
use crate::resolver::Resolver;

/// Always accepts the incoming side, discarding the existing body.
pub struct PreferIncomingResolver;

#[async_trait]
impl<Body> Resolver<Body> for PreferIncomingResolver
where
    Body: Clone + Send + Sync,
{
    async fn try_resolve(
        &self,
        id: &str,
        incoming_meta: &Metadata,
        incoming_body: Option<&Body>,
        _existing_body: &Body,
    ) -> Result<Option<(Metadata, Body)>> {
        match incoming_body {
            Some(body) => Ok(Some((incoming_meta.clone(), body.clone()))),
            // Delete path: there is no incoming body to prefer, only an
            // incoming intent to delete; decline and let the engine's own
            // delete-path conflict handling run.
            None => {
                log::trace!("{} declines on '{id}': no incoming body to prefer", self.name());
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "prefer-incoming"
    }
}

/// Always keeps the existing side, discarding the incoming body.
pub struct PreferExistingResolver;

#[async_trait]
impl<Body> Resolver<Body> for PreferExistingResolver
where
    Body: Clone + Send + Sync,
{
    async fn try_resolve(
        &self,
        _id: &str,
        incoming_meta: &Metadata,
        _incoming_body: Option<&Body>,
        existing_body: &Body,
    ) -> Result<Option<(Metadata, Body)>> {
        Ok(Some((incoming_meta.clone(), existing_body.clone())))
    }

    fn name(&self) -> &str {
        "prefer-existing"
    }
}
