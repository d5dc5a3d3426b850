//! A small cooperative cancellation token (§5), grounded in
//! `rusty-db::concurrent::{epoch,hazard}`'s atomic-flag idioms.
//!
//! Honored only *between* the discrete steps of a `replicate` call; a
//! started storage write always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{IngestError, Result};

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(IngestError::Cancelled)` if cancellation was requested.
    /// Callers check this between steps, never mid-write.
    pub fn check(&self, id: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled(id.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncancelled_token_checks_clean() {
        let token = CancellationToken::new();
        assert!(token.check("a").is_ok());
    }

    #[test]
    fn cancel_is_visible_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.check("a").is_err());
    }
}
