//! Test-only capability-set implementations.
//!
//! Not part of the capability set a host application is expected to supply
//! (spec.md §6's `ItemStore` is meant to be backed by a real store); this
//! module exists so unit tests colocated in each component and the
//! black-box scenario tests under `tests/` can drive `ReplicationBehavior`
//! against something real rather than hand-rolled mocks per test, matching
//! the corpus's convention of testing through the public trait surface.
//! Left unconditionally compiled (rather than `#[cfg(test)]`-gated) so that
//! `tests/scenarios.rs`, which links the crate as an ordinary dependency,
//! can use it too.
#[doc(hidden)]
pub mod memory;
