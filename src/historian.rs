//! C1 — the Historian: a pure predicate over causal history.
//!
//! Stateless by design (§4.1): given two parsed `VersionMeta`s it answers
//! one question — how does the incoming version relate to the version
//! already stored locally — and nothing else touches storage, locks, or
//! time.

use std::collections::HashMap;

use crate::metadata::VersionMeta;

/// The outcome of comparing an incoming version against the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRelation {
    /// Same (source, version) pair on both sides.
    IdenticalReplay,
    /// The incoming version's causal closure is a superset of the local
    /// one's — a fast-forward.
    IncomingDescendsLocal,
    /// The reverse of the above — the local version already dominates.
    LocalDescendsIncoming,
    /// Neither side's closure contains the other's stamp — a conflict.
    Concurrent,
}

/// Reduces a closure to one highest-seen version per source. Bounding
/// `@replication-history` (invariant 3) can evict an ancestor stamp a peer
/// still has; comparing per-source high-water marks instead of exact stamp
/// sets means an evicted ancestor doesn't make its descendant's closure
/// look smaller than it is.
fn version_floor(meta: &VersionMeta) -> HashMap<String, u64> {
    let mut floor: HashMap<String, u64> = HashMap::new();
    for stamp in meta.closure() {
        floor
            .entry(stamp.source)
            .and_modify(|v| *v = (*v).max(stamp.version))
            .or_insert(stamp.version);
    }
    floor
}

/// True when, for every source `other` has seen, `subject` has seen that
/// source at an equal or higher version. `other` must be non-empty — an
/// empty floor dominates nothing and is dominated by nothing.
fn dominates(subject: &HashMap<String, u64>, other: &HashMap<String, u64>) -> bool {
    !other.is_empty()
        && other
            .iter()
            .all(|(source, version)| subject.get(source).is_some_and(|v| v >= version))
}

/// Computes the causal relation between `incoming` and `local`.
///
/// A missing `@replication-version` on either side disqualifies any
/// directional claim — both `IdenticalReplay` (which also requires the
/// stamps to match) and fast-forward require a current stamp on both
/// sides; a side missing one can only be `Concurrent` with the other.
pub fn relation(incoming: &VersionMeta, local: &VersionMeta) -> VersionRelation {
    let incoming_stamp = incoming.stamp();
    let local_stamp = local.stamp();

    if incoming_stamp.is_some() && incoming_stamp == local_stamp {
        return VersionRelation::IdenticalReplay;
    }

    if incoming_stamp.is_none() || local_stamp.is_none() {
        return VersionRelation::Concurrent;
    }

    let incoming_floor = version_floor(incoming);
    let local_floor = version_floor(local);

    let incoming_dominates = dominates(&incoming_floor, &local_floor);
    let local_dominates = dominates(&local_floor, &incoming_floor);

    match (incoming_dominates, local_dominates) {
        (true, false) => VersionRelation::IncomingDescendsLocal,
        (false, true) => VersionRelation::LocalDescendsIncoming,
        // Equal floors with different current stamps, or genuinely
        // disjoint floors, are both conflicts: the spec defines descent
        // strictly via containment, not equality.
        _ => VersionRelation::Concurrent,
    }
}
