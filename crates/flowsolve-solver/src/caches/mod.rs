//! Session caches.
//!
//! - `PairCache`: (producer, consumer) pairs already checked. Never holds a
//!   pair where either side is a variable. A pair is entered before its check
//!   runs, so cyclic types terminate; pairs whose check reported an error
//!   outside speculation are also kept in a failed set, so a later trial of
//!   the same pair fails again instead of hitting the cache.
//! - `InstantiationCache`: existential instantiation of a polymorphic type
//!   per use site.
//! - `ExpansionCache`: expanded bodies of generic applications.
//! - `SentinelCache`: per-union sentinel-property hints (`sentinel.rs`).
//!
//! The pair and instantiation caches are undo-logged: speculation takes a
//! snapshot before each trial and rolls back afterwards, so nothing a failed
//! or conditional trial learned survives it.

pub(crate) mod query_trace;

use flowsolve_common::limits;
use flowsolve_common::span::Span;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::Arc;

use crate::sentinel::SentinelInfo;
use crate::types::{ApplicationId, TypeId};

/// Hit/miss counters for the session caches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub pair_hits: u64,
    pub pair_misses: u64,
    pub instantiation_hits: u64,
    pub instantiation_misses: u64,
    pub expansion_hits: u64,
    pub expansion_misses: u64,
    pub sentinel_hits: u64,
    pub sentinel_skips: u64,
}

/// Positions in the undo logs, taken before a speculative trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheSnapshot {
    pairs: usize,
    instantiations: usize,
}

/// Result of a pair-cache lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairLookup {
    /// First visit; the pair is now recorded and must be checked.
    Miss,
    /// Checked before (or in progress) without a committed error.
    Hit,
    /// Checked before and reported an error.
    Failed,
}

// =============================================================================
// PairCache
// =============================================================================

#[derive(Debug)]
pub struct PairCache {
    pairs: FxHashSet<(TypeId, TypeId)>,
    failed: FxHashSet<(TypeId, TypeId)>,
    undo: Vec<(TypeId, TypeId)>,
}

impl Default for PairCache {
    fn default() -> Self {
        PairCache {
            pairs: FxHashSet::with_capacity_and_hasher(
                limits::INITIAL_PAIR_CACHE_CAPACITY,
                Default::default(),
            ),
            failed: FxHashSet::default(),
            undo: Vec::new(),
        }
    }
}

impl PairCache {
    /// Record a stripped pair. Returns `false` if it was already present.
    pub fn insert(&mut self, lower: TypeId, upper: TypeId, logging: bool) -> bool {
        let inserted = self.pairs.insert((lower, upper));
        if inserted && logging {
            self.undo.push((lower, upper));
        }
        inserted
    }

    pub fn contains(&self, lower: TypeId, upper: TypeId) -> bool {
        self.pairs.contains(&(lower, upper))
    }

    /// Whether the pair's committed check reported an error.
    pub fn failed(&self, lower: TypeId, upper: TypeId) -> bool {
        self.failed.contains(&(lower, upper))
    }

    /// Only called outside speculation, so never undo-logged.
    pub fn mark_failed(&mut self, lower: TypeId, upper: TypeId) {
        self.failed.insert((lower, upper));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn rollback_to(&mut self, len: usize) {
        while self.undo.len() > len {
            if let Some(pair) = self.undo.pop() {
                self.pairs.remove(&pair);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TypeId, TypeId)> {
        self.pairs.iter()
    }
}

// =============================================================================
// InstantiationCache
// =============================================================================

#[derive(Debug, Default)]
pub struct InstantiationCache {
    map: FxHashMap<(TypeId, Span), TypeId>,
    undo: Vec<(TypeId, Span)>,
}

impl InstantiationCache {
    pub fn get(&self, poly: TypeId, site: Span) -> Option<TypeId> {
        self.map.get(&(poly, site)).copied()
    }

    pub fn insert(&mut self, poly: TypeId, site: Span, instance: TypeId, logging: bool) {
        if self.map.insert((poly, site), instance).is_none() && logging {
            self.undo.push((poly, site));
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn rollback_to(&mut self, len: usize) {
        while self.undo.len() > len {
            if let Some(key) = self.undo.pop() {
                self.map.remove(&key);
            }
        }
    }
}

// =============================================================================
// SolverCaches
// =============================================================================

#[derive(Debug, Default)]
pub struct SolverCaches {
    pub pairs: PairCache,
    pub instantiations: InstantiationCache,
    /// Expansion is a pure function of the application, so it is never
    /// rolled back.
    pub expansions: FxHashMap<ApplicationId, TypeId>,
    pub sentinels: FxHashMap<TypeId, Option<Arc<SentinelInfo>>>,
    pub stats: CacheStats,
    open_snapshots: u32,
}

impl SolverCaches {
    /// Whether mutations must be undo-logged.
    #[inline]
    pub fn logging(&self) -> bool {
        self.open_snapshots > 0
    }

    pub fn snapshot(&mut self) -> CacheSnapshot {
        self.open_snapshots += 1;
        CacheSnapshot {
            pairs: self.pairs.undo.len(),
            instantiations: self.instantiations.undo.len(),
        }
    }

    pub fn rollback_to(&mut self, snapshot: CacheSnapshot) {
        self.pairs.rollback_to(snapshot.pairs);
        self.instantiations.rollback_to(snapshot.instantiations);
        self.open_snapshots = self.open_snapshots.saturating_sub(1);
        if self.open_snapshots == 0 {
            self.pairs.undo.clear();
            self.instantiations.undo.clear();
        }
    }

    /// Check-and-record for the dispatcher.
    pub fn pair_seen(&mut self, lower: TypeId, upper: TypeId) -> PairLookup {
        let logging = self.logging();
        if self.pairs.insert(lower, upper, logging) {
            self.stats.pair_misses += 1;
            PairLookup::Miss
        } else if self.pairs.failed(lower, upper) {
            self.stats.pair_hits += 1;
            PairLookup::Failed
        } else {
            self.stats.pair_hits += 1;
            PairLookup::Hit
        }
    }

    pub fn cached_instantiation(&mut self, poly: TypeId, site: Span) -> Option<TypeId> {
        let hit = self.instantiations.get(poly, site);
        match hit {
            Some(_) => self.stats.instantiation_hits += 1,
            None => self.stats.instantiation_misses += 1,
        }
        hit
    }

    pub fn record_instantiation(&mut self, poly: TypeId, site: Span, instance: TypeId) {
        let logging = self.logging();
        self.instantiations.insert(poly, site, instance, logging);
    }
}

#[cfg(test)]
#[path = "../../tests/caches_tests.rs"]
mod tests;
