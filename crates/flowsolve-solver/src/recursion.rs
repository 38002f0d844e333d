//! Limits for the solver's secondary recursive walks.
//!
//! Propagation itself is bounded by the `Trace` depth token. The walks here
//! are the ones that run over already-built types: concretizing resolved
//! variables, substitution, formatting and loop-guard root collection.

use flowsolve_common::limits;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Named depth presets, one per walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// Concretizing a goal's type.
    Resolution,
    /// Rendering types for diagnostics.
    TypeFormatting,
    /// Instantiating polymorphic and definition bodies.
    Substitution,
    /// Root collection for the application loop guard; looks through unions
    /// and variables only.
    ShallowTraversal,
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::Resolution => limits::MAX_RESOLUTION_DEPTH,
            Self::TypeFormatting | Self::Substitution => 50,
            Self::ShallowTraversal => 20,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        100_000
    }
}

/// Outcome of [`RecursionGuard::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    Entered,
    /// The key is already on the walk's stack.
    Cycle,
    DepthExceeded,
    IterationExceeded,
}

impl RecursionResult {
    pub fn is_entered(self) -> bool {
        self == Self::Entered
    }
}

/// Cycle detection keyed by `K`, plus depth and total-visit budgets.
///
/// Every `Entered` must be paired with a `leave` of the same key.
pub struct RecursionGuard<K: Hash + Eq + Copy> {
    stack: FxHashSet<K>,
    visits: u32,
    max_depth: u32,
    max_visits: u32,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_visits: u32) -> Self {
        RecursionGuard {
            stack: FxHashSet::default(),
            visits: 0,
            max_depth,
            max_visits,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.visits = self.visits.saturating_add(1);
        if self.visits > self.max_visits {
            RecursionResult::IterationExceeded
        } else if self.stack.len() as u32 >= self.max_depth {
            RecursionResult::DepthExceeded
        } else if !self.stack.insert(key) {
            RecursionResult::Cycle
        } else {
            RecursionResult::Entered
        }
    }

    pub fn leave(&mut self, key: K) {
        let removed = self.stack.remove(&key);
        debug_assert!(removed, "leave without matching enter");
    }

    pub fn is_visiting(&self, key: &K) -> bool {
        self.stack.contains(key)
    }

    pub fn depth(&self) -> u32 {
        self.stack.len() as u32
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }
}

/// Depth-only counter for walks that may revisit the same type.
pub struct DepthCounter {
    depth: u32,
    max_depth: u32,
}

impl DepthCounter {
    pub fn with_profile(profile: RecursionProfile) -> Self {
        DepthCounter {
            depth: 0,
            max_depth: profile.max_depth(),
        }
    }

    /// `false` at the limit; the caller must not `leave` then.
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.max_depth {
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}
