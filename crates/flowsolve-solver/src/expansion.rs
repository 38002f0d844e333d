//! Expansion guards.
//!
//! - **Type-application loop guard**: a stack of `(DefId, Vec<RootSet>)`
//!   entries for the applications currently being expanded. A new expansion
//!   whose definition matches an entry whose argument root sets are each a
//!   superset of the new ones is a loop (`T<X> = T<Array<X>>` keeps producing
//!   `Array` roots) and the application is widened to `any` instead.
//! - **Constant-fold guard**: counts folding evaluations per
//!   `(site, FoldReason)`. The first evaluation folds to a literal; repeats
//!   widen to the base primitive, so loops like `x = x + 1` terminate.

use flowsolve_common::interner::Atom;
use flowsolve_common::limits;
use flowsolve_common::span::Span;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::def::DefId;
use crate::diagnostics::InternalError;
use crate::graph::Constraints;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::solver::Solver;
use crate::types::{IntrinsicKind, TyVarId, TypeData, TypeId};

// =============================================================================
// Roots
// =============================================================================

/// The outermost constructor of a type, as seen by the loop guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRoot {
    Intrinsic(IntrinsicKind),
    Object,
    Array,
    Function,
    Application(DefId),
    Poly,
    Param(Atom),
    Internal(Atom),
    Use,
    /// An unresolved variable with no concrete lower bound yet.
    Var(TyVarId),
}

/// Sorted, deduplicated set of roots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootSet(SmallVec<[TypeRoot; 4]>);

impl RootSet {
    pub fn insert(&mut self, root: TypeRoot) {
        if let Err(pos) = self.0.binary_search(&root) {
            self.0.insert(pos, root);
        }
    }

    pub fn contains(&self, root: &TypeRoot) -> bool {
        self.0.binary_search(root).is_ok()
    }

    pub fn is_superset(&self, other: &RootSet) -> bool {
        other.0.iter().all(|r| self.contains(r))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TypeRoot> for RootSet {
    fn from_iter<I: IntoIterator<Item = TypeRoot>>(iter: I) -> Self {
        let mut set = RootSet::default();
        for root in iter {
            set.insert(root);
        }
        set
    }
}

// =============================================================================
// Type-application loop guard
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct TypeAppExpansion {
    stack: Vec<(DefId, Vec<RootSet>)>,
}

impl TypeAppExpansion {
    /// Whether expanding `def` with argument roots `roots` would loop.
    pub fn is_loop(&self, def: DefId, roots: &[RootSet]) -> bool {
        if self.stack.len() >= limits::MAX_EXPANSION_DEPTH as usize {
            return true;
        }
        self.stack.iter().any(|(entry_def, entry_roots)| {
            *entry_def == def
                && entry_roots.len() == roots.len()
                && entry_roots
                    .iter()
                    .zip(roots)
                    .all(|(old, new)| old.is_superset(new))
        })
    }

    pub fn push(&mut self, def: DefId, roots: Vec<RootSet>) {
        self.stack.push((def, roots));
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
    }
}

// =============================================================================
// Constant-fold guard
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FoldReason {
    Addition,
    Concatenation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldDecision {
    /// Produce the exact literal result.
    Fold,
    /// Produce the coarse base type.
    Widen,
}

/// Per-site fold counters. Increments are undo-logged only while a
/// speculative snapshot is open.
#[derive(Clone, Debug, Default)]
pub struct ConstFoldGuard {
    counts: FxHashMap<(Span, FoldReason), u32>,
    undo: Vec<(Span, FoldReason)>,
    open_snapshots: u32,
}

impl ConstFoldGuard {
    /// Count an evaluation at `site` and decide whether it may fold.
    pub fn check(&mut self, site: Span, reason: FoldReason, max_folds: u32) -> FoldDecision {
        let count = self.counts.entry((site, reason)).or_insert(0);
        *count += 1;
        let count = *count;
        if self.open_snapshots > 0 {
            self.undo.push((site, reason));
        }
        if count <= max_folds {
            FoldDecision::Fold
        } else {
            debug!(?site, ?reason, count, "constant folding widened");
            FoldDecision::Widen
        }
    }

    pub fn count(&self, site: Span, reason: FoldReason) -> u32 {
        self.counts.get(&(site, reason)).copied().unwrap_or(0)
    }

    /// Open a snapshot; must be closed by `rollback_to`.
    pub fn snapshot(&mut self) -> usize {
        self.open_snapshots += 1;
        self.undo.len()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn rollback_to(&mut self, len: usize) {
        while self.undo.len() > len {
            if let Some(key) = self.undo.pop()
                && let Some(count) = self.counts.get_mut(&key)
            {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.counts.remove(&key);
                }
            }
        }
        self.open_snapshots = self.open_snapshots.saturating_sub(1);
        if self.open_snapshots == 0 {
            self.undo.clear();
        }
    }
}

// =============================================================================
// Solver-side helpers
// =============================================================================

impl Solver<'_> {
    /// Roots of `ty` for the loop guard. Unresolved variables contribute the
    /// roots of their lower bounds, or themselves if they have none.
    pub(crate) fn root_set(&mut self, ty: TypeId) -> Result<RootSet, InternalError> {
        let mut set = RootSet::default();
        let mut depth = DepthCounter::with_profile(RecursionProfile::ShallowTraversal);
        self.collect_roots(ty, &mut set, &mut depth)?;
        Ok(set)
    }

    fn collect_roots(
        &mut self,
        ty: TypeId,
        set: &mut RootSet,
        depth: &mut DepthCounter,
    ) -> Result<(), InternalError> {
        if !depth.enter() {
            return Ok(());
        }
        let result = self.collect_roots_inner(ty, set, depth);
        depth.leave();
        result
    }

    fn collect_roots_inner(
        &mut self,
        ty: TypeId,
        set: &mut RootSet,
        depth: &mut DepthCounter,
    ) -> Result<(), InternalError> {
        let Some(data) = self.types.lookup_stripped(ty) else {
            return Err(InternalError::MalformedType(ty));
        };
        let root = match data {
            TypeData::Intrinsic(kind) => TypeRoot::Intrinsic(kind),
            TypeData::Literal(value) => TypeRoot::Intrinsic(value.base()),
            TypeData::Object(_) => TypeRoot::Object,
            TypeData::Array(_) => TypeRoot::Array,
            TypeData::Function(_) => TypeRoot::Function,
            TypeData::Application(app) => match self.types.type_application(app) {
                Some(app) => TypeRoot::Application(app.def),
                None => return Err(InternalError::MalformedType(ty)),
            },
            TypeData::Poly(_) => TypeRoot::Poly,
            TypeData::Param(name) => TypeRoot::Param(name),
            TypeData::Internal(name) => TypeRoot::Internal(name),
            TypeData::GetProp { .. } | TypeData::Call { .. } | TypeData::Add { .. } => {
                TypeRoot::Use
            }
            TypeData::Union(list) | TypeData::Intersection(list) => {
                for &member in self.types.type_list(list).iter() {
                    self.collect_roots(member, set, depth)?;
                }
                return Ok(());
            }
            TypeData::Var(id) => {
                let root = self.graph.find_root(id)?;
                let lowers: SmallVec<[TypeId; 4]> = match &self.graph.root(root)?.constraints {
                    Constraints::Resolved { ty, .. } => SmallVec::from_slice(&[*ty]),
                    Constraints::Unresolved(bounds) => {
                        bounds.lower.values().map(|entry| entry.ty).collect()
                    }
                };
                if lowers.is_empty() {
                    set.insert(TypeRoot::Var(root));
                }
                for lower in lowers {
                    self.collect_roots(lower, set, depth)?;
                }
                return Ok(());
            }
            TypeData::Located { .. } => return Err(InternalError::MalformedType(ty)),
        };
        set.insert(root);
        Ok(())
    }

    /// Count a constant-folding evaluation at `site`.
    pub fn const_fold(&mut self, site: Span, reason: FoldReason) -> FoldDecision {
        let max = self.options.const_fold_repeats;
        self.const_folds.check(site, reason, max)
    }
}

#[cfg(test)]
#[path = "../tests/expansion_tests.rs"]
mod tests;
