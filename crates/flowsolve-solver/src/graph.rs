//! Type-variable graph: a union-find arena of variables with bounds.
//!
//! Each variable is either a `Root` carrying its constraints or a `Goto`
//! pointing at another variable of the same equivalence class. Root lookup
//! follows the `Goto` chain and compresses it. Merging two classes is
//! union-by-rank.
//!
//! Bound bookkeeping lives here; the operations that propagate bounds by
//! flowing types (which need the dispatcher) live in `bounds.rs`.

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

use crate::diagnostics::InternalError;
use crate::types::{TyVarId, TypeId, UseOp, VarOrigin};

pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// A recorded bound: the type as given (possibly `Located`) plus the
/// provenance of the flow that introduced it. Keyed by the stripped id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundEntry {
    pub ty: TypeId,
    pub use_op: UseOp,
}

/// Producer and consumer knowledge about an unresolved class.
///
/// Kept transitively closed: a concrete bound reachable through
/// `lowertvars` / `uppertvars` is also present directly.
#[derive(Clone, Debug, Default)]
pub struct Bounds {
    pub lower: FxIndexMap<TypeId, BoundEntry>,
    pub upper: FxIndexMap<TypeId, BoundEntry>,
    pub lowertvars: FxIndexSet<TyVarId>,
    pub uppertvars: FxIndexSet<TyVarId>,
}

impl Bounds {
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
            && self.upper.is_empty()
            && self.lowertvars.is_empty()
            && self.uppertvars.is_empty()
    }
}

#[derive(Clone, Debug)]
pub enum Constraints {
    Unresolved(Bounds),
    Resolved { ty: TypeId, use_op: UseOp },
}

#[derive(Clone, Debug)]
pub struct VarRoot {
    pub rank: u32,
    pub constraints: Constraints,
}

impl VarRoot {
    pub fn bounds(&self) -> Option<&Bounds> {
        match &self.constraints {
            Constraints::Unresolved(bounds) => Some(bounds),
            Constraints::Resolved { .. } => None,
        }
    }

    pub fn resolved(&self) -> Option<TypeId> {
        match self.constraints {
            Constraints::Resolved { ty, .. } => Some(ty),
            Constraints::Unresolved(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum VarNode {
    Root(VarRoot),
    Goto(TyVarId),
}

/// Arena of all type variables in a session. Variables are never removed.
#[derive(Clone, Debug, Default)]
pub struct TypeVarGraph {
    nodes: Vec<VarNode>,
    origins: Vec<VarOrigin>,
}

impl TypeVarGraph {
    pub fn new() -> Self {
        Self::with_capacity(flowsolve_common::limits::INITIAL_VAR_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TypeVarGraph {
            nodes: Vec::with_capacity(capacity),
            origins: Vec::with_capacity(capacity),
        }
    }

    /// New unresolved root with empty bounds and rank 0.
    pub fn create(&mut self, origin: VarOrigin) -> TyVarId {
        let id = TyVarId(self.nodes.len() as u32);
        self.nodes.push(VarNode::Root(VarRoot {
            rank: 0,
            constraints: Constraints::Unresolved(Bounds::default()),
        }));
        self.origins.push(origin);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TyVarId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn origin(&self, id: TyVarId) -> Option<VarOrigin> {
        self.origins.get(id.index()).copied()
    }

    /// Follow the `Goto` chain to the class root, compressing the path.
    pub fn find_root(&mut self, id: TyVarId) -> Result<TyVarId, InternalError> {
        let root = self.find_root_readonly(id)?;
        let mut cur = id;
        while cur != root {
            let next = match self.nodes[cur.index()] {
                VarNode::Goto(next) => next,
                VarNode::Root(_) => break,
            };
            self.nodes[cur.index()] = VarNode::Goto(root);
            cur = next;
        }
        Ok(root)
    }

    /// Root lookup without path compression, for read-only callers.
    pub fn find_root_readonly(&self, id: TyVarId) -> Result<TyVarId, InternalError> {
        let mut cur = id;
        loop {
            match self.nodes.get(cur.index()) {
                Some(VarNode::Goto(next)) => cur = *next,
                Some(VarNode::Root(_)) => return Ok(cur),
                None => return Err(InternalError::MissingVariable(id)),
            }
        }
    }

    /// The root node of `root`, which must already be a root id.
    pub fn root(&self, root: TyVarId) -> Result<&VarRoot, InternalError> {
        match self.nodes.get(root.index()) {
            Some(VarNode::Root(r)) => Ok(r),
            _ => Err(InternalError::MissingVariable(root)),
        }
    }

    pub fn root_mut(&mut self, root: TyVarId) -> Result<&mut VarRoot, InternalError> {
        match self.nodes.get_mut(root.index()) {
            Some(VarNode::Root(r)) => Ok(r),
            _ => Err(InternalError::MissingVariable(root)),
        }
    }

    /// Root id and node of `id`'s class.
    pub fn find(&mut self, id: TyVarId) -> Result<(TyVarId, &VarRoot), InternalError> {
        let root = self.find_root(id)?;
        Ok((root, self.root(root)?))
    }

    /// Bounds of an unresolved root, `None` if it is resolved.
    pub fn bounds_mut(&mut self, root: TyVarId) -> Result<Option<&mut Bounds>, InternalError> {
        Ok(match &mut self.root_mut(root)?.constraints {
            Constraints::Unresolved(bounds) => Some(bounds),
            Constraints::Resolved { .. } => None,
        })
    }

    /// Resolved type of `id`'s class, if any.
    pub fn resolved_type(&self, id: TyVarId) -> Result<Option<TypeId>, InternalError> {
        let root = self.find_root_readonly(id)?;
        Ok(self.root(root)?.resolved())
    }

    /// Canonicalize a set of variable ids: map each to its root and drop
    /// resolved roots and `except`.
    pub fn unresolved_roots(
        &mut self,
        ids: impl IntoIterator<Item = TyVarId>,
        except: Option<TyVarId>,
    ) -> Result<FxIndexSet<TyVarId>, InternalError> {
        let mut out = FxIndexSet::default();
        for id in ids {
            let root = self.find_root(id)?;
            if Some(root) == except {
                continue;
            }
            if self.root(root)?.bounds().is_some() {
                out.insert(root);
            }
        }
        Ok(out)
    }

    /// Make `loser` point at `winner` and adjust the winner's rank.
    ///
    /// Returns the constraints the loser held. Both must be distinct roots.
    pub fn link_roots(
        &mut self,
        winner: TyVarId,
        loser: TyVarId,
    ) -> Result<Constraints, InternalError> {
        let loser_rank = self.root(loser)?.rank;
        let old = std::mem::replace(&mut self.nodes[loser.index()], VarNode::Goto(winner));
        let winner_root = self.root_mut(winner)?;
        if winner_root.rank == loser_rank {
            winner_root.rank += 1;
        }
        match old {
            VarNode::Root(root) => Ok(root.constraints),
            VarNode::Goto(_) => Err(InternalError::MissingVariable(loser)),
        }
    }

    /// Pick (winner, loser) between two distinct roots by rank.
    pub fn rank_order(
        &self,
        a: TyVarId,
        b: TyVarId,
    ) -> Result<(TyVarId, TyVarId), InternalError> {
        let rank_a = self.root(a)?.rank;
        let rank_b = self.root(b)?.rank;
        Ok(if rank_a < rank_b { (b, a) } else { (a, b) })
    }

    /// Every root id currently in the arena.
    pub fn roots(&self) -> impl Iterator<Item = TyVarId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(idx, node)| match node {
            VarNode::Root(_) => Some(TyVarId(idx as u32)),
            VarNode::Goto(_) => None,
        })
    }
}

#[cfg(test)]
#[path = "../tests/graph_tests.rs"]
mod tests;
