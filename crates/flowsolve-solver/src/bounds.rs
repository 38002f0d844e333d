//! Bound propagation on the type-variable graph.
//!
//! Bounds are kept transitively closed. For an unresolved root `T`:
//!
//! - every variable in `T.lowertvars` has all of `T.upper` among its own
//!   upper bounds and `T` (plus `T.uppertvars`) among its `uppertvars`;
//! - symmetrically for `T.uppertvars`.
//!
//! So adding a concrete bound only has to flow it against the opposite
//! bounds of `T` itself, and linking two classes only has to flow the cross
//! product of the lower side's lower bounds with the upper side's upper
//! bounds once.

use tracing::{Level, span, trace};

use crate::diagnostics::{FlowResult, InternalError};
use crate::graph::{BoundEntry, Constraints, FxIndexSet};
use crate::solver::Solver;
use crate::trace::Trace;
use crate::types::{TyVarId, TypeId, UseOp};

/// Which side of a variable a concrete bound lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

impl Solver<'_> {
    /// Record `lower` as flowing into `id` and propagate it.
    pub(crate) fn add_lower_bound_in(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        id: TyVarId,
        lower: TypeId,
    ) -> FlowResult {
        self.add_bound(trace, use_op, id, lower, Side::Lower)
    }

    /// Record `upper` as a consumer of `id` and propagate it.
    pub(crate) fn add_upper_bound_in(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        id: TyVarId,
        upper: TypeId,
    ) -> FlowResult {
        self.add_bound(trace, use_op, id, upper, Side::Upper)
    }

    fn add_bound(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        id: TyVarId,
        bound: TypeId,
        side: Side,
    ) -> FlowResult {
        let root = self.graph.find_root(id)?;
        let key = self.types.strip(bound);
        let entry = BoundEntry { ty: bound, use_op };

        if let Some(resolved) = self.graph.root(root)?.resolved() {
            return match side {
                Side::Lower => self.rec_flow(trace, use_op, bound, resolved),
                Side::Upper => self.rec_flow(trace, use_op, resolved, bound),
            };
        }

        let (linked, opposite) = {
            let bounds = self
                .graph
                .bounds_mut(root)?
                .ok_or(InternalError::MissingVariable(root))?;
            let (own, linked, opposite) = match side {
                Side::Lower => (&mut bounds.lower, &bounds.uppertvars, &bounds.upper),
                Side::Upper => (&mut bounds.upper, &bounds.lowertvars, &bounds.lower),
            };
            if own.contains_key(&key) {
                return Ok(());
            }
            own.insert(key, entry);
            let linked: Vec<TyVarId> = linked.iter().copied().collect();
            let opposite: Vec<BoundEntry> = opposite.values().copied().collect();
            (linked, opposite)
        };
        trace!(var = root.0, bound = key.0, ?side, "bound added");

        for var in linked {
            let var_root = self.graph.find_root(var)?;
            if let Some(bounds) = self.graph.bounds_mut(var_root)? {
                let own = match side {
                    Side::Lower => &mut bounds.lower,
                    Side::Upper => &mut bounds.upper,
                };
                own.entry(key).or_insert(entry);
            }
        }

        for other in opposite {
            match side {
                Side::Lower => self.rec_flow(trace.step(), use_op, bound, other.ty)?,
                Side::Upper => self.rec_flow(trace.step(), other.use_op, other.ty, bound)?,
            }
        }
        Ok(())
    }

    /// `lower_id` flows into `upper_id`: connect the two classes.
    pub(crate) fn link_vars(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        lower_id: TyVarId,
        upper_id: TyVarId,
    ) -> FlowResult {
        let rl = self.graph.find_root(lower_id)?;
        let ru = self.graph.find_root(upper_id)?;
        if rl == ru {
            return Ok(());
        }
        let resolved_lower = self.graph.root(rl)?.resolved();
        let resolved_upper = self.graph.root(ru)?.resolved();
        match (resolved_lower, resolved_upper) {
            (Some(lower), _) => {
                let upper = self.types.var(ru);
                return self.rec_flow(trace, use_op, lower, upper);
            }
            (None, Some(upper)) => {
                let lower = self.types.var(rl);
                return self.rec_flow(trace, use_op, lower, upper);
            }
            (None, None) => {}
        }

        let (lowers, lower_bounds) = {
            let bounds = self.graph.root(rl)?.bounds().ok_or(InternalError::MissingVariable(rl))?;
            let lowertvars: Vec<TyVarId> = bounds.lowertvars.iter().copied().collect();
            let lower: Vec<(TypeId, BoundEntry)> =
                bounds.lower.iter().map(|(k, v)| (*k, *v)).collect();
            (lowertvars, lower)
        };
        let (uppers, upper_bounds) = {
            let bounds = self.graph.root(ru)?.bounds().ok_or(InternalError::MissingVariable(ru))?;
            if bounds.lowertvars.contains(&rl) {
                return Ok(());
            }
            let uppertvars: Vec<TyVarId> = bounds.uppertvars.iter().copied().collect();
            let upper: Vec<(TypeId, BoundEntry)> =
                bounds.upper.iter().map(|(k, v)| (*k, *v)).collect();
            (uppertvars, upper)
        };

        let _span = span!(Level::TRACE, "link_vars", lower = rl.0, upper = ru.0).entered();

        let lowers = self
            .graph
            .unresolved_roots(std::iter::once(rl).chain(lowers), None)?;
        let uppers = self
            .graph
            .unresolved_roots(std::iter::once(ru).chain(uppers), None)?;

        for &x in &lowers {
            if let Some(bounds) = self.graph.bounds_mut(x)? {
                bounds.uppertvars.extend(uppers.iter().copied().filter(|&y| y != x));
                for &(key, entry) in &upper_bounds {
                    bounds.upper.entry(key).or_insert(entry);
                }
            }
        }
        for &y in &uppers {
            if let Some(bounds) = self.graph.bounds_mut(y)? {
                bounds.lowertvars.extend(lowers.iter().copied().filter(|&x| x != y));
                for &(key, entry) in &lower_bounds {
                    bounds.lower.entry(key).or_insert(entry);
                }
            }
        }

        for &(_, lower) in &lower_bounds {
            for &(_, upper) in &upper_bounds {
                self.rec_flow(trace.step(), use_op, lower.ty, upper.ty)?;
            }
        }
        Ok(())
    }

    /// Unify two variables into one class.
    pub(crate) fn merge_vars(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        a: TyVarId,
        b: TyVarId,
    ) -> FlowResult {
        let ra = self.graph.find_root(a)?;
        let rb = self.graph.find_root(b)?;
        if ra == rb {
            return Ok(());
        }
        match (self.graph.root(ra)?.resolved(), self.graph.root(rb)?.resolved()) {
            (Some(ta), Some(tb)) => return self.rec_unify(trace.step(), use_op, ta, tb),
            (Some(ta), None) => return self.resolve_root(trace, use_op, rb, ta),
            (None, Some(tb)) => return self.resolve_root(trace, use_op, ra, tb),
            (None, None) => {}
        }

        let _span = span!(Level::TRACE, "merge_vars", a = ra.0, b = rb.0).entered();
        self.link_vars(trace, use_op, ra, rb)?;
        self.link_vars(trace, use_op, rb, ra)?;

        // Linking may have resolved either side through a nested unification.
        let ra = self.graph.find_root(ra)?;
        let rb = self.graph.find_root(rb)?;
        if ra == rb {
            return Ok(());
        }
        if self.graph.root(ra)?.resolved().is_some() || self.graph.root(rb)?.resolved().is_some() {
            return self.merge_vars(trace, use_op, ra, rb);
        }

        let (winner, loser) = self.graph.rank_order(ra, rb)?;
        let old = self.graph.link_roots(winner, loser)?;
        trace!(winner = winner.0, loser = loser.0, "classes merged");
        if let Constraints::Unresolved(loser_bounds) = old {
            let lowertvars = self.graph.unresolved_roots(loser_bounds.lowertvars, Some(winner))?;
            let uppertvars = self.graph.unresolved_roots(loser_bounds.uppertvars, Some(winner))?;
            let bounds = self
                .graph
                .bounds_mut(winner)?
                .ok_or(InternalError::MissingVariable(winner))?;
            for (key, entry) in loser_bounds.lower {
                bounds.lower.entry(key).or_insert(entry);
            }
            for (key, entry) in loser_bounds.upper {
                bounds.upper.entry(key).or_insert(entry);
            }
            bounds.lowertvars.extend(lowertvars);
            bounds.uppertvars.extend(uppertvars);
            for id in [loser, winner] {
                bounds.lowertvars.swap_remove(&id);
                bounds.uppertvars.swap_remove(&id);
            }
        }
        self.transfer_watchers(loser, winner);
        Ok(())
    }

    /// Resolve the class of `id` to `ty`.
    pub(crate) fn resolve_var(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        id: TyVarId,
        ty: TypeId,
    ) -> FlowResult {
        if let Some(other) = self.types.as_var(ty) {
            return self.merge_vars(trace, use_op, id, other);
        }
        let root = self.graph.find_root(id)?;
        self.resolve_root(trace, use_op, root, ty)
    }

    /// Resolve the root `root` to the non-variable type `ty`.
    pub(crate) fn resolve_root(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        root: TyVarId,
        ty: TypeId,
    ) -> FlowResult {
        let node = self.graph.root_mut(root)?;
        if let Constraints::Resolved { ty: existing, .. } = node.constraints {
            return self.rec_unify(trace.step(), use_op, existing, ty);
        }
        let bounds = match std::mem::replace(&mut node.constraints, Constraints::Resolved { ty, use_op }) {
            Constraints::Unresolved(bounds) => bounds,
            Constraints::Resolved { .. } => return Err(InternalError::MissingVariable(root).into()),
        };
        let _span = span!(Level::TRACE, "resolve_root", var = root.0, ty = ty.0).entered();

        for entry in bounds.upper.values() {
            self.rec_flow(trace.step(), entry.use_op, ty, entry.ty)?;
        }
        for entry in bounds.lower.values() {
            self.rec_flow(trace.step(), entry.use_op, entry.ty, ty)?;
        }
        for var in without_root(&bounds.uppertvars, root) {
            let var_ty = self.types.var(var);
            self.rec_flow(trace.step(), use_op, ty, var_ty)?;
        }
        for var in without_root(&bounds.lowertvars, root) {
            let var_ty = self.types.var(var);
            self.rec_flow(trace.step(), use_op, var_ty, ty)?;
        }
        self.notify_resolved(root);
        Ok(())
    }

    /// Concrete lower bounds of `id`'s class, or the resolved type.
    pub fn lower_bounds(&self, id: TyVarId) -> Result<Vec<TypeId>, InternalError> {
        let root = self.graph.find_root_readonly(id)?;
        Ok(match &self.graph.root(root)?.constraints {
            Constraints::Resolved { ty, .. } => vec![*ty],
            Constraints::Unresolved(bounds) => bounds.lower.values().map(|e| e.ty).collect(),
        })
    }

    /// Concrete upper bounds of `id`'s class, or the resolved type.
    pub fn upper_bounds(&self, id: TyVarId) -> Result<Vec<TypeId>, InternalError> {
        let root = self.graph.find_root_readonly(id)?;
        Ok(match &self.graph.root(root)?.constraints {
            Constraints::Resolved { ty, .. } => vec![*ty],
            Constraints::Unresolved(bounds) => bounds.upper.values().map(|e| e.ty).collect(),
        })
    }
}

fn without_root(vars: &FxIndexSet<TyVarId>, root: TyVarId) -> Vec<TyVarId> {
    vars.iter().copied().filter(|&v| v != root).collect()
}

#[cfg(test)]
#[path = "../tests/bounds_tests.rs"]
mod tests;
