//! Full type resolution.
//!
//! `fully_resolve(ty, continuation)` registers a goal: once every variable
//! reachable from `ty` has resolved (transitively, through the types they
//! resolved to), the continuation runs with `ty` concretized.
//!
//! ## Protocol
//!
//! 1. The goal walks `ty` without descending into `Poly` binders. Unresolved
//!    roots become pending jobs with a watcher edge root -> goal; resolved
//!    roots are walked once per goal; existential placeholders are resolved
//!    to `any` on the spot so they never stall a goal.
//! 2. Resolving a root enqueues a `Resolved` event. Draining that event
//!    re-walks the newly concrete type for every watching goal, which may add
//!    more pending jobs.
//! 3. A goal with no pending jobs enqueues `Ready`; draining it concretizes
//!    the type, records its roots as finished, and runs the continuation.
//!
//! Events are drained only at the outermost public entry and never while
//! speculating, so continuations never re-enter each other.
//!
//! ## Speculation
//!
//! A goal registered inside a trial (a rule calling `fully_resolve`) belongs
//! to that trial. Rolling the trial back takes such goals out of the engine
//! together with their watchers and queued events; the choice engine
//! registers them again only if their case is chosen. An existential
//! placeholder that predates the trial is not resolved on the spot but goes
//! through the dispatcher, which defers it like any other action on a
//! pre-existing variable.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::{Level, debug, span, trace};

use crate::caches::query_trace;
use crate::diagnostics::{FlowError, FlowResult, InternalError};
use crate::graph::TypeVarGraph;
use crate::intern::TypeInterner;
use crate::recursion::{RecursionGuard, RecursionProfile, RecursionResult};
use crate::solver::Solver;
use crate::trace::Trace;
use crate::types::{TyVarId, TypeData, TypeFlags, TypeId, UseOp, VarKind};
use crate::visitor::{TypeFolder, children, super_fold};

/// Handle of a resolution goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GoalId(pub u32);

impl GoalId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Runs once a goal's type is fully resolved.
pub type Continuation<'r> = Box<dyn FnOnce(&mut Solver<'r>, TypeId) -> FlowResult + 'r>;

pub(crate) struct Goal<'r> {
    ty: TypeId,
    pending: FxHashSet<TyVarId>,
    walked: FxHashSet<TyVarId>,
    continuation: Option<Continuation<'r>>,
    result: Option<TypeId>,
    ready_queued: bool,
    query_id: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResolutionEvent {
    Resolved(TyVarId),
    Ready(GoalId),
}

/// A goal taken out of the engine by a rolled-back trial.
pub(crate) struct StashedGoal<'r> {
    ty: TypeId,
    continuation: Option<Continuation<'r>>,
}

/// Engine sizes before a speculative trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ResolutionMark {
    goals: usize,
    queue: usize,
}

#[derive(Default)]
pub struct ResolutionEngine<'r> {
    goals: Vec<Goal<'r>>,
    watchers: FxHashMap<TyVarId, SmallVec<[GoalId; 2]>>,
    finished_vars: FxHashSet<TyVarId>,
    queue: VecDeque<ResolutionEvent>,
    draining: bool,
}

impl<'r> ResolutionEngine<'r> {
    fn goal_mut(&mut self, id: GoalId) -> Result<&mut Goal<'r>, InternalError> {
        self.goals.get_mut(id.index()).ok_or(InternalError::MissingGoal(id))
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }

    pub fn is_finished_var(&self, root: TyVarId) -> bool {
        self.finished_vars.contains(&root)
    }

    /// Roots still blocking some unfinished goal.
    pub fn pending_roots(&self) -> Vec<TyVarId> {
        let mut out: Vec<TyVarId> = self
            .goals
            .iter()
            .filter(|g| g.result.is_none())
            .flat_map(|g| g.pending.iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub(crate) fn mark(&self) -> ResolutionMark {
        ResolutionMark {
            goals: self.goals.len(),
            queue: self.queue.len(),
        }
    }

    /// Remove everything registered since `mark`. Events are not drained
    /// while speculating, so the queue only grew at its back.
    pub(crate) fn rollback_to(&mut self, mark: ResolutionMark) -> Vec<StashedGoal<'r>> {
        if self.goals.len() <= mark.goals && self.queue.len() <= mark.queue {
            return Vec::new();
        }
        self.queue.truncate(mark.queue);
        self.watchers.retain(|_, goals| {
            goals.retain(|goal| goal.index() < mark.goals);
            !goals.is_empty()
        });
        let stashed: Vec<StashedGoal<'r>> = self
            .goals
            .drain(mark.goals..)
            .map(|goal| StashedGoal {
                ty: goal.ty,
                continuation: goal.continuation,
            })
            .collect();
        if !stashed.is_empty() {
            trace!(goals = stashed.len(), "trial goals withdrawn");
        }
        stashed
    }

    fn watch(&mut self, root: TyVarId, goal: GoalId) {
        let watchers = self.watchers.entry(root).or_default();
        if !watchers.contains(&goal) {
            watchers.push(goal);
        }
    }
}

/// Substitutes resolved variables; cycles through a variable become `any`.
struct Concretizer<'a> {
    types: &'a mut TypeInterner,
    graph: &'a TypeVarGraph,
    guard: RecursionGuard<TyVarId>,
}

impl TypeFolder for Concretizer<'_> {
    fn interner(&mut self) -> &mut TypeInterner {
        self.types
    }

    fn fold_type(&mut self, ty: TypeId) -> TypeId {
        if !self.types.flags(ty).contains(TypeFlags::HAS_VARS) {
            return ty;
        }
        match self.types.lookup(ty) {
            Some(TypeData::Poly(_)) => ty,
            Some(TypeData::Var(id)) => {
                let Ok(root) = self.graph.find_root_readonly(id) else {
                    return ty;
                };
                let Ok(Some(resolved)) = self.graph.resolved_type(root) else {
                    return ty;
                };
                match self.guard.enter(root) {
                    RecursionResult::Entered => {
                        let result = self.fold_type(resolved);
                        self.guard.leave(root);
                        result
                    }
                    RecursionResult::Cycle
                    | RecursionResult::DepthExceeded
                    | RecursionResult::IterationExceeded => TypeId::ANY,
                }
            }
            _ => super_fold(self, ty),
        }
    }
}

impl<'r> Solver<'r> {
    /// Register a goal for `ty`; `continuation` runs with the concretized
    /// type once every variable it depends on has resolved.
    pub fn fully_resolve(
        &mut self,
        ty: TypeId,
        continuation: impl FnOnce(&mut Solver<'r>, TypeId) -> FlowResult + 'r,
    ) -> Result<GoalId, InternalError> {
        self.run_entry(|solver| solver.register_goal(ty, Some(Box::new(continuation))))
    }

    pub(crate) fn register_goal(
        &mut self,
        ty: TypeId,
        continuation: Option<Continuation<'r>>,
    ) -> Result<GoalId, FlowError> {
        let id = GoalId(self.resolution.goals.len() as u32);
        let query_id = query_trace::enabled().then(query_trace::next_query_id);
        self.resolution.goals.push(Goal {
            ty,
            pending: FxHashSet::default(),
            walked: FxHashSet::default(),
            continuation,
            result: None,
            ready_queued: false,
            query_id,
        });
        let _span = span!(Level::TRACE, "fully_resolve", goal = id.0, ty = ty.0).entered();
        self.walk_goal(id, ty)?;
        let goal = self.resolution.goal_mut(id)?;
        if let Some(query_id) = goal.query_id {
            query_trace::resolution_start(query_id, ty, goal.pending.len());
        }
        self.queue_if_ready(id)?;
        Ok(id)
    }

    /// Collect the jobs of `ty` into `goal`.
    fn walk_goal(&mut self, goal: GoalId, ty: TypeId) -> Result<(), FlowError> {
        let mut stack = vec![ty];
        while let Some(current) = stack.pop() {
            if !self.types.flags(current).contains(TypeFlags::HAS_VARS) {
                continue;
            }
            let data = self
                .types
                .lookup(current)
                .ok_or(InternalError::MalformedType(current))?;
            let id = match data {
                TypeData::Poly(_) => continue,
                TypeData::Var(id) => id,
                other => {
                    stack.extend(children(&self.types, other));
                    continue;
                }
            };

            let root = self.graph.find_root(id)?;
            if self.resolution.is_finished_var(root) {
                continue;
            }
            if let Some(resolved) = self.graph.root(root)?.resolved() {
                if self.resolution.goal_mut(goal)?.walked.insert(root) {
                    stack.push(resolved);
                }
                continue;
            }
            let existential = self
                .graph
                .origin(root)
                .is_some_and(|origin| origin.kind == VarKind::Existential);
            if existential {
                trace!(var = root.0, "existential placeholder resolved to any");
                if self.speculation.is_speculating() {
                    self.rec_unify(Trace::root(), UseOp::Internal, current, TypeId::ANY)?;
                    if self.graph.root(root)?.resolved().is_some() {
                        stack.push(current);
                    } else {
                        // Deferred on the open case.
                        self.resolution.goal_mut(goal)?.pending.insert(root);
                        self.resolution.watch(root, goal);
                    }
                } else {
                    self.resolve_root(Trace::root(), UseOp::Internal, root, TypeId::ANY)?;
                    stack.push(current);
                }
                continue;
            }
            self.resolution.goal_mut(goal)?.pending.insert(root);
            self.resolution.watch(root, goal);
        }
        Ok(())
    }

    /// Register again the goals of a chosen trial.
    pub(crate) fn restore_goals(&mut self, stashed: Vec<StashedGoal<'r>>) -> FlowResult {
        for goal in stashed {
            self.register_goal(goal.ty, goal.continuation)?;
        }
        Ok(())
    }

    fn queue_if_ready(&mut self, id: GoalId) -> Result<(), InternalError> {
        let goal = self.resolution.goal_mut(id)?;
        if goal.pending.is_empty() && goal.result.is_none() && !goal.ready_queued {
            goal.ready_queued = true;
            self.resolution.queue.push_back(ResolutionEvent::Ready(id));
        }
        Ok(())
    }

    /// One-shot trigger fired when `root` resolves.
    pub(crate) fn notify_resolved(&mut self, root: TyVarId) {
        if self.resolution.watchers.contains_key(&root) {
            self.resolution
                .queue
                .push_back(ResolutionEvent::Resolved(root));
        }
    }

    /// Move the watchers of a merged-away root to the surviving root.
    pub(crate) fn transfer_watchers(&mut self, loser: TyVarId, winner: TyVarId) {
        let Some(goals) = self.resolution.watchers.remove(&loser) else {
            return;
        };
        for goal in goals {
            if let Some(g) = self.resolution.goals.get_mut(goal.index())
                && g.pending.remove(&loser)
            {
                g.pending.insert(winner);
            }
            self.resolution.watch(winner, goal);
        }
    }

    /// Process queued resolution events until the queue is empty.
    pub(crate) fn drain_resolution_queue(&mut self) -> Result<(), InternalError> {
        if self.resolution.draining || self.speculation.is_speculating() {
            return Ok(());
        }
        self.resolution.draining = true;
        let result = self.drain_events();
        self.resolution.draining = false;
        result
    }

    fn drain_events(&mut self) -> Result<(), InternalError> {
        while let Some(event) = self.resolution.queue.pop_front() {
            match event {
                ResolutionEvent::Resolved(root) => {
                    let goals = self.resolution.watchers.remove(&root).unwrap_or_default();
                    for goal in goals {
                        self.advance_goal(goal, root).map_err(FlowError::into_internal)?;
                    }
                }
                ResolutionEvent::Ready(goal) => self.finish_goal(goal)?,
            }
        }
        Ok(())
    }

    /// `root` has resolved: continue `goal`'s walk through its type.
    fn advance_goal(&mut self, goal: GoalId, root: TyVarId) -> Result<(), FlowError> {
        let entry = self.resolution.goal_mut(goal)?;
        if entry.result.is_some() || !entry.pending.remove(&root) {
            return Ok(());
        }
        let var_ty = self.types.var(root);
        self.walk_goal(goal, var_ty)?;
        self.queue_if_ready(goal)?;
        Ok(())
    }

    fn finish_goal(&mut self, id: GoalId) -> Result<(), InternalError> {
        let (ty, walked) = {
            let goal = self.resolution.goal_mut(id)?;
            if goal.result.is_some() || !goal.pending.is_empty() {
                goal.ready_queued = false;
                return Ok(());
            }
            (goal.ty, std::mem::take(&mut goal.walked))
        };
        let result = self.concretize(ty);
        let continuation = {
            let goal = self.resolution.goal_mut(id)?;
            goal.result = Some(result);
            if let Some(query_id) = goal.query_id {
                query_trace::resolution_end(query_id, result);
            }
            goal.continuation.take()
        };
        self.resolution.finished_vars.extend(walked);
        debug!(goal = id.0, result = result.0, "goal finished");
        if let Some(continuation) = continuation {
            continuation(self, result).map_err(FlowError::into_internal)?;
        }
        Ok(())
    }

    /// `ty` with every resolved variable replaced by its resolved type.
    pub(crate) fn concretize(&mut self, ty: TypeId) -> TypeId {
        let mut folder = Concretizer {
            types: &mut self.types,
            graph: &self.graph,
            guard: RecursionGuard::new(
                self.options.max_resolution_depth,
                RecursionProfile::Resolution.max_iterations(),
            ),
        };
        folder.fold_type(ty)
    }

    /// Resolve every variable still blocking a goal to the union of its
    /// concrete lower bounds (or `empty`), until no goal is blocked.
    pub fn force_pending_resolution(&mut self) -> Result<(), InternalError> {
        self.run_entry(|solver| {
            loop {
                let mut forced = false;
                for root in solver.resolution.pending_roots() {
                    let root = solver.graph.find_root(root)?;
                    let Some(bounds) = solver.graph.root(root)?.bounds() else {
                        continue;
                    };
                    let lowers: Vec<TypeId> = bounds.lower.values().map(|e| e.ty).collect();
                    let forced_ty = solver.types.union(lowers);
                    debug!(var = root.0, ty = forced_ty.0, "forcing pending variable");
                    solver.resolve_root(Trace::root(), UseOp::Internal, root, forced_ty)?;
                    forced = true;
                }
                solver.drain_resolution_queue()?;
                if !forced {
                    return Ok(());
                }
            }
        })
    }

    /// The concretized type of a finished goal.
    pub fn goal_result(&self, goal: GoalId) -> Option<TypeId> {
        self.resolution.goals.get(goal.index()).and_then(|g| g.result)
    }

    pub fn is_goal_finished(&self, goal: GoalId) -> bool {
        self.goal_result(goal).is_some()
    }
}

#[cfg(test)]
#[path = "../tests/resolution_tests.rs"]
mod tests;
