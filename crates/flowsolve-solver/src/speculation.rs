//! Speculative matching for unions and intersections.
//!
//! A choice point tries its alternatives in order. Each trial runs inside a
//! `Case`: while a case is open, any flow or unification that touches a
//! variable created before the case (at the top level of the pair) is not
//! performed but recorded as a deferred action. A trial therefore cannot
//! commit knowledge about pre-existing variables.
//!
//! Per trial the outcome is one of:
//!
//! - failure (the first reported error aborts the trial),
//! - unconditional success (no deferred actions, no touched variables),
//! - conditional success (deferred actions pending).
//!
//! An unconditional success ends the choice immediately. Of two
//! conditional successes the earlier survives if the later's actions are a
//! superset of it; otherwise the choice is ambiguous, the touched variables
//! are unified with `any`, and `SpeculationAmbiguous` is reported. A lone
//! surviving conditional match fires its actions in emission order.
//!
//! Session state a trial may disturb (pair and instantiation caches,
//! constant-fold counters, the type-application stack, the op-context stack
//! and resolution goals) is snapshotted before each trial and rolled back
//! afterwards. Goals the chosen case registered are registered again after
//! its actions fire.

use serde::Serialize;
use std::sync::Arc;
use tracing::{Level, debug, span, trace};

use crate::caches::CacheSnapshot;
use crate::diagnostics::{BranchFailure, ErrorMessage, FlowError, FlowResult, InternalError};
use crate::graph::FxIndexSet;
use crate::resolution::{ResolutionMark, StashedGoal};
use crate::solver::Solver;
use crate::trace::Trace;
use crate::types::{TyVarId, TypeId, UseOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ChoiceKind {
    /// The consumer is a union; the producer must fit one member.
    Union,
    /// The producer is an intersection; one member must fit the consumer.
    Intersection,
}

/// A flow or unification postponed until its case is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeculationAction {
    Flow {
        lower: TypeId,
        upper: TypeId,
        use_op: UseOp,
    },
    Unify {
        left: TypeId,
        right: TypeId,
        use_op: UseOp,
    },
}

/// Identity of an action for subsumption checks: location-free ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ActionKey {
    Flow(TypeId, TypeId),
    Unify(TypeId, TypeId),
}

/// One trial of one alternative.
#[derive(Clone, Debug)]
pub struct Case {
    pub index: usize,
    /// Variables with an id below this existed before the trial started.
    pub var_watermark: u32,
    pub actions: Vec<SpeculationAction>,
    pub touched: FxIndexSet<TyVarId>,
}

impl Case {
    pub fn new(index: usize, var_watermark: u32) -> Self {
        Case {
            index,
            var_watermark,
            actions: Vec::new(),
            touched: FxIndexSet::default(),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.actions.is_empty() && self.touched.is_empty()
    }
}

/// Stack of open cases; non-empty exactly while speculating.
#[derive(Debug, Default)]
pub struct SpeculationState {
    cases: Vec<Case>,
}

impl SpeculationState {
    #[inline]
    pub fn is_speculating(&self) -> bool {
        !self.cases.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.cases.len()
    }

    pub fn push(&mut self, case: Case) {
        self.cases.push(case);
    }

    pub fn pop(&mut self) -> Option<Case> {
        self.cases.pop()
    }

    pub fn current(&self) -> Option<&Case> {
        self.cases.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Case> {
        self.cases.last_mut()
    }
}

/// Everything a trial may disturb, captured before it runs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SessionSnapshot {
    caches: CacheSnapshot,
    const_folds: usize,
    expansion_depth: usize,
    op_depth: usize,
    resolution: ResolutionMark,
}

enum TrialOutcome<'r> {
    Failed(ErrorMessage),
    Matched(Case, Vec<StashedGoal<'r>>),
}

impl<'r> Solver<'r> {
    pub(crate) fn snapshot(&mut self) -> SessionSnapshot {
        SessionSnapshot {
            caches: self.caches.snapshot(),
            const_folds: self.const_folds.snapshot(),
            expansion_depth: self.expansion.len(),
            op_depth: self.op_stack.len(),
            resolution: self.resolution.mark(),
        }
    }

    /// Restore `snapshot`; returns the goals registered since it was taken.
    pub(crate) fn rollback(&mut self, snapshot: SessionSnapshot) -> Vec<StashedGoal<'r>> {
        self.caches.rollback_to(snapshot.caches);
        self.const_folds.rollback_to(snapshot.const_folds);
        self.expansion.truncate(snapshot.expansion_depth);
        self.op_stack.truncate(snapshot.op_depth);
        self.resolution.rollback_to(snapshot.resolution)
    }

    /// If speculating and `var` is an unresolved variable that predates the
    /// current case, returns its root. The caller must defer.
    fn pre_existing_root(&mut self, var: Option<TyVarId>) -> Result<Option<TyVarId>, InternalError> {
        let Some(var) = var else {
            return Ok(None);
        };
        let Some(watermark) = self.speculation.current().map(|case| case.var_watermark) else {
            return Ok(None);
        };
        let root = self.graph.find_root(var)?;
        if root.0 >= watermark || self.graph.root(root)?.resolved().is_some() {
            return Ok(None);
        }
        Ok(Some(root))
    }

    /// Record `action` on the current case if it touches a pre-existing
    /// unresolved variable. Returns whether it was deferred.
    pub(crate) fn defer_if_pre_existing(
        &mut self,
        action: SpeculationAction,
        left: Option<TyVarId>,
        right: Option<TyVarId>,
    ) -> Result<bool, InternalError> {
        let left = self.pre_existing_root(left)?;
        let right = self.pre_existing_root(right)?;
        if left.is_none() && right.is_none() {
            return Ok(false);
        }
        let case = self
            .speculation
            .current_mut()
            .ok_or(InternalError::CaseStackUnderflow)?;
        trace!(case = case.index, ?action, "deferred action");
        case.actions.push(action);
        case.touched.extend(left);
        case.touched.extend(right);
        Ok(true)
    }

    pub(crate) fn action_key(&self, action: SpeculationAction) -> ActionKey {
        match action {
            SpeculationAction::Flow { lower, upper, .. } => {
                ActionKey::Flow(self.types.strip(lower), self.types.strip(upper))
            }
            SpeculationAction::Unify { left, right, .. } => {
                ActionKey::Unify(self.types.strip(left), self.types.strip(right))
            }
        }
    }

    /// Whether every action of `earlier` also appears in `later`.
    fn subsumes(&self, later: &Case, earlier: &Case) -> bool {
        let later_keys: FxIndexSet<ActionKey> =
            later.actions.iter().map(|&a| self.action_key(a)).collect();
        earlier
            .actions
            .iter()
            .all(|&a| later_keys.contains(&self.action_key(a)))
    }

    /// Choose among `alternatives` for the pair (`lower`, `upper`).
    pub(crate) fn speculative_matches(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        kind: ChoiceKind,
        lower: TypeId,
        upper: TypeId,
        alternatives: Arc<[TypeId]>,
    ) -> FlowResult {
        let _span = span!(
            Level::TRACE,
            "speculative_matches",
            ?kind,
            lower = lower.0,
            upper = upper.0,
            alternatives = alternatives.len()
        )
        .entered();

        let skipped = if kind == ChoiceKind::Union && self.options.sentinel_checks {
            self.sentinel_skips(lower, upper, &alternatives)?
        } else {
            None
        };

        let mut failures = Vec::new();
        let mut conditional: Option<(Case, Vec<StashedGoal<'r>>)> = None;

        for (index, &alternative) in alternatives.iter().enumerate() {
            if skipped.as_ref().is_some_and(|mask| mask.get(index).copied().unwrap_or(false)) {
                self.caches.stats.sentinel_skips += 1;
                failures.push(BranchFailure {
                    index,
                    error: ErrorMessage::Incompatible {
                        lower,
                        upper: alternative,
                        use_op,
                    },
                });
                continue;
            }

            match self.try_alternative(trace, use_op, kind, index, lower, upper, alternative)? {
                TrialOutcome::Failed(error) => {
                    trace!(index, "alternative failed");
                    failures.push(BranchFailure { index, error });
                }
                TrialOutcome::Matched(case, goals) if case.is_unconditional() => {
                    trace!(index, "alternative matched unconditionally");
                    return self.commit_case(trace, case, goals);
                }
                TrialOutcome::Matched(case, goals) => match conditional.take() {
                    None => conditional = Some((case, goals)),
                    Some((earlier, earlier_goals)) => {
                        if self.subsumes(&case, &earlier) {
                            conditional = Some((earlier, earlier_goals));
                        } else {
                            return self.report_ambiguity(trace, kind, lower, upper, earlier, case);
                        }
                    }
                },
            }
        }

        match conditional {
            Some((case, goals)) => {
                trace!(index = case.index, "conditional match chosen");
                self.commit_case(trace, case, goals)
            }
            None => self.add_output(ErrorMessage::NoMatchingAlternative {
                lower,
                upper,
                kind,
                branches: failures,
            }),
        }
    }

    fn try_alternative(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        kind: ChoiceKind,
        index: usize,
        lower: TypeId,
        upper: TypeId,
        alternative: TypeId,
    ) -> Result<TrialOutcome<'r>, InternalError> {
        let snapshot = self.snapshot();
        self.speculation
            .push(Case::new(index, self.graph.len() as u32));
        let result = match kind {
            ChoiceKind::Union => self.rec_flow(trace.step(), use_op, lower, alternative),
            ChoiceKind::Intersection => self.rec_flow(trace.step(), use_op, alternative, upper),
        };
        let case = self.speculation.pop().ok_or(InternalError::CaseStackUnderflow)?;
        let goals = self.rollback(snapshot);
        match result {
            Ok(()) => Ok(TrialOutcome::Matched(case, goals)),
            Err(FlowError::Speculative(error)) => Ok(TrialOutcome::Failed(*error)),
            Err(FlowError::Internal(err)) => Err(err),
        }
    }

    /// Perform the deferred actions of the chosen case, in order, then
    /// register its goals again.
    fn commit_case(&mut self, trace: Trace, case: Case, goals: Vec<StashedGoal<'r>>) -> FlowResult {
        self.fire_actions(trace, case)?;
        self.restore_goals(goals)
    }

    fn fire_actions(&mut self, trace: Trace, case: Case) -> FlowResult {
        for action in case.actions {
            match action {
                SpeculationAction::Flow {
                    lower,
                    upper,
                    use_op,
                } => self.rec_flow(trace.step(), use_op, lower, upper)?,
                SpeculationAction::Unify {
                    left,
                    right,
                    use_op,
                } => self.rec_unify(trace.step(), use_op, left, right)?,
            }
        }
        Ok(())
    }

    fn report_ambiguity(
        &mut self,
        trace: Trace,
        kind: ChoiceKind,
        lower: TypeId,
        upper: TypeId,
        first: Case,
        second: Case,
    ) -> FlowResult {
        let touched = first.touched.iter().chain(second.touched.iter()).copied();
        let vars = self.graph.unresolved_roots(touched, None)?;
        debug!(
            first = first.index,
            second = second.index,
            vars = vars.len(),
            "speculation ambiguous"
        );
        for &var in &vars {
            let var_ty = self.types.var(var);
            self.rec_unify(trace.step(), UseOp::Internal, var_ty, TypeId::ANY)?;
        }
        self.add_output(ErrorMessage::SpeculationAmbiguous {
            lower,
            upper,
            kind,
            first: first.index,
            second: second.index,
            vars: vars.into_iter().collect(),
        })
    }
}

#[cfg(test)]
#[path = "../tests/speculation_tests.rs"]
mod tests;
