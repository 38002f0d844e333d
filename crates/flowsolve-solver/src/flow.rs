//! The flow/unify dispatcher.
//!
//! `rec_flow(lower, upper)` decides how a producer relates to a consumer:
//!
//! 1. fast paths (identical, `empty` producer, `mixed` consumer, `any`
//!    against a non-variable),
//! 2. the pair cache (never for variables); a pair that failed outside
//!    speculation fails again when a trial meets it,
//! 3. the depth ceiling,
//! 4. deferral while speculating,
//! 5. dispatch on shape: variables go to the graph, unions and
//!    intersections are decomposed or handed to the choice engine,
//!    applications are expanded under the loop guard, binders are
//!    instantiated, and concrete pairs go to the rule table.
//!
//! `rec_unify(a, b)` is the symmetric counterpart: variables merge or
//! resolve, matching structures unify component-wise, anything else flows
//! both ways.

use tracing::{Level, debug, span, trace};

use crate::caches::PairLookup;
use crate::diagnostics::{ErrorMessage, FlowError, FlowResult, InternalError};
use crate::rules::{RuleContext, RuleMatch};
use crate::solver::Solver;
use crate::speculation::{ChoiceKind, SpeculationAction};
use crate::trace::Trace;
use crate::types::{ApplicationId, TyVarId, TypeData, TypeId, UseOp};

/// Stack space kept free before growing for deep flows.
const RED_ZONE: usize = 64 * 1024;
/// Size of each additional stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// A producer/consumer pair with its stripped ids and shapes.
#[derive(Clone, Copy)]
struct FlowSides {
    lower: TypeId,
    upper: TypeId,
    l: TypeId,
    u: TypeId,
    l_var: Option<TyVarId>,
    u_var: Option<TyVarId>,
    l_data: TypeData,
    u_data: TypeData,
}

impl Solver<'_> {
    /// Record a type error, or abort the current trial while speculating.
    pub fn add_output(&mut self, error: ErrorMessage) -> FlowResult {
        if self.speculation.is_speculating() {
            trace!(code = error.code(), "speculative error");
            return Err(FlowError::Speculative(Box::new(error)));
        }
        debug!(code = error.code(), pair = ?error.pair(), "type error recorded");
        if let Some(listener) = self.listener.as_mut() {
            listener.report_error(&error);
        }
        self.errors.push(error);
        Ok(())
    }

    /// The provenance to record for a flow: the explicit one, or the
    /// innermost `with_use_op` context.
    pub(crate) fn effective_use_op(&self, use_op: UseOp) -> UseOp {
        if use_op.is_unknown() {
            self.op_stack.last().copied().unwrap_or(use_op)
        } else {
            use_op
        }
    }

    /// Nested flow for rules: one link deeper than `cx`.
    pub fn flow_in(&mut self, cx: RuleContext, lower: TypeId, upper: TypeId) -> FlowResult {
        self.rec_flow(cx.trace.step(), cx.use_op, lower, upper)
    }

    /// Nested unification for rules: one link deeper than `cx`.
    pub fn unify_in(&mut self, cx: RuleContext, left: TypeId, right: TypeId) -> FlowResult {
        self.rec_unify(cx.trace.step(), cx.use_op, left, right)
    }

    fn lookup_data(&self, ty: TypeId) -> Result<TypeData, InternalError> {
        self.types
            .lookup(ty)
            .ok_or(InternalError::MalformedType(ty))
    }

    // =========================================================================
    // Flow
    // =========================================================================

    pub(crate) fn rec_flow(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        lower: TypeId,
        upper: TypeId,
    ) -> FlowResult {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
            self.rec_flow_inner(trace, use_op, lower, upper)
        })
    }

    fn rec_flow_inner(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        lower: TypeId,
        upper: TypeId,
    ) -> FlowResult {
        let l = self.types.strip(lower);
        let u = self.types.strip(upper);
        if l == u || l == TypeId::EMPTY || u == TypeId::MIXED {
            return Ok(());
        }
        let l_var = self.types.as_var(l);
        let u_var = self.types.as_var(u);
        let l_data = self.lookup_data(l)?;
        let u_data = self.lookup_data(u)?;
        if (l == TypeId::ANY && u_var.is_none() && !u_data.is_use())
            || (u == TypeId::ANY && l_var.is_none())
        {
            return Ok(());
        }

        let sides = FlowSides {
            lower,
            upper,
            l,
            u,
            l_var,
            u_var,
            l_data,
            u_data,
        };
        if l_var.is_some() || u_var.is_some() {
            return self.flow_sides(trace, use_op, sides);
        }
        match self.caches.pair_seen(l, u) {
            PairLookup::Hit => {
                trace!(lower = l.0, upper = u.0, "pair cache hit");
                Ok(())
            }
            PairLookup::Failed if self.speculation.is_speculating() => {
                trace!(lower = l.0, upper = u.0, "known failing pair");
                let use_op = self.effective_use_op(use_op);
                self.add_output(ErrorMessage::Incompatible {
                    lower,
                    upper,
                    use_op,
                })
            }
            // Already reported once.
            PairLookup::Failed => Ok(()),
            PairLookup::Miss => {
                let errors_before = self.errors.len();
                let result = self.flow_sides(trace, use_op, sides);
                if !self.speculation.is_speculating() && self.errors.len() > errors_before {
                    self.caches.pairs.mark_failed(l, u);
                }
                result
            }
        }
    }

    /// Everything after the fast paths and the pair cache.
    fn flow_sides(&mut self, trace: Trace, use_op: UseOp, sides: FlowSides) -> FlowResult {
        let FlowSides {
            lower,
            upper,
            l,
            u,
            l_var,
            u_var,
            l_data,
            u_data,
        } = sides;

        if trace.depth() > self.options.max_flow_depth {
            debug!(lower = l.0, upper = u.0, depth = trace.depth(), "flow depth exceeded");
            return self.add_output(ErrorMessage::RecursionLimit { lower, upper });
        }
        let next = trace.step();
        let use_op = self.effective_use_op(use_op);

        if self.speculation.is_speculating()
            && self.defer_if_pre_existing(
                SpeculationAction::Flow {
                    lower,
                    upper,
                    use_op,
                },
                l_var,
                u_var,
            )?
        {
            return Ok(());
        }

        match (l_var, u_var) {
            (Some(x), Some(y)) => return self.link_vars(next, use_op, x, y),
            (Some(x), None) => return self.add_upper_bound_in(next, use_op, x, upper),
            (None, Some(y)) => return self.add_lower_bound_in(next, use_op, y, lower),
            (None, None) => {}
        }

        let _span = span!(Level::TRACE, "rec_flow", lower = l.0, upper = u.0).entered();

        if let TypeData::Union(list) = l_data {
            let members = self.types.type_list(list);
            if self.options.quick_subset
                && let TypeData::Union(upper_list) = u_data
            {
                let upper_members = self.types.type_list(upper_list);
                let covered = members.iter().all(|&m| {
                    let m = self.types.strip(m);
                    upper_members.iter().any(|&um| self.types.strip(um) == m)
                });
                if covered {
                    trace!("union subset");
                    return Ok(());
                }
            }
            for &member in members.iter() {
                self.rec_flow(next, use_op, member, upper)?;
            }
            return Ok(());
        }

        if let TypeData::Intersection(list) = u_data {
            let members = self.types.type_list(list);
            for &member in members.iter() {
                self.rec_flow(next, use_op, lower, member)?;
            }
            return Ok(());
        }

        match (l_data, u_data) {
            (TypeData::Application(a), TypeData::Application(b)) => {
                if let (Some(app_a), Some(app_b)) =
                    (self.types.type_application(a), self.types.type_application(b))
                    && app_a.def == app_b.def
                    && app_a.args.len() == app_b.args.len()
                {
                    for (&arg_a, &arg_b) in app_a.args.iter().zip(app_b.args.iter()) {
                        self.rec_unify(next, use_op, arg_a, arg_b)?;
                    }
                    return Ok(());
                }
                return self.flow_expanded(next, use_op, a, lower, upper, true);
            }
            (TypeData::Application(app), _) => {
                return self.flow_expanded(next, use_op, app, lower, upper, true);
            }
            (_, TypeData::Application(app)) => {
                return self.flow_expanded(next, use_op, app, lower, upper, false);
            }
            _ => {}
        }

        match (l_data, u_data) {
            (TypeData::Poly(a), TypeData::Poly(b)) => {
                return match self.align_poly_params(a, b) {
                    Some((lower_body, upper_body)) => {
                        self.rec_flow(next, use_op, lower_body, upper_body)
                    }
                    None => self.add_output(ErrorMessage::Incompatible {
                        lower,
                        upper,
                        use_op,
                    }),
                };
            }
            (TypeData::Poly(poly), _) => {
                let instance = self.instantiate_existential(lower, poly, use_op.span())?;
                return self.rec_flow(next, use_op, instance, upper);
            }
            (_, TypeData::Poly(poly)) => {
                // The consumer's parameters stay rigid.
                let body = self
                    .types
                    .poly_type(poly)
                    .map(|p| p.body)
                    .ok_or(InternalError::MalformedType(upper))?;
                return self.rec_flow(next, use_op, lower, body);
            }
            _ => {}
        }

        if let TypeData::Union(list) = u_data {
            let members = self.types.type_list(list);
            if self.options.quick_subset && members.iter().any(|&m| self.types.strip(m) == l) {
                trace!("union membership");
                return Ok(());
            }
            return self.speculative_matches(next, use_op, ChoiceKind::Union, lower, upper, members);
        }

        if let TypeData::Intersection(list) = l_data {
            let members = self.types.type_list(list);
            if members.iter().any(|&m| self.types.strip(m) == u) {
                return Ok(());
            }
            return self.speculative_matches(
                next,
                use_op,
                ChoiceKind::Intersection,
                lower,
                upper,
                members,
            );
        }

        let rules = self.rules;
        let cx = RuleContext {
            trace: next,
            use_op,
        };
        match rules.flow_concrete(self, lower, upper, cx)? {
            RuleMatch::Matched => Ok(()),
            RuleMatch::NoMatch => self.add_output(ErrorMessage::Incompatible {
                lower,
                upper,
                use_op,
            }),
        }
    }

    /// Expand the application on one side of the pair under the loop guard
    /// and continue with its body. A detected loop widens that side to `any`.
    fn flow_expanded(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        app: ApplicationId,
        lower: TypeId,
        upper: TypeId,
        lower_side: bool,
    ) -> FlowResult {
        let application = self
            .types
            .type_application(app)
            .ok_or(InternalError::MalformedType(if lower_side { lower } else { upper }))?;
        let mut roots = Vec::with_capacity(application.args.len());
        for &arg in &application.args {
            roots.push(self.root_set(arg)?);
        }

        let (new_lower, new_upper, guarded) = if self.expansion.is_loop(application.def, &roots) {
            debug!(def = application.def.0, "application loop, widening");
            if lower_side {
                (TypeId::ANY, upper, false)
            } else {
                (lower, TypeId::ANY, false)
            }
        } else {
            let body = self.expand_application(app)?;
            if lower_side {
                (body, upper, true)
            } else {
                (lower, body, true)
            }
        };

        if !guarded {
            return self.rec_flow(trace, use_op, new_lower, new_upper);
        }
        self.expansion.push(application.def, roots);
        let result = self.rec_flow(trace, use_op, new_lower, new_upper);
        self.expansion.pop();
        result
    }

    // =========================================================================
    // Unify
    // =========================================================================

    pub(crate) fn rec_unify(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        left: TypeId,
        right: TypeId,
    ) -> FlowResult {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
            self.rec_unify_inner(trace, use_op, left, right)
        })
    }

    fn rec_unify_inner(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        left: TypeId,
        right: TypeId,
    ) -> FlowResult {
        let a = self.types.strip(left);
        let b = self.types.strip(right);
        if a == b {
            return Ok(());
        }
        if trace.depth() > self.options.max_flow_depth {
            return self.add_output(ErrorMessage::RecursionLimit {
                lower: left,
                upper: right,
            });
        }
        let next = trace.step();
        let use_op = self.effective_use_op(use_op);
        let a_var = self.types.as_var(a);
        let b_var = self.types.as_var(b);

        if self.speculation.is_speculating()
            && self.defer_if_pre_existing(
                SpeculationAction::Unify {
                    left,
                    right,
                    use_op,
                },
                a_var,
                b_var,
            )?
        {
            return Ok(());
        }

        match (a_var, b_var) {
            (Some(x), Some(y)) => return self.merge_vars(next, use_op, x, y),
            (Some(x), None) => return self.unify_var(next, use_op, x, right),
            (None, Some(y)) => return self.unify_var(next, use_op, y, left),
            (None, None) => {}
        }

        let _span = span!(Level::TRACE, "rec_unify", left = a.0, right = b.0).entered();
        let a_data = self.lookup_data(a)?;
        let b_data = self.lookup_data(b)?;
        match (a_data, b_data) {
            (TypeData::Array(x), TypeData::Array(y)) => self.rec_unify(next, use_op, x, y),
            (TypeData::Object(x), TypeData::Object(y)) => {
                let x = self.types.object_shape(x);
                let y = self.types.object_shape(y);
                let same_keys = x.properties.len() == y.properties.len()
                    && x.properties.iter().zip(&y.properties).all(|(p, q)| p.name == q.name);
                if !same_keys {
                    return self.flow_both_ways(next, use_op, left, right);
                }
                for (p, q) in x.properties.iter().zip(&y.properties) {
                    self.rec_unify(next, use_op, p.type_id, q.type_id)?;
                }
                Ok(())
            }
            (TypeData::Function(x), TypeData::Function(y)) => {
                let x = self.types.function_shape(x);
                let y = self.types.function_shape(y);
                if x.params.len() != y.params.len() {
                    return self.flow_both_ways(next, use_op, left, right);
                }
                for (&p, &q) in x.params.iter().zip(&y.params) {
                    self.rec_unify(next, use_op, p, q)?;
                }
                self.rec_unify(next, use_op, x.return_type, y.return_type)
            }
            (TypeData::Application(x), TypeData::Application(y)) => {
                match (self.types.type_application(x), self.types.type_application(y)) {
                    (Some(x), Some(y)) if x.def == y.def && x.args.len() == y.args.len() => {
                        for (&p, &q) in x.args.iter().zip(&y.args) {
                            self.rec_unify(next, use_op, p, q)?;
                        }
                        Ok(())
                    }
                    _ => self.flow_both_ways(next, use_op, left, right),
                }
            }
            (TypeData::Union(x), TypeData::Union(y))
            | (TypeData::Intersection(x), TypeData::Intersection(y)) => {
                let x = self.types.type_list(x);
                let y = self.types.type_list(y);
                if x.len() != y.len() {
                    return self.flow_both_ways(next, use_op, left, right);
                }
                for (&p, &q) in x.iter().zip(y.iter()) {
                    self.rec_unify(next, use_op, p, q)?;
                }
                Ok(())
            }
            _ => self.flow_both_ways(next, use_op, left, right),
        }
    }

    /// Unify a variable with a non-variable type.
    fn unify_var(
        &mut self,
        trace: Trace,
        use_op: UseOp,
        var: TyVarId,
        ty: TypeId,
    ) -> FlowResult {
        if self.types.is_unify_unsafe(ty) {
            let var_ty = self.types.var(var);
            return self.flow_both_ways(trace, use_op, var_ty, ty);
        }
        self.resolve_var(trace, use_op, var, ty)
    }

    fn flow_both_ways(&mut self, trace: Trace, use_op: UseOp, a: TypeId, b: TypeId) -> FlowResult {
        self.rec_flow(trace, use_op, a, b)?;
        self.rec_flow(trace, use_op, b, a)
    }
}

#[cfg(test)]
#[path = "../tests/flow_tests.rs"]
mod tests;
