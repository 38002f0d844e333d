//! The rule table seam and the reference structural rules.
//!
//! The dispatcher handles variables, unions, intersections, applications and
//! binders itself and asks a `RuleTable` about everything else. A rule
//! either relates the pair (possibly by flowing or unifying components
//! through `Solver::flow_in` / `Solver::unify_in`, or by reporting a more
//! specific error with `Solver::add_output`), or answers `NoMatch`, which the
//! dispatcher reports as `Incompatible` at this pair.

use flowsolve_common::interner::Atom;
use flowsolve_common::span::Span;

use crate::diagnostics::{ErrorMessage, FlowError};
use crate::expansion::{FoldDecision, FoldReason};
use crate::solver::Solver;
use crate::trace::Trace;
use crate::types::{
    FunctionShape, IntrinsicKind, LiteralValue, ObjectShape, TypeData, TypeId, TypeListId, UseOp,
};

/// Outcome of consulting a rule table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleMatch {
    /// The pair is handled; any component flows have been issued.
    Matched,
    /// No rule relates the pair.
    NoMatch,
}

/// Depth token and provenance of the pair being decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleContext {
    pub trace: Trace,
    pub use_op: UseOp,
}

/// Pairwise compatibility rules for concrete constructs.
///
/// Called only with non-variable, non-union/intersection, non-application,
/// non-binder pairs that are not trivially related.
pub trait RuleTable {
    fn flow_concrete(
        &self,
        solver: &mut Solver<'_>,
        lower: TypeId,
        upper: TypeId,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError>;
}

/// Minimal structural rule set over the built-in type constructors.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralRules;

impl RuleTable for StructuralRules {
    fn flow_concrete(
        &self,
        solver: &mut Solver<'_>,
        lower: TypeId,
        upper: TypeId,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        let types = solver.types();
        let (Some(l), Some(u)) = (types.lookup_stripped(lower), types.lookup_stripped(upper)) else {
            return Ok(RuleMatch::NoMatch);
        };

        match (l, u) {
            (TypeData::Intrinsic(IntrinsicKind::Any), use_ty) if use_ty.is_use() => {
                let out = use_output(use_ty);
                solver.flow_in(cx, TypeId::ANY, out)?;
                Ok(RuleMatch::Matched)
            }
            (TypeData::Intrinsic(a), TypeData::Intrinsic(b)) => Ok(matched_if(a == b)),
            (TypeData::Literal(value), TypeData::Intrinsic(kind)) => Ok(matched_if(value.base() == kind)),
            (TypeData::Literal(a), TypeData::Literal(b)) => Ok(matched_if(a == b)),
            (TypeData::Object(a), TypeData::Object(b)) => {
                let a = solver.types().object_shape(a);
                let b = solver.types().object_shape(b);
                self.flow_object(solver, &a, &b, lower, upper, cx)
            }
            (TypeData::Array(a), TypeData::Array(b)) => {
                solver.unify_in(cx, a, b)?;
                Ok(RuleMatch::Matched)
            }
            (TypeData::Function(a), TypeData::Function(b)) => {
                let a = solver.types().function_shape(a);
                let b = solver.types().function_shape(b);
                self.flow_function(solver, &a, &b, cx)
            }
            (_, TypeData::GetProp { name, out }) => self.get_prop(solver, l, name, out, lower, upper, cx),
            (TypeData::Function(f), TypeData::Call { args, out }) => {
                let f = solver.types().function_shape(f);
                self.call(solver, &f, args, out, cx)
            }
            (_, TypeData::Add { rhs, out, site }) => self.add(solver, l, rhs, out, site, cx),
            _ => Ok(RuleMatch::NoMatch),
        }
    }
}

fn matched_if(ok: bool) -> RuleMatch {
    if ok { RuleMatch::Matched } else { RuleMatch::NoMatch }
}

fn use_output(data: TypeData) -> TypeId {
    match data {
        TypeData::GetProp { out, .. } | TypeData::Call { out, .. } | TypeData::Add { out, .. } => out,
        _ => TypeId::ANY,
    }
}

/// Numeric view of a type: `Some(Some(n))` for a literal, `Some(None)` for
/// `number`.
fn numeric(data: TypeData) -> Option<Option<f64>> {
    match data {
        TypeData::Literal(LiteralValue::Number(n)) => Some(Some(n.0)),
        TypeData::Intrinsic(IntrinsicKind::Number) => Some(None),
        _ => None,
    }
}

/// Textual view of a type for concatenation.
fn stringish(solver: &Solver<'_>, data: TypeData) -> Option<Option<String>> {
    match data {
        TypeData::Literal(LiteralValue::String(atom)) => {
            Some(Some(solver.types().resolve_atom(atom).to_string()))
        }
        TypeData::Intrinsic(IntrinsicKind::String) => Some(None),
        _ => numeric(data).map(|n| n.map(format_number)),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl StructuralRules {
    fn flow_object(
        &self,
        solver: &mut Solver<'_>,
        lower_shape: &ObjectShape,
        upper_shape: &ObjectShape,
        lower: TypeId,
        upper: TypeId,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        for required in &upper_shape.properties {
            match lower_shape.property(required.name) {
                Some(found) if required.readonly => {
                    solver.flow_in(cx, found.type_id, required.type_id)?;
                }
                Some(found) => solver.unify_in(cx, found.type_id, required.type_id)?,
                None if required.optional => {}
                None => solver.add_output(ErrorMessage::PropertyMissing {
                    name: required.name,
                    lower,
                    upper,
                    use_op: cx.use_op,
                })?,
            }
        }
        Ok(RuleMatch::Matched)
    }

    fn flow_function(
        &self,
        solver: &mut Solver<'_>,
        lower: &FunctionShape,
        upper: &FunctionShape,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        if lower.params.len() > upper.params.len() {
            return Ok(RuleMatch::NoMatch);
        }
        for (&own, &expected) in lower.params.iter().zip(&upper.params) {
            solver.flow_in(cx, expected, own)?;
        }
        solver.flow_in(cx, lower.return_type, upper.return_type)?;
        Ok(RuleMatch::Matched)
    }

    fn get_prop(
        &self,
        solver: &mut Solver<'_>,
        lower_data: TypeData,
        name: Atom,
        out: TypeId,
        lower: TypeId,
        upper: TypeId,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        match lower_data {
            TypeData::Object(shape) => {
                let shape = solver.types().object_shape(shape);
                match shape.property(name) {
                    Some(prop) => solver.flow_in(cx, prop.type_id, out)?,
                    None => solver.add_output(ErrorMessage::PropertyMissing {
                        name,
                        lower,
                        upper,
                        use_op: cx.use_op,
                    })?,
                }
                Ok(RuleMatch::Matched)
            }
            TypeData::Array(_) if solver.types().resolve_atom(name) == "length" => {
                solver.flow_in(cx, TypeId::NUMBER, out)?;
                Ok(RuleMatch::Matched)
            }
            _ => Ok(RuleMatch::NoMatch),
        }
    }

    fn call(
        &self,
        solver: &mut Solver<'_>,
        function: &FunctionShape,
        args: TypeListId,
        out: TypeId,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        let args = solver.types().type_list(args);
        if args.len() < function.params.len() {
            return Ok(RuleMatch::NoMatch);
        }
        for (index, (&arg, &param)) in args.iter().zip(&function.params).enumerate() {
            let arg_cx = RuleContext {
                use_op: UseOp::Argument {
                    index: index as u32,
                    span: cx.use_op.span(),
                },
                ..cx
            };
            solver.flow_in(arg_cx, arg, param)?;
        }
        solver.flow_in(cx, function.return_type, out)?;
        Ok(RuleMatch::Matched)
    }

    /// `lower + rhs`. Literal operands fold once per site; repeats widen.
    fn add(
        &self,
        solver: &mut Solver<'_>,
        lower_data: TypeData,
        rhs: TypeId,
        out: TypeId,
        site: Span,
        cx: RuleContext,
    ) -> Result<RuleMatch, FlowError> {
        let rhs = match solver.types().as_var(rhs) {
            Some(var) => match solver.resolved_type(var)? {
                Some(resolved) => resolved,
                None => {
                    // Operand not known yet: approximate by the producer.
                    let base = match lower_data {
                        TypeData::Literal(value) => value.base().type_id(),
                        TypeData::Intrinsic(kind) => kind.type_id(),
                        _ => return Ok(RuleMatch::NoMatch),
                    };
                    solver.flow_in(cx, base, out)?;
                    return Ok(RuleMatch::Matched);
                }
            },
            None => rhs,
        };
        let Some(rhs_data) = solver.types().lookup_stripped(rhs) else {
            return Ok(RuleMatch::NoMatch);
        };

        if matches!(rhs_data, TypeData::Intrinsic(IntrinsicKind::Any)) {
            solver.flow_in(cx, TypeId::ANY, out)?;
            return Ok(RuleMatch::Matched);
        }

        if let (Some(a), Some(b)) = (numeric(lower_data), numeric(rhs_data)) {
            let result = match (a, b) {
                (Some(a), Some(b)) => match solver.const_fold(site, FoldReason::Addition) {
                    FoldDecision::Fold => solver.types_mut().literal_number(a + b),
                    FoldDecision::Widen => TypeId::NUMBER,
                },
                _ => TypeId::NUMBER,
            };
            solver.flow_in(cx, result, out)?;
            return Ok(RuleMatch::Matched);
        }

        let (Some(a), Some(b)) = (stringish(solver, lower_data), stringish(solver, rhs_data)) else {
            return Ok(RuleMatch::NoMatch);
        };
        let result = match (a, b) {
            (Some(a), Some(b)) => match solver.const_fold(site, FoldReason::Concatenation) {
                FoldDecision::Fold => solver.types_mut().literal_string(&format!("{a}{b}")),
                FoldDecision::Widen => TypeId::STRING,
            },
            _ => TypeId::STRING,
        };
        solver.flow_in(cx, result, out)?;
        Ok(RuleMatch::Matched)
    }
}

#[cfg(test)]
#[path = "../tests/rules_tests.rs"]
mod tests;
