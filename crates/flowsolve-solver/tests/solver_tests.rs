use super::*;
use crate::rules::{RuleContext, RuleMatch};
use flowsolve_common::span::Span;
use std::cell::RefCell;
use std::rc::Rc;

fn origin() -> VarOrigin {
    VarOrigin::new(Span::dummy())
}

fn var(solver: &mut Solver<'_>) -> (TyVarId, TypeId) {
    let id = solver.create_variable(origin());
    (id, solver.var_type(id))
}

fn incompatible_count(solver: &Solver<'_>) -> usize {
    solver
        .errors()
        .iter()
        .filter(|e| matches!(e, ErrorMessage::Incompatible { .. }))
        .count()
}

#[test]
fn test_literal_lower_bound_checked_against_later_uppers() {
    let mut solver = Solver::new();
    let (v, _) = var(&mut solver);
    let three = solver.types_mut().literal_number(3.0);

    solver.add_lower_bound(v, three, UseOp::Unknown).unwrap();
    solver.add_upper_bound(v, TypeId::NUMBER, UseOp::Unknown).unwrap();
    assert!(solver.errors().is_empty());

    solver.add_upper_bound(v, TypeId::STRING, UseOp::Unknown).unwrap();
    assert_eq!(solver.errors().len(), 1);
    assert_eq!(
        solver.errors()[0],
        ErrorMessage::Incompatible {
            lower: three,
            upper: TypeId::STRING,
            use_op: UseOp::Unknown,
        }
    );
}

#[test]
fn test_merge_reports_conflict_once() {
    let mut solver = Solver::new();
    let (v1, _) = var(&mut solver);
    let (v2, _) = var(&mut solver);
    solver.add_lower_bound(v1, TypeId::NUMBER, UseOp::Unknown).unwrap();
    solver.add_upper_bound(v2, TypeId::STRING, UseOp::Unknown).unwrap();

    solver.merge(v1, v2, UseOp::Unknown).unwrap();
    assert_eq!(incompatible_count(&solver), 1);

    solver.merge(v1, v2, UseOp::Unknown).unwrap();
    solver.merge(v2, v1, UseOp::Unknown).unwrap();
    assert_eq!(incompatible_count(&solver), 1);
}

#[test]
fn test_resolve_is_idempotent() {
    let mut solver = Solver::new();
    let (v, _) = var(&mut solver);
    solver.resolve(v, TypeId::NUMBER, UseOp::Unknown).unwrap();
    solver.resolve(v, TypeId::NUMBER, UseOp::Unknown).unwrap();
    assert!(solver.errors().is_empty());
    assert_eq!(solver.resolved_type(v).unwrap(), Some(TypeId::NUMBER));

    solver.resolve(v, TypeId::STRING, UseOp::Unknown).unwrap();
    assert!(!solver.errors().is_empty());
    assert_eq!(solver.resolved_type(v).unwrap(), Some(TypeId::NUMBER));
}

#[test]
fn test_merge_order_does_not_change_bounds() {
    fn run(order: &[(usize, usize)]) -> Vec<Vec<TypeId>> {
        let mut solver = Solver::new();
        let vars: Vec<TyVarId> = (0..3).map(|_| var(&mut solver).0).collect();
        let one = solver.types_mut().literal_number(1.0);
        solver.add_lower_bound(vars[0], one, UseOp::Unknown).unwrap();
        solver.add_lower_bound(vars[1], TypeId::NUMBER, UseOp::Unknown).unwrap();
        solver.add_upper_bound(vars[2], TypeId::NUMBER, UseOp::Unknown).unwrap();
        for &(a, b) in order {
            solver.merge(vars[a], vars[b], UseOp::Unknown).unwrap();
        }
        assert!(solver.errors().is_empty());
        vars.iter()
            .map(|&v| {
                let mut lowers = solver.lower_bounds(v).unwrap();
                lowers.sort();
                lowers
            })
            .collect()
    }

    let forward = run(&[(0, 1), (1, 2)]);
    let backward = run(&[(2, 1), (0, 2)]);
    assert_eq!(forward, backward);
    assert_eq!(forward[0], forward[2]);
}

#[test]
fn test_flow_between_unrelated_primitives_reports_incompatible() {
    let mut solver = Solver::new();
    solver.flow(TypeId::NUMBER, TypeId::STRING).unwrap();
    assert_eq!(incompatible_count(&solver), 1);
    // Repeating the check hits the pair cache.
    solver.flow(TypeId::NUMBER, TypeId::STRING).unwrap();
    assert_eq!(incompatible_count(&solver), 1);
    assert_eq!(solver.cache_stats().pair_hits, 1);
}

#[test]
fn test_unify_resolves_variable() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let arr = solver.types_mut().array(TypeId::STRING);
    solver.unify(v_ty, arr).unwrap();
    assert_eq!(solver.resolved_type(v).unwrap(), Some(arr));
}

#[test]
fn test_unify_with_internal_placeholder_flows_both_ways() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let placeholder = solver.types_mut().internal("pending");
    solver.unify(v_ty, placeholder).unwrap();
    assert_eq!(solver.resolved_type(v).unwrap(), None);
    assert_eq!(solver.upper_bounds(v).unwrap(), vec![placeholder]);
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![placeholder]);
}

#[test]
fn test_with_use_op_supplies_provenance() {
    let mut solver = Solver::new();
    let site = Span::new(0, 10, 20);
    solver
        .with_use_op(UseOp::Assignment(site), |s| s.flow(TypeId::BOOLEAN, TypeId::NUMBER))
        .unwrap();
    assert_eq!(
        solver.errors()[0],
        ErrorMessage::Incompatible {
            lower: TypeId::BOOLEAN,
            upper: TypeId::NUMBER,
            use_op: UseOp::Assignment(site),
        }
    );
    let diagnostics = solver.diagnostics();
    assert_eq!(diagnostics[0].span, site);
    assert_eq!(
        diagnostics[0].message_text,
        "Type 'boolean' is incompatible with type 'number'."
    );
}

#[test]
fn test_listener_receives_recorded_errors() {
    struct Shared(Rc<RefCell<DiagnosticCollector>>);
    impl DiagnosticSink for Shared {
        fn report_error(&mut self, error: &ErrorMessage) {
            self.0.borrow_mut().report_error(error);
        }
    }

    let seen = Rc::new(RefCell::new(DiagnosticCollector::new()));
    let mut solver = Solver::new();
    solver.set_listener(Shared(Rc::clone(&seen)));
    solver.flow(TypeId::NULL, TypeId::NUMBER).unwrap();
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow().errors(), solver.errors());
}

#[test]
fn test_take_errors_drains() {
    let mut solver = Solver::new();
    solver.flow(TypeId::VOID, TypeId::NUMBER).unwrap();
    assert_eq!(solver.take_errors().len(), 1);
    assert!(solver.errors().is_empty());
}

#[test]
fn test_missing_variable_is_fatal() {
    let mut solver = Solver::new();
    assert_eq!(
        solver.add_lower_bound(TyVarId(42), TypeId::NUMBER, UseOp::Unknown),
        Err(InternalError::MissingVariable(TyVarId(42)))
    );
}

#[test]
fn test_custom_rule_table() {
    struct Permissive;
    impl RuleTable for Permissive {
        fn flow_concrete(
            &self,
            _solver: &mut Solver<'_>,
            _lower: TypeId,
            _upper: TypeId,
            _cx: RuleContext,
        ) -> Result<RuleMatch, FlowError> {
            Ok(RuleMatch::Matched)
        }
    }

    let rules = Permissive;
    let mut solver = Solver::with_rules(&rules, SolverOptions::default());
    solver.flow(TypeId::NUMBER, TypeId::STRING).unwrap();
    assert!(solver.errors().is_empty());
}

#[test]
fn test_format_type_uses_definition_names() {
    let mut solver = Solver::new();
    let name = solver.types_mut().intern_string("Box");
    let param = solver.types_mut().intern_string("T");
    let body = solver.types_mut().param(param);
    let def = solver
        .defs_mut()
        .register(crate::def::DefinitionInfo::new(name, vec![param], body));
    let app = solver.types_mut().application(def, vec![TypeId::NUMBER]);
    assert_eq!(solver.format_type(app), "Box<number>");
}
