use super::*;
use crate::options::SolverOptions;
use crate::types::{PropertyInfo, VarOrigin};
use flowsolve_common::span::Span;

fn var(solver: &mut Solver<'_>) -> (TyVarId, TypeId) {
    let id = solver.create_variable(VarOrigin::new(Span::dummy()));
    (id, solver.var_type(id))
}

fn without_quick_subset() -> Solver<'static> {
    Solver::with_options(SolverOptions {
        quick_subset: false,
        ..SolverOptions::default()
    })
}

#[test]
fn test_fast_paths_record_nothing() {
    let mut solver = Solver::new();
    let obj = solver.types_mut().object(vec![]);
    solver.flow(TypeId::EMPTY, TypeId::NUMBER).unwrap();
    solver.flow(obj, TypeId::MIXED).unwrap();
    solver.flow(TypeId::ANY, TypeId::STRING).unwrap();
    solver.flow(TypeId::STRING, TypeId::ANY).unwrap();
    assert!(solver.errors().is_empty());
    assert!(solver.caches.pairs.is_empty());
}

#[test]
fn test_located_types_compare_stripped() {
    let mut solver = Solver::new();
    let located = solver.types_mut().reposition(Span::new(0, 1, 2), TypeId::NUMBER);
    solver.flow(located, TypeId::NUMBER).unwrap();
    assert!(solver.errors().is_empty());

    solver.flow(located, TypeId::STRING).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::Incompatible {
            lower: located,
            upper: TypeId::STRING,
            use_op: UseOp::Unknown,
        }]
    );
    assert!(solver.caches.pairs.failed(TypeId::NUMBER, TypeId::STRING));

    // The same stripped pair is reported once.
    solver.flow(TypeId::NUMBER, TypeId::STRING).unwrap();
    assert_eq!(solver.errors().len(), 1);
}

#[test]
fn test_known_failing_pair_still_fails_inside_a_trial() {
    let mut solver = Solver::new();
    solver.flow(TypeId::STRING, TypeId::NUMBER).unwrap();
    assert_eq!(solver.errors().len(), 1);

    let union = solver.types_mut().union2(TypeId::NUMBER, TypeId::BOOLEAN);
    solver.flow(TypeId::STRING, union).unwrap();
    let errors = solver.errors();
    assert_eq!(errors.len(), 2);
    match &errors[1] {
        ErrorMessage::NoMatchingAlternative {
            lower,
            upper,
            branches,
            ..
        } => {
            assert_eq!((*lower, *upper), (TypeId::STRING, union));
            assert_eq!(branches.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_successful_pair_is_a_cache_hit_inside_a_trial() {
    let mut solver = without_quick_subset();
    let a = solver.types_mut().intern_string("a");
    let one = solver.types_mut().literal_number(1.0);
    let lower = solver
        .types_mut()
        .object(vec![PropertyInfo::readonly(a, one)]);
    let upper = solver
        .types_mut()
        .object(vec![PropertyInfo::readonly(a, TypeId::NUMBER)]);
    solver.flow(lower, upper).unwrap();
    let hits = solver.cache_stats().pair_hits;

    let union = solver.types_mut().union2(TypeId::STRING, upper);
    solver.flow(lower, union).unwrap();
    assert!(solver.errors().is_empty());
    assert_eq!(solver.cache_stats().pair_hits, hits + 1);
}

#[test]
fn test_variable_pairs_are_rechecked_after_new_bounds() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    solver.flow(v_ty, TypeId::NUMBER).unwrap();
    solver.flow(TypeId::NUMBER, v_ty).unwrap();
    assert!(solver.errors().is_empty());

    // A concrete pair this would be a cache hit; a variable pair is
    // never cached, so the new lower bound is checked against `number`.
    let stats = solver.cache_stats();
    solver.flow(v_ty, TypeId::NUMBER).unwrap();
    assert_eq!(solver.cache_stats().pair_hits, stats.pair_hits);
    assert!(!solver.caches.pairs.contains(v_ty, TypeId::NUMBER));

    solver.flow(TypeId::STRING, v_ty).unwrap();
    assert!(matches!(
        solver.errors(),
        [ErrorMessage::Incompatible {
            lower: TypeId::STRING,
            upper: TypeId::NUMBER,
            ..
        }]
    ));
    assert_eq!(
        solver.lower_bounds(v).unwrap(),
        vec![TypeId::NUMBER, TypeId::STRING]
    );
    assert!(
        solver
            .caches
            .pairs
            .iter()
            .all(|&(l, u)| !solver.types().is_var(l) && !solver.types().is_var(u))
    );
}

#[test]
fn test_string_into_string_or_number_without_quick_subset() {
    let mut solver = without_quick_subset();
    let union = solver.types_mut().union2(TypeId::STRING, TypeId::NUMBER);
    solver.flow(TypeId::STRING, union).unwrap();
    assert!(solver.errors().is_empty());
    assert!(!solver.caches.pairs.contains(TypeId::STRING, TypeId::NUMBER));
}

#[test]
fn test_union_subset_skips_members() {
    let mut solver = Solver::new();
    let small = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
    let big = solver
        .types_mut()
        .union(vec![TypeId::STRING, TypeId::BOOLEAN, TypeId::NUMBER]);
    solver.flow(small, big).unwrap();
    assert!(solver.errors().is_empty());
    assert!(!solver.caches.pairs.contains(TypeId::NUMBER, big));
}

#[test]
fn test_producer_union_flows_each_member() {
    let mut solver = Solver::new();
    let union = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
    solver.flow(union, TypeId::NUMBER).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::Incompatible {
            lower: TypeId::STRING,
            upper: TypeId::NUMBER,
            use_op: UseOp::Unknown,
        }]
    );
}

#[test]
fn test_consumer_intersection_requires_every_member() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let b = solver.types_mut().intern_string("b");
    let has_a = solver
        .types_mut()
        .object(vec![PropertyInfo::readonly(a, TypeId::NUMBER)]);
    let has_b = solver
        .types_mut()
        .object(vec![PropertyInfo::readonly(b, TypeId::STRING)]);
    let both = solver.types_mut().intersection2(has_a, has_b);

    let full = solver.types_mut().object(vec![
        PropertyInfo::new(a, TypeId::NUMBER),
        PropertyInfo::new(b, TypeId::STRING),
    ]);
    solver.flow(full, both).unwrap();
    assert!(solver.errors().is_empty());

    let partial = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    solver.flow(partial, both).unwrap();
    assert!(matches!(
        solver.errors(),
        [ErrorMessage::PropertyMissing { name, .. }] if *name == b
    ));
}

#[test]
fn test_depth_limit_abandons_path() {
    let mut solver = Solver::with_options(SolverOptions {
        max_flow_depth: 2,
        ..SolverOptions::default()
    });
    let types = solver.types_mut();
    let n1 = types.array(TypeId::NUMBER);
    let n2 = types.array(n1);
    let n3 = types.array(n2);
    let s1 = types.array(TypeId::STRING);
    let s2 = types.array(s1);
    let s3 = types.array(s2);
    solver.flow(n3, s3).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::RecursionLimit {
            lower: n1,
            upper: s1,
        }]
    );
}

#[test]
fn test_any_into_use_reaches_output() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let name = solver.types_mut().intern_string("x");
    let read = solver.types_mut().get_prop(name, v_ty);
    solver.flow(TypeId::ANY, read).unwrap();
    assert!(solver.errors().is_empty());
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::ANY]);
}

#[test]
fn test_polymorphic_producer_is_instantiated() {
    let mut solver = Solver::new();
    let t = solver.types_mut().intern_string("T");
    let param = solver.types_mut().param(t);
    let identity_body = solver.types_mut().function(vec![param], param);
    let identity = solver.types_mut().poly(vec![t], identity_body);
    let concrete = solver
        .types_mut()
        .function(vec![TypeId::NUMBER], TypeId::NUMBER);

    solver.flow(identity, concrete).unwrap();
    assert!(solver.errors().is_empty());
    assert_eq!(solver.variable_count(), 1);
    assert_eq!(solver.cache_stats().instantiation_misses, 1);
}

#[test]
fn test_polymorphic_consumer_keeps_params_rigid() {
    let mut solver = Solver::new();
    let t = solver.types_mut().intern_string("T");
    let param = solver.types_mut().param(t);
    let poly = solver.types_mut().poly(vec![t], param);
    solver.flow(TypeId::NUMBER, poly).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::Incompatible {
            lower: TypeId::NUMBER,
            upper: param,
            use_op: UseOp::Unknown,
        }]
    );
}

#[test]
fn test_poly_into_poly_aligns_parameters() {
    let mut solver = Solver::new();
    let t = solver.types_mut().intern_string("T");
    let u = solver.types_mut().intern_string("U");
    let pt = solver.types_mut().param(t);
    let pu = solver.types_mut().param(u);
    let ft = solver.types_mut().function(vec![pt], pt);
    let fu = solver.types_mut().function(vec![pu], pu);
    let poly_t = solver.types_mut().poly(vec![t], ft);
    let poly_u = solver.types_mut().poly(vec![u], fu);
    solver.flow(poly_t, poly_u).unwrap();
    assert!(solver.errors().is_empty());

    let poly_tu = solver.types_mut().poly(vec![t, u], ft);
    solver.flow(poly_tu, poly_u).unwrap();
    assert_eq!(solver.errors().len(), 1);
    assert!(matches!(solver.errors()[0], ErrorMessage::Incompatible { .. }));
}

#[test]
fn test_unify_objects_componentwise() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let a = solver.types_mut().intern_string("a");
    let left = solver.types_mut().object(vec![PropertyInfo::new(a, v_ty)]);
    let right = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    solver.unify(left, right).unwrap();
    assert!(solver.errors().is_empty());
    assert_eq!(solver.resolved_type(v).unwrap(), Some(TypeId::NUMBER));
}

#[test]
fn test_unify_mismatched_functions_flows_both_ways() {
    let mut solver = Solver::new();
    let one = solver.types_mut().function(vec![TypeId::NUMBER], TypeId::VOID);
    let two = solver
        .types_mut()
        .function(vec![TypeId::NUMBER, TypeId::NUMBER], TypeId::VOID);
    solver.unify(one, two).unwrap();
    // The shorter function flows into the longer one; the reverse fails.
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::Incompatible {
            lower: two,
            upper: one,
            use_op: UseOp::Unknown,
        }]
    );
}

#[test]
fn test_var_to_var_flow_links_without_merging() {
    let mut solver = Solver::new();
    let (a, a_ty) = var(&mut solver);
    let (b, b_ty) = var(&mut solver);
    solver.flow(a_ty, b_ty).unwrap();
    solver.add_lower_bound(a, TypeId::NUMBER, UseOp::Unknown).unwrap();
    assert_eq!(solver.lower_bounds(b).unwrap(), vec![TypeId::NUMBER]);
    assert_eq!(solver.lower_bounds(a).unwrap(), vec![TypeId::NUMBER]);
    assert_ne!(
        solver.graph.find_root(a).unwrap(),
        solver.graph.find_root(b).unwrap()
    );

    solver.add_upper_bound(b, TypeId::STRING, UseOp::Unknown).unwrap();
    assert_eq!(solver.errors().len(), 1);
    assert_eq!(solver.upper_bounds(a).unwrap(), vec![TypeId::STRING]);
}
