use super::*;
use crate::def::DefinitionInfo;
use crate::types::{UseOp, VarOrigin};

fn var(solver: &mut Solver<'_>) -> (TyVarId, TypeId) {
    let id = solver.create_variable(VarOrigin::new(Span::dummy()));
    (id, solver.var_type(id))
}

#[test]
fn test_root_set_is_sorted_and_deduplicated() {
    let set: RootSet = [
        TypeRoot::Array,
        TypeRoot::Intrinsic(IntrinsicKind::Number),
        TypeRoot::Array,
    ]
    .into_iter()
    .collect();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&TypeRoot::Array));

    let array_only: RootSet = [TypeRoot::Array].into_iter().collect();
    assert!(set.is_superset(&array_only));
    assert!(!array_only.is_superset(&set));
    assert!(array_only.is_superset(&RootSet::default()));
}

#[test]
fn test_loop_detection_requires_superset_roots() {
    let mut guard = TypeAppExpansion::default();
    let def = DefId(1);
    let wide: RootSet = [TypeRoot::Array, TypeRoot::Object].into_iter().collect();
    let narrow: RootSet = [TypeRoot::Array].into_iter().collect();
    let other: RootSet = [TypeRoot::Function].into_iter().collect();

    assert!(!guard.is_loop(def, std::slice::from_ref(&narrow)));
    guard.push(def, vec![wide]);
    assert!(guard.is_loop(def, std::slice::from_ref(&narrow)));
    assert!(!guard.is_loop(def, std::slice::from_ref(&other)));
    assert!(!guard.is_loop(DefId(2), std::slice::from_ref(&narrow)));
    assert!(!guard.is_loop(def, &[narrow.clone(), narrow]));

    guard.pop();
    assert!(guard.is_empty());
}

#[test]
fn test_const_fold_guard_widens_repeats() {
    let mut guard = ConstFoldGuard::default();
    let site = Span::new(0, 4, 9);
    assert_eq!(guard.check(site, FoldReason::Addition, 1), FoldDecision::Fold);
    let mark = guard.snapshot();
    assert_eq!(guard.check(site, FoldReason::Addition, 1), FoldDecision::Widen);
    // Reasons are counted separately.
    assert_eq!(guard.check(site, FoldReason::Concatenation, 1), FoldDecision::Fold);
    assert_eq!(guard.count(site, FoldReason::Addition), 2);

    guard.rollback_to(mark);
    assert_eq!(guard.count(site, FoldReason::Addition), 1);
    assert_eq!(guard.count(site, FoldReason::Concatenation), 0);
}

#[test]
fn test_const_folds_outside_speculation_are_not_logged() {
    let mut solver = Solver::new();
    for i in 0..1000 {
        solver.const_fold(Span::new(0, i, i + 1), FoldReason::Addition);
    }
    assert_eq!(solver.const_folds.undo_len(), 0);
    assert_eq!(
        solver.const_folds.count(Span::new(0, 7, 8), FoldReason::Addition),
        1
    );

    // The log lives only as long as the outermost snapshot.
    let outer = solver.const_folds.snapshot();
    let inner = solver.const_folds.snapshot();
    solver.const_fold(Span::new(1, 0, 1), FoldReason::Addition);
    solver.const_folds.rollback_to(inner);
    solver.const_fold(Span::new(1, 0, 1), FoldReason::Concatenation);
    assert_eq!(solver.const_folds.undo_len(), 1);
    solver.const_folds.rollback_to(outer);
    assert_eq!(solver.const_folds.undo_len(), 0);
    assert_eq!(
        solver.const_folds.count(Span::new(1, 0, 1), FoldReason::Concatenation),
        0
    );
}

#[test]
fn test_root_set_looks_through_variables() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let root = solver.root_set(v_ty).unwrap();
    assert_eq!(root, RootSet::from_iter([TypeRoot::Var(v)]));

    let one = solver.types_mut().literal_number(1.0);
    let arr = solver.types_mut().array(TypeId::STRING);
    solver.add_lower_bound(v, one, UseOp::Unknown).unwrap();
    solver.add_lower_bound(v, arr, UseOp::Unknown).unwrap();
    let root = solver.root_set(v_ty).unwrap();
    assert_eq!(
        root,
        RootSet::from_iter([TypeRoot::Intrinsic(IntrinsicKind::Number), TypeRoot::Array])
    );
}

#[test]
fn test_increment_loop_terminates() {
    // x = 0; y = x + 1; x = y
    let mut solver = Solver::new();
    let (x, x_ty) = var(&mut solver);
    let (_, y_ty) = var(&mut solver);
    let zero = solver.types_mut().literal_number(0.0);
    let one = solver.types_mut().literal_number(1.0);
    let site = Span::new(0, 20, 25);
    let plus_one = solver.types_mut().add(one, y_ty, site);

    solver.add_lower_bound(x, zero, UseOp::Unknown).unwrap();
    solver.flow(x_ty, plus_one).unwrap();
    solver.flow(y_ty, x_ty).unwrap();

    assert!(solver.errors().is_empty());
    assert_eq!(
        solver.lower_bounds(x).unwrap(),
        vec![zero, one, TypeId::NUMBER]
    );
    assert_eq!(solver.const_folds.count(site, FoldReason::Addition), 2);
}

#[test]
fn test_growing_application_is_widened() {
    // type T<X> = T<Array<X>>
    let mut solver = Solver::new();
    let name = solver.types_mut().intern_string("T");
    let x = solver.types_mut().intern_string("X");
    let def = solver.defs_mut().reserve(name, vec![x]);
    let param = solver.types_mut().param(x);
    let grown = solver.types_mut().array(param);
    let body = solver.types_mut().application(def, vec![grown]);
    solver.defs_mut().set_body(def, body);

    let app = solver.types_mut().application(def, vec![TypeId::NUMBER]);
    solver.flow(app, TypeId::STRING).unwrap();
    assert!(solver.errors().is_empty());
    assert!(solver.expansion.is_empty());
    assert_eq!(solver.cache_stats().expansion_misses, 2);
}

#[test]
fn test_application_expands_to_body() {
    let mut solver = Solver::new();
    let name = solver.types_mut().intern_string("List");
    let t = solver.types_mut().intern_string("T");
    let param = solver.types_mut().param(t);
    let body = solver.types_mut().array(param);
    let def = solver.defs_mut().register(DefinitionInfo::new(name, vec![t], body));
    let list_number = solver.types_mut().application(def, vec![TypeId::NUMBER]);
    let numbers = solver.types_mut().array(TypeId::NUMBER);

    solver.flow(list_number, numbers).unwrap();
    solver.flow(numbers, list_number).unwrap();
    assert!(solver.errors().is_empty());
    assert!(solver.expansion.is_empty());
}
