use super::*;
use crate::types::{PropertyInfo, TyVarId, VarOrigin};

fn var(solver: &mut Solver<'_>) -> (TyVarId, TypeId) {
    let id = solver.create_variable(VarOrigin::new(Span::dummy()));
    (id, solver.var_type(id))
}

fn incompatible(lower: TypeId, upper: TypeId) -> ErrorMessage {
    ErrorMessage::Incompatible {
        lower,
        upper,
        use_op: UseOp::Unknown,
    }
}

#[test]
fn test_literal_flows_into_its_base() {
    let mut solver = Solver::new();
    let one = solver.types_mut().literal_number(1.0);
    let hi = solver.types_mut().literal_string("hi");
    solver.flow(one, TypeId::NUMBER).unwrap();
    solver.flow(hi, TypeId::STRING).unwrap();
    assert!(solver.errors().is_empty());

    solver.flow(hi, TypeId::NUMBER).unwrap();
    assert_eq!(solver.errors(), &[incompatible(hi, TypeId::NUMBER)]);
}

#[test]
fn test_distinct_literals_are_incompatible() {
    let mut solver = Solver::new();
    let one = solver.types_mut().literal_number(1.0);
    let two = solver.types_mut().literal_number(2.0);
    solver.flow(one, two).unwrap();
    assert_eq!(solver.errors(), &[incompatible(one, two)]);

    // The base never flows into a literal.
    solver.flow(TypeId::NUMBER, one).unwrap();
    assert_eq!(solver.errors().len(), 2);
}

#[test]
fn test_missing_required_property() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let b = solver.types_mut().intern_string("b");
    let lower = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let upper = solver.types_mut().object(vec![
        PropertyInfo::new(a, TypeId::NUMBER),
        PropertyInfo::new(b, TypeId::STRING),
    ]);
    solver.flow(lower, upper).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::PropertyMissing {
            name: b,
            lower,
            upper,
            use_op: UseOp::Unknown,
        }]
    );
}

#[test]
fn test_optional_property_may_be_absent() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let b = solver.types_mut().intern_string("b");
    let lower = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let upper = solver.types_mut().object(vec![
        PropertyInfo::new(a, TypeId::NUMBER),
        PropertyInfo {
            optional: true,
            ..PropertyInfo::new(b, TypeId::STRING)
        },
    ]);
    solver.flow(lower, upper).unwrap();
    assert!(solver.errors().is_empty());
}

#[test]
fn test_width_subtyping_ignores_extra_properties() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let b = solver.types_mut().intern_string("b");
    let lower = solver.types_mut().object(vec![
        PropertyInfo::new(a, TypeId::NUMBER),
        PropertyInfo::new(b, TypeId::STRING),
    ]);
    let upper = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    solver.flow(lower, upper).unwrap();
    assert!(solver.errors().is_empty());
}

#[test]
fn test_readonly_property_is_covariant() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let wide = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
    let lower = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let upper = solver
        .types_mut()
        .object(vec![PropertyInfo::readonly(a, wide)]);
    solver.flow(lower, upper).unwrap();
    assert!(solver.errors().is_empty());
}

#[test]
fn test_mutable_property_is_invariant() {
    let mut solver = Solver::new();
    let a = solver.types_mut().intern_string("a");
    let wide = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
    let lower = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let upper = solver.types_mut().object(vec![PropertyInfo::new(a, wide)]);
    solver.flow(lower, upper).unwrap();
    assert_eq!(solver.errors(), &[incompatible(TypeId::STRING, TypeId::NUMBER)]);
}

#[test]
fn test_function_params_are_contravariant() {
    let mut solver = Solver::new();
    let wide = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
    let accepts_wide = solver.types_mut().function(vec![wide], TypeId::VOID);
    let accepts_number = solver
        .types_mut()
        .function(vec![TypeId::NUMBER], TypeId::VOID);

    solver.flow(accepts_wide, accepts_number).unwrap();
    assert!(solver.errors().is_empty());

    solver.flow(accepts_number, accepts_wide).unwrap();
    assert_eq!(solver.errors(), &[incompatible(TypeId::STRING, TypeId::NUMBER)]);
}

#[test]
fn test_function_returns_are_covariant() {
    let mut solver = Solver::new();
    let one = solver.types_mut().literal_number(1.0);
    let returns_one = solver.types_mut().function(vec![], one);
    let returns_number = solver.types_mut().function(vec![], TypeId::NUMBER);
    solver.flow(returns_one, returns_number).unwrap();
    assert!(solver.errors().is_empty());
    solver.flow(returns_number, returns_one).unwrap();
    assert_eq!(solver.errors(), &[incompatible(TypeId::NUMBER, one)]);
}

#[test]
fn test_property_read_on_object() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let a = solver.types_mut().intern_string("a");
    let b = solver.types_mut().intern_string("b");
    let obj = solver
        .types_mut()
        .object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let read_a = solver.types_mut().get_prop(a, v_ty);
    solver.flow(obj, read_a).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::NUMBER]);

    let read_b = solver.types_mut().get_prop(b, v_ty);
    solver.flow(obj, read_b).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::PropertyMissing {
            name: b,
            lower: obj,
            upper: read_b,
            use_op: UseOp::Unknown,
        }]
    );
}

#[test]
fn test_array_length() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let length = solver.types_mut().intern_string("length");
    let other = solver.types_mut().intern_string("size");
    let arr = solver.types_mut().array(TypeId::STRING);
    let read = solver.types_mut().get_prop(length, v_ty);
    solver.flow(arr, read).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::NUMBER]);

    let bad = solver.types_mut().get_prop(other, v_ty);
    solver.flow(arr, bad).unwrap();
    assert_eq!(solver.errors(), &[incompatible(arr, bad)]);
}

#[test]
fn test_call_checks_arguments_with_position() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let f = solver
        .types_mut()
        .function(vec![TypeId::NUMBER], TypeId::STRING);
    let call = solver.types_mut().call(vec![TypeId::BOOLEAN], v_ty);
    solver.flow(f, call).unwrap();
    assert_eq!(
        solver.errors(),
        &[ErrorMessage::Incompatible {
            lower: TypeId::BOOLEAN,
            upper: TypeId::NUMBER,
            use_op: UseOp::Argument {
                index: 0,
                span: Span::dummy(),
            },
        }]
    );
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::STRING]);
}

#[test]
fn test_call_with_too_few_arguments() {
    let mut solver = Solver::new();
    let (_, v_ty) = var(&mut solver);
    let f = solver
        .types_mut()
        .function(vec![TypeId::NUMBER], TypeId::STRING);
    let call = solver.types_mut().call(vec![], v_ty);
    solver.flow(f, call).unwrap();
    assert_eq!(solver.errors(), &[incompatible(f, call)]);
}

#[test]
fn test_addition_folds_literals_once_per_site() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let site = Span::new(0, 3, 8);
    let one = solver.types_mut().literal_number(1.0);
    let two = solver.types_mut().literal_number(2.0);
    let five = solver.types_mut().literal_number(5.0);
    let three = solver.types_mut().literal_number(3.0);
    let add_two = solver.types_mut().add(two, v_ty, site);

    solver.flow(one, add_two).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![three]);

    solver.flow(five, add_two).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![three, TypeId::NUMBER]);
    assert!(solver.errors().is_empty());
}

#[test]
fn test_addition_with_number_is_number() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let one = solver.types_mut().literal_number(1.0);
    let add = solver.types_mut().add(TypeId::NUMBER, v_ty, Span::new(0, 0, 1));
    solver.flow(one, add).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::NUMBER]);
}

#[test]
fn test_string_concatenation_folds() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let a = solver.types_mut().literal_string("a");
    let one = solver.types_mut().literal_number(1.0);
    let add = solver.types_mut().add(one, v_ty, Span::new(0, 0, 5));
    solver.flow(a, add).unwrap();
    let a1 = solver.types_mut().literal_string("a1");
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![a1]);
}

#[test]
fn test_addition_of_incompatible_operands() {
    let mut solver = Solver::new();
    let (_, v_ty) = var(&mut solver);
    let add = solver.types_mut().add(TypeId::NUMBER, v_ty, Span::new(0, 0, 1));
    solver.flow(TypeId::BOOLEAN, add).unwrap();
    assert_eq!(solver.errors(), &[incompatible(TypeId::BOOLEAN, add)]);
}

#[test]
fn test_addition_with_unresolved_operand_approximates() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let (_, rhs) = var(&mut solver);
    let one = solver.types_mut().literal_number(1.0);
    let add = solver.types_mut().add(rhs, v_ty, Span::new(0, 0, 1));
    solver.flow(one, add).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![TypeId::NUMBER]);
}

#[test]
fn test_addition_with_resolved_operand_uses_resolution() {
    let mut solver = Solver::new();
    let (v, v_ty) = var(&mut solver);
    let (w, rhs) = var(&mut solver);
    let one = solver.types_mut().literal_number(1.0);
    let two = solver.types_mut().literal_number(2.0);
    let three = solver.types_mut().literal_number(3.0);
    solver.resolve(w, two, UseOp::Unknown).unwrap();
    let add = solver.types_mut().add(rhs, v_ty, Span::new(0, 0, 1));
    solver.flow(one, add).unwrap();
    assert_eq!(solver.lower_bounds(v).unwrap(), vec![three]);
}
