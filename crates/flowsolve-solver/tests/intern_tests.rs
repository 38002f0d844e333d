use super::*;

#[test]
fn test_intrinsics_are_preregistered() {
    let interner = TypeInterner::new();
    for kind in IntrinsicKind::ALL {
        assert_eq!(interner.lookup(kind.type_id()), Some(TypeData::Intrinsic(kind)));
    }
    assert!(interner.is_empty());
}

#[test]
fn test_structural_deduplication() {
    let mut interner = TypeInterner::new();
    let a = interner.intern_string("a");
    let o1 = interner.object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let o2 = interner.object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    assert_eq!(o1, o2);
    let o3 = interner.object(vec![PropertyInfo::new(a, TypeId::STRING)]);
    assert_ne!(o1, o3);
}

#[test]
fn test_object_properties_sorted() {
    let mut interner = TypeInterner::new();
    let b = interner.intern_string("b");
    let a = interner.intern_string("a");
    let o = interner.object(vec![
        PropertyInfo::new(b, TypeId::STRING),
        PropertyInfo::new(a, TypeId::NUMBER),
    ]);
    let Some(TypeData::Object(shape)) = interner.lookup(o) else {
        panic!("expected object");
    };
    let shape = interner.object_shape(shape);
    assert_eq!(shape.properties[0].name, a);
    assert_eq!(shape.property(b).map(|p| p.type_id), Some(TypeId::STRING));
}

#[test]
fn test_union_flattens_and_dedups_preserving_order() {
    let mut interner = TypeInterner::new();
    let inner = interner.union2(TypeId::STRING, TypeId::NUMBER);
    let u = interner.union(vec![TypeId::BOOLEAN, inner, TypeId::STRING]);
    let members = interner.members(u).unwrap();
    assert_eq!(&*members, &[TypeId::BOOLEAN, TypeId::STRING, TypeId::NUMBER]);
}

#[test]
fn test_union_special_cases() {
    let mut interner = TypeInterner::new();
    assert_eq!(interner.union(vec![]), TypeId::EMPTY);
    assert_eq!(interner.union(vec![TypeId::NUMBER]), TypeId::NUMBER);
    assert_eq!(interner.union2(TypeId::EMPTY, TypeId::NUMBER), TypeId::NUMBER);
    assert_eq!(interner.union2(TypeId::ANY, TypeId::NUMBER), TypeId::ANY);
}

#[test]
fn test_intersection_keeps_object_members_separate() {
    let mut interner = TypeInterner::new();
    let a = interner.intern_string("a");
    let o1 = interner.object(vec![PropertyInfo::new(a, TypeId::NUMBER)]);
    let o2 = interner.object(vec![PropertyInfo::new(a, TypeId::STRING)]);
    let i = interner.intersection2(o1, o2);
    assert!(matches!(interner.lookup(i), Some(TypeData::Intersection(_))));
    assert_eq!(interner.members(i).map(|m| m.len()), Some(2));
    assert_eq!(interner.intersection(vec![]), TypeId::MIXED);
}

#[test]
fn test_reposition_is_idempotent_and_location_only() {
    let mut interner = TypeInterner::new();
    let span = Span::new(0, 10, 20);
    let located = interner.reposition(span, TypeId::NUMBER);
    assert_ne!(located, TypeId::NUMBER);
    assert_eq!(interner.strip(located), TypeId::NUMBER);
    assert_eq!(interner.reposition(span, located), located);
    let moved = interner.reposition(Span::new(0, 30, 31), located);
    assert_eq!(interner.strip(moved), TypeId::NUMBER);
    assert_eq!(interner.span_of(moved), Some(Span::new(0, 30, 31)));
}

#[test]
fn test_flags() {
    let mut interner = TypeInterner::new();
    let v = interner.var(TyVarId(0));
    let arr = interner.array(v);
    assert!(interner.flags(arr).contains(TypeFlags::HAS_VARS));
    let t = interner.intern_string("T");
    let p = interner.param(t);
    let f = interner.function(vec![p], TypeId::NUMBER);
    assert!(interner.flags(f).contains(TypeFlags::HAS_PARAMS));
    let x = interner.intern_string("x");
    let use_t = interner.get_prop(x, v);
    assert!(interner.flags(use_t).contains(TypeFlags::IS_USE));
    assert!(!interner.flags(arr).contains(TypeFlags::IS_USE));
    let placeholder = interner.internal("hole");
    assert!(interner.is_unify_unsafe(placeholder));
}

#[test]
fn test_literal_base() {
    let mut interner = TypeInterner::new();
    let three = interner.literal_number(3.0);
    assert_eq!(
        interner.as_literal(three).map(LiteralValue::base),
        Some(IntrinsicKind::Number)
    );
    assert_eq!(interner.literal_number(3.0), three);
    assert_ne!(interner.literal_number(-0.0), interner.literal_number(0.0));
}
