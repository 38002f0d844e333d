//! Structural traversal over interned types.
//!
//! Two shapes of traversal are needed by the solver:
//!
//! - read-only child enumeration (`children`, `collect_vars`), used by the
//!   resolution walk and by the formatter;
//! - rebuilding folds (`TypeFolder` + `super_fold`), used by substitution
//!   and by concretization of fully resolved types.
//!
//! `super_fold` handles every compound payload once, so a folder only
//! overrides the leaves it cares about.

use smallvec::SmallVec;

use crate::graph::FxIndexSet;
use crate::intern::TypeInterner;
use crate::types::{PropertyInfo, TyVarId, TypeData, TypeFlags, TypeId};

/// Direct children of a payload, in declaration order.
pub fn children(types: &TypeInterner, data: TypeData) -> SmallVec<[TypeId; 8]> {
    let mut out = SmallVec::new();
    match data {
        TypeData::Intrinsic(_)
        | TypeData::Literal(_)
        | TypeData::Var(_)
        | TypeData::Param(_)
        | TypeData::Internal(_) => {}
        TypeData::Union(list) | TypeData::Intersection(list) => {
            out.extend(types.type_list(list).iter().copied());
        }
        TypeData::Object(shape) => {
            out.extend(types.object_shape(shape).properties.iter().map(|p| p.type_id));
        }
        TypeData::Array(elem) => out.push(elem),
        TypeData::Function(shape) => {
            let shape = types.function_shape(shape);
            out.extend(shape.params.iter().copied());
            out.push(shape.return_type);
        }
        TypeData::Application(app) => {
            if let Some(app) = types.type_application(app) {
                out.extend(app.args.iter().copied());
            }
        }
        TypeData::Poly(poly) => {
            if let Some(poly) = types.poly_type(poly) {
                out.push(poly.body);
            }
        }
        TypeData::GetProp { out: result, .. } => out.push(result),
        TypeData::Call { args, out: result } => {
            out.extend(types.type_list(args).iter().copied());
            out.push(result);
        }
        TypeData::Add { rhs, out: result, .. } => {
            out.push(rhs);
            out.push(result);
        }
        TypeData::Located { inner, .. } => out.push(inner),
    }
    out
}

/// Every variable mentioned anywhere in `ty`, in first-seen order.
pub fn collect_vars(types: &TypeInterner, ty: TypeId) -> FxIndexSet<TyVarId> {
    let mut vars = FxIndexSet::default();
    let mut stack = vec![ty];
    let mut seen = rustc_hash::FxHashSet::default();
    while let Some(current) = stack.pop() {
        if !types.flags(current).contains(TypeFlags::HAS_VARS) || !seen.insert(current) {
            continue;
        }
        match types.lookup(current) {
            Some(TypeData::Var(id)) => {
                vars.insert(id);
            }
            Some(data) => {
                // Reverse so the left-most child is visited first.
                stack.extend(children(types, data).into_iter().rev());
            }
            None => {}
        }
    }
    vars
}

// =============================================================================
// Folding
// =============================================================================

/// A rebuilding traversal.
pub trait TypeFolder {
    fn interner(&mut self) -> &mut TypeInterner;

    /// Fold one type. Implementations handle their leaves and delegate the
    /// rest to [`super_fold`].
    fn fold_type(&mut self, ty: TypeId) -> TypeId;
}

/// Rebuild `ty` with every child folded through `folder`.
pub fn super_fold<F: TypeFolder + ?Sized>(folder: &mut F, ty: TypeId) -> TypeId {
    let Some(data) = folder.interner().lookup(ty) else {
        return ty;
    };
    match data {
        TypeData::Intrinsic(_)
        | TypeData::Literal(_)
        | TypeData::Var(_)
        | TypeData::Param(_)
        | TypeData::Internal(_) => ty,
        TypeData::Union(list) => {
            let members = folder.interner().type_list(list);
            let folded = members.iter().map(|&m| folder.fold_type(m)).collect();
            folder.interner().union(folded)
        }
        TypeData::Intersection(list) => {
            let members = folder.interner().type_list(list);
            let folded = members.iter().map(|&m| folder.fold_type(m)).collect();
            folder.interner().intersection(folded)
        }
        TypeData::Object(shape) => {
            let shape = folder.interner().object_shape(shape);
            let properties = shape
                .properties
                .iter()
                .map(|p| PropertyInfo {
                    type_id: folder.fold_type(p.type_id),
                    ..p.clone()
                })
                .collect();
            folder.interner().object(properties)
        }
        TypeData::Array(elem) => {
            let elem = folder.fold_type(elem);
            folder.interner().array(elem)
        }
        TypeData::Function(shape) => {
            let shape = folder.interner().function_shape(shape);
            let params = shape.params.iter().map(|&p| folder.fold_type(p)).collect();
            let ret = folder.fold_type(shape.return_type);
            folder.interner().function(params, ret)
        }
        TypeData::Application(app) => match folder.interner().type_application(app) {
            Some(app) => {
                let args = app.args.iter().map(|&a| folder.fold_type(a)).collect();
                folder.interner().application(app.def, args)
            }
            None => ty,
        },
        TypeData::Poly(poly) => match folder.interner().poly_type(poly) {
            Some(poly) => {
                let body = folder.fold_type(poly.body);
                folder.interner().poly(poly.params.clone(), body)
            }
            None => ty,
        },
        TypeData::GetProp { name, out } => {
            let out = folder.fold_type(out);
            folder.interner().get_prop(name, out)
        }
        TypeData::Call { args, out } => {
            let args = folder.interner().type_list(args);
            let args = args.iter().map(|&a| folder.fold_type(a)).collect();
            let out = folder.fold_type(out);
            folder.interner().call(args, out)
        }
        TypeData::Add { rhs, out, site } => {
            let rhs = folder.fold_type(rhs);
            let out = folder.fold_type(out);
            folder.interner().add(rhs, out, site)
        }
        TypeData::Located { inner, span } => {
            let inner = folder.fold_type(inner);
            folder.interner().reposition(span, inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_vars_finds_nested_variables_once() {
        let mut types = TypeInterner::new();
        let a = types.var(TyVarId(0));
        let b = types.var(TyVarId(1));
        let arr = types.array(a);
        let f = types.function(vec![arr, b], a);
        let vars = collect_vars(&types, f);
        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec![TyVarId(0), TyVarId(1)]);
    }

    #[test]
    fn children_of_call_include_out() {
        let mut types = TypeInterner::new();
        let out = types.var(TyVarId(3));
        let call = types.call(vec![TypeId::NUMBER], out);
        let data = types.lookup(call).unwrap();
        assert_eq!(children(&types, data).as_slice(), &[TypeId::NUMBER, out]);
    }
}
