//! Type interning for structural deduplication.
//!
//! This module implements the type interning engine that converts
//! `TypeData` structures into lightweight `TypeId` handles.
//!
//! Benefits:
//! - O(1) type equality (just compare `TypeId` values)
//! - Memory efficient (each unique structure stored once)
//! - Cache-friendly (work with u32 arrays instead of heap objects)
//!
//! The interner is owned by a single solver session, so construction takes
//! `&mut self` and lookups are plain indexing.

use flowsolve_common::interner::{Atom, Interner};
use flowsolve_common::span::Span;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::hash::Hash;
use std::sync::Arc;

use crate::def::DefId;
use crate::types::*;

const TYPE_LIST_INLINE: usize = 8;

type TypeListBuffer = SmallVec<[TypeId; TYPE_LIST_INLINE]>;

struct SliceInterner<T> {
    items: Vec<Arc<[T]>>,
    map: FxHashMap<Arc<[T]>, u32>,
}

impl<T> SliceInterner<T>
where
    T: Eq + Hash,
{
    fn new() -> Self {
        let empty: Arc<[T]> = Arc::from(Vec::new());
        let mut map = FxHashMap::default();
        map.insert(empty.clone(), 0);
        SliceInterner {
            items: vec![empty],
            map,
        }
    }

    fn intern(&mut self, items: Vec<T>) -> u32 {
        if items.is_empty() {
            return 0;
        }

        if let Some(&id) = self.map.get(items.as_slice()) {
            return id;
        }

        let arc: Arc<[T]> = items.into();
        let id = self.items.len() as u32;
        self.items.push(arc.clone());
        self.map.insert(arc, id);
        id
    }

    fn get(&self, id: u32) -> Arc<[T]> {
        self.items
            .get(id as usize)
            .unwrap_or(&self.items[0])
            .clone()
    }
}

struct ValueInterner<T> {
    items: Vec<Arc<T>>,
    map: FxHashMap<Arc<T>, u32>,
}

impl<T> ValueInterner<T>
where
    T: Eq + Hash,
{
    fn new() -> Self {
        ValueInterner {
            items: Vec::new(),
            map: FxHashMap::default(),
        }
    }

    fn intern(&mut self, value: T) -> u32 {
        if let Some(&id) = self.map.get(&value) {
            return id;
        }

        let arc = Arc::new(value);
        let id = self.items.len() as u32;
        self.items.push(arc.clone());
        self.map.insert(arc, id);
        id
    }

    fn get(&self, id: u32) -> Option<Arc<T>> {
        self.items.get(id as usize).cloned()
    }
}

/// Type interning table for one solver session.
pub struct TypeInterner {
    types: Vec<TypeData>,
    flags: Vec<TypeFlags>,
    map: FxHashMap<TypeData, TypeId>,
    /// String interner for property names, string literals and labels
    pub string_interner: Interner,
    type_lists: SliceInterner<TypeId>,
    object_shapes: ValueInterner<ObjectShape>,
    function_shapes: ValueInterner<FunctionShape>,
    applications: ValueInterner<TypeApplication>,
    polys: ValueInterner<PolyType>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    /// Create a new type interner with pre-registered intrinsics
    pub fn new() -> Self {
        let mut string_interner = Interner::new();
        string_interner.intern_common();
        let mut interner = TypeInterner {
            types: Vec::with_capacity(1024),
            flags: Vec::with_capacity(1024),
            map: FxHashMap::default(),
            string_interner,
            type_lists: SliceInterner::new(),
            object_shapes: ValueInterner::new(),
            function_shapes: ValueInterner::new(),
            applications: ValueInterner::new(),
            polys: ValueInterner::new(),
        };
        for kind in IntrinsicKind::ALL {
            let id = interner.intern(TypeData::Intrinsic(kind));
            debug_assert_eq!(id, kind.type_id());
        }
        interner
    }

    // -------------------------------------------------------------------------
    // Strings
    // -------------------------------------------------------------------------

    /// Intern a string into an Atom.
    pub fn intern_string(&mut self, s: &str) -> Atom {
        self.string_interner.intern(s)
    }

    /// Resolve an Atom back to its string value.
    pub fn resolve_atom(&self, atom: Atom) -> &str {
        self.string_interner.resolve(atom)
    }

    // -------------------------------------------------------------------------
    // Core interning and lookup
    // -------------------------------------------------------------------------

    pub fn intern(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.map.get(&data) {
            return id;
        }
        let flags = self.compute_flags(&data);
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        self.flags.push(flags);
        self.map.insert(data, id);
        id
    }

    #[inline]
    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        self.types.get(id.0 as usize).copied()
    }

    /// Look up the payload with any `Located` wrapper removed.
    #[inline]
    pub fn lookup_stripped(&self, id: TypeId) -> Option<TypeData> {
        self.lookup(self.strip(id))
    }

    #[inline]
    pub fn flags(&self, id: TypeId) -> TypeFlags {
        self.flags.get(id.0 as usize).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.len() <= IntrinsicKind::ALL.len()
    }

    pub fn type_list(&self, id: TypeListId) -> Arc<[TypeId]> {
        self.type_lists.get(id.0)
    }

    pub fn object_shape(&self, id: ObjectShapeId) -> Arc<ObjectShape> {
        self.object_shapes
            .get(id.0)
            .unwrap_or_else(|| Arc::new(ObjectShape::default()))
    }

    pub fn function_shape(&self, id: FunctionShapeId) -> Arc<FunctionShape> {
        self.function_shapes.get(id.0).unwrap_or_else(|| {
            Arc::new(FunctionShape {
                params: Vec::new(),
                return_type: TypeId::ANY,
            })
        })
    }

    pub fn type_application(&self, id: ApplicationId) -> Option<Arc<TypeApplication>> {
        self.applications.get(id.0)
    }

    pub fn poly_type(&self, id: PolyId) -> Option<Arc<PolyType>> {
        self.polys.get(id.0)
    }

    fn compute_flags(&self, data: &TypeData) -> TypeFlags {
        let children = |ids: &[TypeId]| {
            ids.iter()
                .fold(TypeFlags::empty(), |acc, &id| acc | self.flags(id))
                & !TypeFlags::IS_USE
        };
        match *data {
            TypeData::Intrinsic(_) | TypeData::Literal(_) => TypeFlags::empty(),
            TypeData::Var(_) => TypeFlags::HAS_VARS,
            TypeData::Param(_) => TypeFlags::HAS_PARAMS,
            TypeData::Internal(_) => TypeFlags::HAS_INTERNAL,
            TypeData::Union(list) | TypeData::Intersection(list) => {
                children(&self.type_list(list))
            }
            TypeData::Object(shape) => {
                let shape = self.object_shape(shape);
                let ids: SmallVec<[TypeId; 8]> =
                    shape.properties.iter().map(|p| p.type_id).collect();
                children(&ids)
            }
            TypeData::Array(elem) => children(&[elem]),
            TypeData::Function(shape) => {
                let shape = self.function_shape(shape);
                let mut ids: SmallVec<[TypeId; 8]> = shape.params.iter().copied().collect();
                ids.push(shape.return_type);
                children(&ids)
            }
            TypeData::Application(app) => match self.type_application(app) {
                Some(app) => children(&app.args),
                None => TypeFlags::empty(),
            },
            TypeData::Poly(poly) => match self.poly_type(poly) {
                Some(poly) => children(&[poly.body]),
                None => TypeFlags::empty(),
            },
            TypeData::GetProp { out, .. } => children(&[out]) | TypeFlags::IS_USE,
            TypeData::Call { args, out } => {
                let mut ids: SmallVec<[TypeId; 8]> = self.type_list(args).iter().copied().collect();
                ids.push(out);
                children(&ids) | TypeFlags::IS_USE
            }
            TypeData::Add { rhs, out, .. } => children(&[rhs, out]) | TypeFlags::IS_USE,
            TypeData::Located { inner, .. } => self.flags(inner) | TypeFlags::HAS_LOCATION,
        }
    }

    // -------------------------------------------------------------------------
    // Location metadata
    // -------------------------------------------------------------------------

    /// Remove any `Located` wrapper.
    #[inline]
    pub fn strip(&self, mut id: TypeId) -> TypeId {
        while let Some(TypeData::Located { inner, .. }) = self.lookup(id) {
            id = inner;
        }
        id
    }

    /// Attach `span` to `ty`, replacing any previous location.
    ///
    /// Idempotent, and the stripped identity of the result equals the
    /// stripped identity of `ty`.
    pub fn reposition(&mut self, span: Span, ty: TypeId) -> TypeId {
        let inner = self.strip(ty);
        self.intern(TypeData::Located { inner, span })
    }

    /// The span attached to `ty`, if any.
    pub fn span_of(&self, ty: TypeId) -> Option<Span> {
        match self.lookup(ty) {
            Some(TypeData::Located { span, .. }) => Some(span),
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    pub fn intrinsic(&self, kind: IntrinsicKind) -> TypeId {
        kind.type_id()
    }

    pub fn literal_number(&mut self, value: f64) -> TypeId {
        self.intern(TypeData::Literal(LiteralValue::Number(OrderedFloat(value))))
    }

    pub fn literal_string(&mut self, value: &str) -> TypeId {
        let atom = self.intern_string(value);
        self.intern(TypeData::Literal(LiteralValue::String(atom)))
    }

    pub fn literal_boolean(&mut self, value: bool) -> TypeId {
        self.intern(TypeData::Literal(LiteralValue::Boolean(value)))
    }

    pub fn var(&mut self, id: TyVarId) -> TypeId {
        self.intern(TypeData::Var(id))
    }

    pub fn param(&mut self, name: Atom) -> TypeId {
        self.intern(TypeData::Param(name))
    }

    pub fn internal(&mut self, label: &str) -> TypeId {
        let atom = self.intern_string(label);
        self.intern(TypeData::Internal(atom))
    }

    pub fn type_list_id(&mut self, members: Vec<TypeId>) -> TypeListId {
        TypeListId(self.type_lists.intern(members))
    }

    /// Intern a union type, flattening nested unions and deduplicating
    /// members on their stripped identity. Member order is preserved since
    /// speculation tries alternatives in order.
    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat: TypeListBuffer = SmallVec::new();
        for member in members {
            self.push_member(&mut flat, member, true);
        }
        if flat.iter().any(|&m| self.strip(m) == TypeId::ANY) {
            return TypeId::ANY;
        }
        if flat.iter().any(|&m| self.strip(m) == TypeId::MIXED) {
            return TypeId::MIXED;
        }
        flat.retain(|m| self.strip(*m) != TypeId::EMPTY);
        match flat.len() {
            0 => TypeId::EMPTY,
            1 => flat[0],
            _ => {
                let list = self.type_list_id(flat.into_vec());
                self.intern(TypeData::Union(list))
            }
        }
    }

    pub fn union2(&mut self, left: TypeId, right: TypeId) -> TypeId {
        self.union(vec![left, right])
    }

    /// Intern an intersection type. Object members are not merged: each
    /// member stays a separate alternative for speculation.
    pub fn intersection(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat: TypeListBuffer = SmallVec::new();
        for member in members {
            self.push_member(&mut flat, member, false);
        }
        if flat.iter().any(|&m| self.strip(m) == TypeId::EMPTY) {
            return TypeId::EMPTY;
        }
        if flat.iter().any(|&m| self.strip(m) == TypeId::ANY) {
            return TypeId::ANY;
        }
        flat.retain(|m| self.strip(*m) != TypeId::MIXED);
        match flat.len() {
            0 => TypeId::MIXED,
            1 => flat[0],
            _ => {
                let list = self.type_list_id(flat.into_vec());
                self.intern(TypeData::Intersection(list))
            }
        }
    }

    pub fn intersection2(&mut self, left: TypeId, right: TypeId) -> TypeId {
        self.intersection(vec![left, right])
    }

    fn push_member(&self, flat: &mut TypeListBuffer, member: TypeId, union: bool) {
        let nested = match (self.lookup_stripped(member), union) {
            (Some(TypeData::Union(list)), true) | (Some(TypeData::Intersection(list)), false) => {
                Some(self.type_list(list))
            }
            _ => None,
        };
        match nested {
            Some(members) => {
                for &m in members.iter() {
                    self.push_member(flat, m, union);
                }
            }
            None => {
                let stripped = self.strip(member);
                if !flat.iter().any(|&m| self.strip(m) == stripped) {
                    flat.push(member);
                }
            }
        }
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.intern(TypeData::Array(element))
    }

    /// Intern an object type with properties
    pub fn object(&mut self, mut properties: Vec<PropertyInfo>) -> TypeId {
        // Sort by property name for consistent hashing
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        properties.dedup_by(|a, b| a.name == b.name);
        let shape_id = ObjectShapeId(self.object_shapes.intern(ObjectShape { properties }));
        self.intern(TypeData::Object(shape_id))
    }

    pub fn function(&mut self, params: Vec<TypeId>, return_type: TypeId) -> TypeId {
        let shape_id = FunctionShapeId(self.function_shapes.intern(FunctionShape {
            params,
            return_type,
        }));
        self.intern(TypeData::Function(shape_id))
    }

    pub fn application(&mut self, def: DefId, args: Vec<TypeId>) -> TypeId {
        let app_id = ApplicationId(self.applications.intern(TypeApplication { def, args }));
        self.intern(TypeData::Application(app_id))
    }

    pub fn poly(&mut self, params: Vec<Atom>, body: TypeId) -> TypeId {
        if params.is_empty() {
            return body;
        }
        let poly_id = PolyId(self.polys.intern(PolyType { params, body }));
        self.intern(TypeData::Poly(poly_id))
    }

    pub fn get_prop(&mut self, name: Atom, out: TypeId) -> TypeId {
        self.intern(TypeData::GetProp { name, out })
    }

    pub fn call(&mut self, args: Vec<TypeId>, out: TypeId) -> TypeId {
        let args = self.type_list_id(args);
        self.intern(TypeData::Call { args, out })
    }

    pub fn add(&mut self, rhs: TypeId, out: TypeId, site: Span) -> TypeId {
        self.intern(TypeData::Add { rhs, out, site })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// The variable behind `ty`, looking through locations.
    #[inline]
    pub fn as_var(&self, ty: TypeId) -> Option<TyVarId> {
        match self.lookup_stripped(ty) {
            Some(TypeData::Var(id)) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn is_var(&self, ty: TypeId) -> bool {
        self.as_var(ty).is_some()
    }

    pub fn as_literal(&self, ty: TypeId) -> Option<LiteralValue> {
        match self.lookup_stripped(ty) {
            Some(TypeData::Literal(value)) => Some(value),
            _ => None,
        }
    }

    /// Union or intersection members, if `ty` is one.
    pub fn members(&self, ty: TypeId) -> Option<Arc<[TypeId]>> {
        match self.lookup_stripped(ty) {
            Some(TypeData::Union(list) | TypeData::Intersection(list)) => {
                Some(self.type_list(list))
            }
            _ => None,
        }
    }

    /// Whether a variable must not be resolved to `ty`.
    pub fn is_unify_unsafe(&self, ty: TypeId) -> bool {
        self.flags(ty).contains(TypeFlags::HAS_INTERNAL)
    }
}

#[cfg(test)]
#[path = "../tests/intern_tests.rs"]
mod tests;
