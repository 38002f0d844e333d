//! Core type representation.
//!
//! Types are interned: every structurally distinct `TypeData` is stored once
//! and referred to by a `TypeId`. Compound payloads (member lists, object and
//! function shapes, applications, binders) live in side tables addressed by
//! their own ids so that `TypeData` stays `Copy`.

use bitflags::bitflags;
use flowsolve_common::interner::Atom;
use flowsolve_common::span::Span;
use serde::Serialize;

use crate::def::DefId;

// =============================================================================
// Identifiers
// =============================================================================

/// Interned type handle. Equality is structural identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Top for producers and bottom for consumers; compatible with everything.
    pub const ANY: TypeId = TypeId(0);
    /// Top type: every producer flows into it.
    pub const MIXED: TypeId = TypeId(1);
    /// Bottom type: flows into every consumer.
    pub const EMPTY: TypeId = TypeId(2);
    pub const NUMBER: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);
    pub const BOOLEAN: TypeId = TypeId(5);
    pub const NULL: TypeId = TypeId(6);
    pub const VOID: TypeId = TypeId(7);

    /// Number of pre-registered intrinsic types.
    pub const INTRINSIC_COUNT: u32 = 8;

    #[inline]
    pub fn is_intrinsic(self) -> bool {
        self.0 < Self::INTRINSIC_COUNT
    }
}

/// Type-variable identity: an index into the session's variable arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TyVarId(pub u32);

impl TyVarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeListId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectShapeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShapeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApplicationId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PolyId(pub u32);

// =============================================================================
// Type Data
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IntrinsicKind {
    Any,
    Mixed,
    Empty,
    Number,
    String,
    Boolean,
    Null,
    Void,
}

impl IntrinsicKind {
    pub const ALL: [IntrinsicKind; 8] = [
        IntrinsicKind::Any,
        IntrinsicKind::Mixed,
        IntrinsicKind::Empty,
        IntrinsicKind::Number,
        IntrinsicKind::String,
        IntrinsicKind::Boolean,
        IntrinsicKind::Null,
        IntrinsicKind::Void,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntrinsicKind::Any => "any",
            IntrinsicKind::Mixed => "mixed",
            IntrinsicKind::Empty => "empty",
            IntrinsicKind::Number => "number",
            IntrinsicKind::String => "string",
            IntrinsicKind::Boolean => "boolean",
            IntrinsicKind::Null => "null",
            IntrinsicKind::Void => "void",
        }
    }

    pub fn type_id(self) -> TypeId {
        TypeId(self as u32)
    }
}

/// `f64` wrapper with bitwise equality so literals can be interned.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Number(OrderedFloat),
    String(Atom),
    Boolean(bool),
}

impl LiteralValue {
    /// The primitive a literal widens to.
    pub fn base(self) -> IntrinsicKind {
        match self {
            LiteralValue::Number(_) => IntrinsicKind::Number,
            LiteralValue::String(_) => IntrinsicKind::String,
            LiteralValue::Boolean(_) => IntrinsicKind::Boolean,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyInfo {
    pub name: Atom,
    pub type_id: TypeId,
    pub readonly: bool,
    pub optional: bool,
}

impl PropertyInfo {
    pub fn new(name: Atom, type_id: TypeId) -> Self {
        PropertyInfo {
            name,
            type_id,
            readonly: false,
            optional: false,
        }
    }

    pub fn readonly(name: Atom, type_id: TypeId) -> Self {
        PropertyInfo {
            name,
            type_id,
            readonly: true,
            optional: false,
        }
    }
}

/// Object shape. Properties are kept sorted by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ObjectShape {
    pub properties: Vec<PropertyInfo>,
}

impl ObjectShape {
    pub fn property(&self, name: Atom) -> Option<&PropertyInfo> {
        self.properties
            .binary_search_by(|p| p.name.cmp(&name))
            .ok()
            .map(|idx| &self.properties[idx])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
}

/// A generic definition applied to arguments, e.g. `List<number>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeApplication {
    pub def: DefId,
    pub args: Vec<TypeId>,
}

/// A polymorphic binder `<T, U> body`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PolyType {
    pub params: Vec<Atom>,
    pub body: TypeId,
}

/// Interned type payload.
///
/// The solver core only distinguishes variables, unions, intersections,
/// applications, binders and the `Located` wrapper; the remaining shapes are
/// interpreted by the rule table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Intrinsic(IntrinsicKind),
    Literal(LiteralValue),
    Var(TyVarId),
    Union(TypeListId),
    Intersection(TypeListId),
    Object(ObjectShapeId),
    Array(TypeId),
    Function(FunctionShapeId),
    Application(ApplicationId),
    Poly(PolyId),
    /// A type parameter bound by an enclosing `Poly` or definition.
    Param(Atom),
    /// Opaque placeholder; unsafe to resolve a variable to.
    Internal(Atom),
    /// Use: read property `name`, result flows into `out`.
    GetProp { name: Atom, out: TypeId },
    /// Use: call with `args`, result flows into `out`.
    Call { args: TypeListId, out: TypeId },
    /// Use: `lower + rhs` at `site`, result flows into `out`.
    Add { rhs: TypeId, out: TypeId, site: Span },
    /// Blame-location metadata around `inner`.
    Located { inner: TypeId, span: Span },
}

impl TypeData {
    #[inline]
    pub fn is_use(&self) -> bool {
        matches!(
            self,
            TypeData::GetProp { .. } | TypeData::Call { .. } | TypeData::Add { .. }
        )
    }
}

bitflags! {
    /// Cached per-type facts, computed once at intern time.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u8 {
        const HAS_VARS = 1 << 0;
        const HAS_PARAMS = 1 << 1;
        const IS_USE = 1 << 2;
        const HAS_LOCATION = 1 << 3;
        const HAS_INTERNAL = 1 << 4;
    }
}

// =============================================================================
// Variables
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub enum VarKind {
    #[default]
    Ordinary,
    /// Fresh placeholder introduced by instantiating a polymorphic type.
    Existential,
}

/// Where and why a type variable was created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub struct VarOrigin {
    pub span: Span,
    pub kind: VarKind,
}

impl VarOrigin {
    pub fn new(span: Span) -> Self {
        VarOrigin {
            span,
            kind: VarKind::Ordinary,
        }
    }

    pub fn existential(span: Span) -> Self {
        VarOrigin {
            span,
            kind: VarKind::Existential,
        }
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Why a flow is being checked. Carried into diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
pub enum UseOp {
    #[default]
    Unknown,
    Assignment(Span),
    Argument { index: u32, span: Span },
    Return(Span),
    PropertyRead { name: Atom, span: Span },
    Addition(Span),
    Unification(Span),
    /// Flows emitted by the solver itself (speculation fallbacks, forcing).
    Internal,
}

impl UseOp {
    pub fn span(self) -> Span {
        match self {
            UseOp::Assignment(span)
            | UseOp::Return(span)
            | UseOp::Addition(span)
            | UseOp::Unification(span)
            | UseOp::Argument { span, .. }
            | UseOp::PropertyRead { span, .. } => span,
            UseOp::Unknown | UseOp::Internal => Span::dummy(),
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, UseOp::Unknown)
    }
}
