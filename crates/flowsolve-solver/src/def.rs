//! Generic definitions and their storage.
//!
//! A definition is a named, possibly parameterized type body
//! (`type List<T> = { head: T; tail: List<T> | null }`). Applications of a
//! definition (`TypeData::Application`) are expanded lazily by the flow
//! dispatcher under the type-application loop guard.
//!
//! Recursive definitions reserve their `DefId` first and receive their body
//! afterwards, so the body can mention the definition itself.

use flowsolve_common::interner::Atom;
use tracing::trace;

use crate::types::TypeId;

// =============================================================================
// DefId
// =============================================================================

/// Solver-owned definition identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl DefId {
    /// Sentinel value for invalid `DefId`.
    pub const INVALID: Self = Self(0);

    /// First valid `DefId`.
    pub const FIRST_VALID: u32 = 1;

    /// Check if this `DefId` is valid.
    pub const fn is_valid(self) -> bool {
        self.0 >= Self::FIRST_VALID
    }
}

// =============================================================================
// Definition Info
// =============================================================================

#[derive(Clone, Debug)]
pub struct DefinitionInfo {
    /// Name of the definition (for diagnostics)
    pub name: Atom,
    /// Type parameter names, in argument order
    pub type_params: Vec<Atom>,
    /// `None` while a recursive definition is being built
    pub body: Option<TypeId>,
}

impl DefinitionInfo {
    pub fn new(name: Atom, type_params: Vec<Atom>, body: TypeId) -> Self {
        DefinitionInfo {
            name,
            type_params,
            body: Some(body),
        }
    }
}

// =============================================================================
// DefinitionStore
// =============================================================================

/// Storage for all definitions of a checking session.
#[derive(Clone, Debug, Default)]
pub struct DefinitionStore {
    /// Index 0 is unused so that `DefId::INVALID` never resolves.
    defs: Vec<Option<DefinitionInfo>>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        DefinitionStore { defs: vec![None] }
    }

    /// Register a complete definition.
    pub fn register(&mut self, info: DefinitionInfo) -> DefId {
        if self.defs.is_empty() {
            self.defs.push(None);
        }
        let id = DefId(self.defs.len() as u32);
        trace!(def_id = id.0, params = info.type_params.len(), "register definition");
        self.defs.push(Some(info));
        id
    }

    /// Reserve an id for a definition whose body is not built yet.
    pub fn reserve(&mut self, name: Atom, type_params: Vec<Atom>) -> DefId {
        self.register(DefinitionInfo {
            name,
            type_params,
            body: None,
        })
    }

    /// Fill in the body of a reserved definition.
    pub fn set_body(&mut self, id: DefId, body: TypeId) {
        if let Some(Some(info)) = self.defs.get_mut(id.0 as usize) {
            info.body = Some(body);
        }
    }

    pub fn get(&self, id: DefId) -> Option<&DefinitionInfo> {
        self.defs.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: DefId) -> bool {
        self.get(id).is_some()
    }

    pub fn get_name(&self, id: DefId) -> Option<Atom> {
        self.get(id).map(|info| info.name)
    }

    pub fn get_body(&self, id: DefId) -> Option<TypeId> {
        self.get(id).and_then(|info| info.body)
    }

    pub fn get_type_params(&self, id: DefId) -> Option<&[Atom]> {
        self.get(id).map(|info| info.type_params.as_slice())
    }

    pub fn len(&self) -> usize {
        self.defs.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "../tests/def_tests.rs"]
mod tests;
