//! Sentinel properties of object unions.
//!
//! A sentinel is a property that every member of a union of object shapes
//! declares with a literal type, and whose literal differs between every
//! pair of members (`{kind: "a", ...} | {kind: "b", ...}`). A producer
//! object carrying a literal for that property can only match the member
//! with the same literal, so the choice engine skips the others without a
//! trial. Results are cached per union.

use flowsolve_common::interner::Atom;
use flowsolve_common::limits;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{Level, span, trace};

use crate::diagnostics::InternalError;
use crate::solver::Solver;
use crate::types::{TypeData, TypeId};

/// Sentinel properties of one union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentinelInfo {
    /// For each sentinel property, the stripped literal type of each member
    /// in member order.
    pub properties: Vec<(Atom, Vec<TypeId>)>,
}

impl Solver<'_> {
    /// Sentinel properties of the union `upper`, computed once.
    pub(crate) fn sentinel_info(
        &mut self,
        upper: TypeId,
        members: &[TypeId],
    ) -> Option<Arc<SentinelInfo>> {
        let key = self.types.strip(upper);
        if let Some(cached) = self.caches.sentinels.get(&key) {
            self.caches.stats.sentinel_hits += 1;
            return cached.clone();
        }
        let info = self.compute_sentinels(members).map(Arc::new);
        self.caches.sentinels.insert(key, info.clone());
        info
    }

    fn compute_sentinels(&self, members: &[TypeId]) -> Option<SentinelInfo> {
        let _span = span!(Level::TRACE, "compute_sentinels", members = members.len()).entered();
        if members.len() < 2 || members.len() > limits::MAX_SENTINEL_UNION_MEMBERS {
            return None;
        }
        let mut shapes = Vec::with_capacity(members.len());
        for &member in members {
            match self.types.lookup_stripped(member) {
                Some(TypeData::Object(shape)) => shapes.push(self.types.object_shape(shape)),
                _ => return None,
            }
        }

        let mut properties = Vec::new();
        for candidate in &shapes[0].properties {
            let mut literals = Vec::with_capacity(shapes.len());
            let mut seen = FxHashSet::default();
            for shape in &shapes {
                let Some(prop) = shape.property(candidate.name) else {
                    break;
                };
                let literal = self.types.strip(prop.type_id);
                if self.types.as_literal(literal).is_none() || !seen.insert(literal) {
                    break;
                }
                literals.push(literal);
            }
            if literals.len() == shapes.len() {
                properties.push((candidate.name, literals));
            }
        }
        trace!(sentinels = properties.len(), "sentinel scan finished");
        (!properties.is_empty()).then_some(SentinelInfo { properties })
    }

    /// Mask of union members the producer `lower` cannot match because a
    /// sentinel literal disagrees. `None` when no sentinel applies.
    pub(crate) fn sentinel_skips(
        &mut self,
        lower: TypeId,
        upper: TypeId,
        members: &[TypeId],
    ) -> Result<Option<SmallVec<[bool; 8]>>, InternalError> {
        let Some(TypeData::Object(shape)) = self.types.lookup_stripped(lower) else {
            return Ok(None);
        };
        let Some(info) = self.sentinel_info(upper, members) else {
            return Ok(None);
        };
        let shape = self.types.object_shape(shape);
        let mut mask: SmallVec<[bool; 8]> = SmallVec::from_elem(false, members.len());
        let mut applied = false;
        for (name, literals) in &info.properties {
            let Some(prop) = shape.property(*name) else {
                continue;
            };
            let produced = self.types.strip(prop.type_id);
            if self.types.as_literal(produced).is_none() {
                continue;
            }
            applied = true;
            for (index, &literal) in literals.iter().enumerate() {
                if literal != produced {
                    mask[index] = true;
                }
            }
        }
        Ok(applied.then_some(mask))
    }
}

#[cfg(test)]
#[path = "../tests/sentinel_tests.rs"]
mod tests;
