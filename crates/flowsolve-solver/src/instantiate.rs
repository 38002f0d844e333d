//! Generic instantiation.
//!
//! - `substitute`: replace bound `Param`s in a type. Inner `Poly` binders
//!   shadow their own parameter names.
//! - Application expansion: a `TypeApplication` is expanded by substituting
//!   its arguments into the definition body. Expansions are pure and cached
//!   per application for the whole session.
//! - Existential instantiation: a polymorphic producer is instantiated with
//!   fresh existential variables, cached per (poly, use site) so repeated
//!   checks at one site share their placeholders.

use flowsolve_common::interner::Atom;
use flowsolve_common::span::Span;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::diagnostics::InternalError;
use crate::intern::TypeInterner;
use crate::recursion::{DepthCounter, RecursionProfile};
use crate::solver::Solver;
use crate::types::{ApplicationId, PolyId, TypeData, TypeFlags, TypeId, VarOrigin};
use crate::visitor::{TypeFolder, super_fold};

pub type Substitution = FxHashMap<Atom, TypeId>;

struct Substituter<'a> {
    types: &'a mut TypeInterner,
    subst: Substitution,
    depth: DepthCounter,
}

impl TypeFolder for Substituter<'_> {
    fn interner(&mut self) -> &mut TypeInterner {
        self.types
    }

    fn fold_type(&mut self, ty: TypeId) -> TypeId {
        if !self.types.flags(ty).contains(TypeFlags::HAS_PARAMS) {
            return ty;
        }
        if !self.depth.enter() {
            return ty;
        }
        let result = match self.types.lookup(ty) {
            Some(TypeData::Param(name)) => self.subst.get(&name).copied().unwrap_or(ty),
            Some(TypeData::Poly(poly)) => self.fold_poly(ty, poly),
            _ => super_fold(self, ty),
        };
        self.depth.leave();
        result
    }
}

impl Substituter<'_> {
    fn fold_poly(&mut self, ty: TypeId, poly: PolyId) -> TypeId {
        let Some(poly) = self.types.poly_type(poly) else {
            return ty;
        };
        let shadowed: Vec<(Atom, TypeId)> = poly
            .params
            .iter()
            .filter_map(|p| self.subst.remove(p).map(|t| (*p, t)))
            .collect();
        let result = if self.subst.is_empty() {
            ty
        } else {
            let body = self.fold_type(poly.body);
            self.types.poly(poly.params.clone(), body)
        };
        self.subst.extend(shadowed);
        result
    }
}

/// Replace each `Param(name)` in `ty` by `subst[name]`.
pub fn substitute(types: &mut TypeInterner, ty: TypeId, subst: &Substitution) -> TypeId {
    if subst.is_empty() || !types.flags(ty).contains(TypeFlags::HAS_PARAMS) {
        return ty;
    }
    let mut folder = Substituter {
        types,
        subst: subst.clone(),
        depth: DepthCounter::with_profile(RecursionProfile::Substitution),
    };
    folder.fold_type(ty)
}

impl Solver<'_> {
    /// The body of `app` with its arguments substituted.
    pub(crate) fn expand_application(&mut self, app: ApplicationId) -> Result<TypeId, InternalError> {
        if let Some(&body) = self.caches.expansions.get(&app) {
            self.caches.stats.expansion_hits += 1;
            return Ok(body);
        }
        self.caches.stats.expansion_misses += 1;

        let Some(application) = self.types.type_application(app) else {
            return Err(InternalError::MalformedType(self.types.intern(TypeData::Application(app))));
        };
        let def = application.def;
        let info = self
            .defs
            .get(def)
            .ok_or(InternalError::MissingDefinition(def))?;
        let body = info.body.ok_or(InternalError::MissingDefinition(def))?;
        if info.type_params.len() != application.args.len() {
            return Err(InternalError::DefinitionArity {
                def,
                expected: info.type_params.len(),
                got: application.args.len(),
            });
        }
        let subst: Substitution = info
            .type_params
            .iter()
            .copied()
            .zip(application.args.iter().copied())
            .collect();
        let expanded = substitute(&mut self.types, body, &subst);
        trace!(def = def.0, body = expanded.0, "expanded application");
        self.caches.expansions.insert(app, expanded);
        Ok(expanded)
    }

    /// Instantiate the polymorphic type `poly_ty` with fresh existential
    /// variables for the use at `site`.
    pub(crate) fn instantiate_existential(
        &mut self,
        poly_ty: TypeId,
        poly: PolyId,
        site: Span,
    ) -> Result<TypeId, InternalError> {
        let key = self.types.strip(poly_ty);
        if let Some(instance) = self.caches.cached_instantiation(key, site) {
            return Ok(instance);
        }
        let Some(poly) = self.types.poly_type(poly) else {
            return Err(InternalError::MalformedType(poly_ty));
        };
        let mut subst = Substitution::default();
        for &param in &poly.params {
            let id = self.graph.create(VarOrigin::existential(site));
            subst.insert(param, self.types.var(id));
        }
        let instance = substitute(&mut self.types, poly.body, &subst);
        trace!(poly = key.0, instance = instance.0, "instantiated existentially");
        self.caches.record_instantiation(key, site, instance);
        Ok(instance)
    }

    /// Rename the parameters of `lower` to those of `upper` so the bodies
    /// can be compared directly. `None` if the binders differ in arity.
    pub(crate) fn align_poly_params(&mut self, lower: PolyId, upper: PolyId) -> Option<(TypeId, TypeId)> {
        let lower = self.types.poly_type(lower)?;
        let upper = self.types.poly_type(upper)?;
        if lower.params.len() != upper.params.len() {
            return None;
        }
        let mut subst = Substitution::default();
        for (&from, &to) in lower.params.iter().zip(&upper.params) {
            if from != to {
                let param = self.types.param(to);
                subst.insert(from, param);
            }
        }
        let body = substitute(&mut self.types, lower.body, &subst);
        Some((body, upper.body))
    }
}

#[cfg(test)]
#[path = "../tests/instantiate_tests.rs"]
mod tests;
