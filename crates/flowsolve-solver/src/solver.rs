//! The solver session.
//!
//! A `Solver` owns every piece of mutable state for one checking unit: the
//! type interner, the variable graph, the caches, the speculation stack and
//! the resolution engine. Nothing is global, so independent units can run
//! on separate sessions.
//!
//! Behavior is split across modules by concern, each adding an
//! `impl Solver` block:
//!
//! - `flow.rs`: the dispatcher (`rec_flow` / `rec_unify`)
//! - `bounds.rs`: bound propagation, linking, merging, resolving
//! - `speculation.rs`: the choice engine
//! - `resolution.rs`: `fully_resolve` goals
//! - `instantiate.rs` / `expansion.rs`: generics and expansion guards
//!
//! The public entry points below all go through `run_entry`, which converts
//! the internal `FlowError` into `InternalError` and drains resolution
//! events once the outermost entry returns.

use flowsolve_common::diagnostics::Diagnostic;
use tracing::{Level, debug, span};

use crate::caches::{CacheStats, SolverCaches, query_trace};
use crate::def::DefinitionStore;
use crate::diagnostics::{
    DiagnosticCollector, DiagnosticSink, ErrorMessage, FlowError, InternalError,
};
use crate::expansion::{ConstFoldGuard, TypeAppExpansion};
use crate::format::TypeFormatter;
use crate::graph::TypeVarGraph;
use crate::intern::TypeInterner;
use crate::options::SolverOptions;
use crate::resolution::ResolutionEngine;
use crate::rules::{RuleTable, StructuralRules};
use crate::speculation::SpeculationState;
use crate::trace::Trace;
use crate::types::{TyVarId, TypeId, UseOp, VarOrigin};

static STRUCTURAL_RULES: StructuralRules = StructuralRules;

pub struct Solver<'r> {
    pub(crate) types: TypeInterner,
    pub(crate) defs: DefinitionStore,
    pub(crate) graph: TypeVarGraph,
    pub(crate) caches: SolverCaches,
    pub(crate) expansion: TypeAppExpansion,
    pub(crate) const_folds: ConstFoldGuard,
    pub(crate) speculation: SpeculationState,
    pub(crate) resolution: ResolutionEngine<'r>,
    /// Innermost `with_use_op` context last.
    pub(crate) op_stack: Vec<UseOp>,
    pub(crate) errors: DiagnosticCollector,
    pub(crate) listener: Option<Box<dyn DiagnosticSink + 'r>>,
    pub(crate) options: SolverOptions,
    pub(crate) rules: &'r dyn RuleTable,
    entry_depth: u32,
}

impl Solver<'static> {
    /// Session with default options and the structural reference rules.
    pub fn new() -> Self {
        Self::with_options(SolverOptions::default())
    }

    pub fn with_options(options: SolverOptions) -> Self {
        Solver::with_rules(&STRUCTURAL_RULES, options)
    }
}

impl Default for Solver<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Solver<'r> {
    /// Session driven by a caller-provided rule table.
    pub fn with_rules(rules: &'r dyn RuleTable, options: SolverOptions) -> Self {
        Solver {
            types: TypeInterner::new(),
            defs: DefinitionStore::new(),
            graph: TypeVarGraph::new(),
            caches: SolverCaches::default(),
            expansion: TypeAppExpansion::default(),
            const_folds: ConstFoldGuard::default(),
            speculation: SpeculationState::default(),
            resolution: ResolutionEngine::default(),
            op_stack: Vec::new(),
            errors: DiagnosticCollector::new(),
            listener: None,
            options,
            rules,
            entry_depth: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn types(&self) -> &TypeInterner {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeInterner {
        &mut self.types
    }

    pub fn defs(&self) -> &DefinitionStore {
        &self.defs
    }

    pub fn defs_mut(&mut self) -> &mut DefinitionStore {
        &mut self.defs
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Errors recorded so far, in report order.
    pub fn errors(&self) -> &[ErrorMessage] {
        self.errors.errors()
    }

    pub fn take_errors(&mut self) -> Vec<ErrorMessage> {
        self.errors.take()
    }

    /// Also forward every recorded error to `sink`.
    pub fn set_listener(&mut self, sink: impl DiagnosticSink + 'r) {
        self.listener = Some(Box::new(sink));
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats
    }

    pub fn resolution(&self) -> &ResolutionEngine<'r> {
        &self.resolution
    }

    /// Render a type for messages and debugging.
    pub fn format_type(&self, ty: TypeId) -> String {
        TypeFormatter::new(&self.types)
            .with_defs(&self.defs)
            .format(ty)
    }

    /// Render every recorded error.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut formatter = TypeFormatter::new(&self.types).with_defs(&self.defs);
        self.errors
            .errors()
            .iter()
            .map(|error| formatter.render(error))
            .collect()
    }

    // =========================================================================
    // Variables
    // =========================================================================

    pub fn create_variable(&mut self, origin: VarOrigin) -> TyVarId {
        self.graph.create(origin)
    }

    /// The type standing for variable `id`.
    pub fn var_type(&mut self, id: TyVarId) -> TypeId {
        self.types.var(id)
    }

    /// Fresh variable, returned as a type.
    pub fn fresh_var(&mut self, origin: VarOrigin) -> TypeId {
        let id = self.create_variable(origin);
        self.var_type(id)
    }

    /// The type `id`'s class resolved to, if any.
    pub fn resolved_type(&self, id: TyVarId) -> Result<Option<TypeId>, InternalError> {
        self.graph.resolved_type(id)
    }

    pub fn variable_count(&self) -> usize {
        self.graph.len()
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Run `f` as a public entry: convert its error and, at the outermost
    /// level, drain pending resolution events.
    pub(crate) fn run_entry<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FlowError>,
    ) -> Result<T, InternalError> {
        self.entry_depth += 1;
        let result = f(self);
        self.entry_depth -= 1;
        let value = result.map_err(FlowError::into_internal)?;
        if self.entry_depth == 0 {
            self.drain_resolution_queue()?;
        }
        Ok(value)
    }

    fn traced_relation(
        &mut self,
        op: &'static str,
        lower: TypeId,
        upper: TypeId,
        f: impl FnOnce(&mut Self) -> Result<(), FlowError>,
    ) -> Result<(), InternalError> {
        let query_id = query_trace::enabled().then(query_trace::next_query_id);
        if let Some(query_id) = query_id {
            query_trace::relation_start(query_id, op, lower, upper);
        }
        let before = self.errors.len();
        let result = self.run_entry(f);
        if let Some(query_id) = query_id {
            let recorded = self.errors.len() - before;
            query_trace::relation_end(query_id, op, result.is_ok() && recorded == 0, recorded);
        }
        result
    }

    /// Check that `lower` may flow into `upper`, recording type errors.
    pub fn flow(&mut self, lower: TypeId, upper: TypeId) -> Result<(), InternalError> {
        self.flow_with(lower, upper, UseOp::Unknown)
    }

    pub fn flow_with(
        &mut self,
        lower: TypeId,
        upper: TypeId,
        use_op: UseOp,
    ) -> Result<(), InternalError> {
        let _span = span!(Level::DEBUG, "flow", lower = lower.0, upper = upper.0).entered();
        self.traced_relation("flow", lower, upper, |solver| {
            solver.rec_flow(Trace::root(), use_op, lower, upper)
        })
    }

    /// Make `left` and `right` equal, recording type errors.
    pub fn unify(&mut self, left: TypeId, right: TypeId) -> Result<(), InternalError> {
        self.unify_with(left, right, UseOp::Unknown)
    }

    pub fn unify_with(
        &mut self,
        left: TypeId,
        right: TypeId,
        use_op: UseOp,
    ) -> Result<(), InternalError> {
        let _span = span!(Level::DEBUG, "unify", left = left.0, right = right.0).entered();
        self.traced_relation("unify", left, right, |solver| {
            solver.rec_unify(Trace::root(), use_op, left, right)
        })
    }

    pub fn add_lower_bound(
        &mut self,
        id: TyVarId,
        lower: TypeId,
        use_op: UseOp,
    ) -> Result<(), InternalError> {
        self.run_entry(|solver| solver.add_lower_bound_in(Trace::root(), use_op, id, lower))
    }

    pub fn add_upper_bound(
        &mut self,
        id: TyVarId,
        upper: TypeId,
        use_op: UseOp,
    ) -> Result<(), InternalError> {
        self.run_entry(|solver| solver.add_upper_bound_in(Trace::root(), use_op, id, upper))
    }

    /// Unify two variables into one class.
    pub fn merge(&mut self, a: TyVarId, b: TyVarId, use_op: UseOp) -> Result<(), InternalError> {
        debug!(a = a.0, b = b.0, "merge");
        self.run_entry(|solver| solver.merge_vars(Trace::root(), use_op, a, b))
    }

    /// Resolve `id`'s class to `ty`. Resolving twice unifies the two types.
    pub fn resolve(&mut self, id: TyVarId, ty: TypeId, use_op: UseOp) -> Result<(), InternalError> {
        debug!(var = id.0, ty = ty.0, "resolve");
        self.run_entry(|solver| solver.resolve_var(Trace::root(), use_op, id, ty))
    }

    /// Run `f` with `use_op` as the provenance of flows that carry none.
    pub fn with_use_op<T>(&mut self, use_op: UseOp, f: impl FnOnce(&mut Self) -> T) -> T {
        self.op_stack.push(use_op);
        let result = f(self);
        self.op_stack.pop();
        result
    }
}

#[cfg(test)]
#[path = "../tests/solver_tests.rs"]
mod tests;
