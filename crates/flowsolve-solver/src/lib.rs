//! Flow Constraint Solver
//!
//! The constraint-solving core of a structural type checker with
//! flow-based inference. Producers flow into consumers; type variables
//! accumulate lower and upper bounds that are kept transitively closed.
//!
//! - **Type-variable graph**: union-find arena with closed bounds
//!   (`graph`, `bounds`)
//! - **Dispatcher**: `flow` / `unify` with a pair cache, depth guard and a
//!   pluggable `RuleTable` for concrete pairs (`flow`, `rules`)
//! - **Choice engine**: speculative matching of union and intersection
//!   alternatives with deferred actions (`speculation`, `sentinel`)
//! - **Resolution**: `fully_resolve` goals driven by variable resolution
//!   events (`resolution`)
//! - **Generics**: polymorphic binders, definitions and applications with
//!   expansion loop and constant-fold guards (`instantiate`, `expansion`)
//!
//! Everything lives in one single-threaded `Solver` session.

mod bounds;
pub mod caches;
pub mod def;
pub mod diagnostics;
pub mod expansion;
mod flow;
mod format;
pub mod graph;
pub mod instantiate;
mod intern;
pub mod options;
pub mod recursion;
pub mod resolution;
pub mod rules;
mod sentinel;
mod solver;
pub mod speculation;
pub mod trace;
pub mod types;
pub mod visitor;

pub use caches::CacheStats;
pub use def::{DefId, DefinitionInfo, DefinitionStore};
pub use diagnostics::{
    BranchFailure, DiagnosticCollector, DiagnosticSink, ErrorMessage, FlowError, FlowResult,
    InternalError,
};
pub use format::TypeFormatter;
pub use intern::TypeInterner;
pub use options::SolverOptions;
pub use resolution::GoalId;
pub use rules::{RuleContext, RuleMatch, RuleTable, StructuralRules};
pub use sentinel::SentinelInfo;
pub use solver::Solver;
pub use speculation::ChoiceKind;
pub use types::{
    IntrinsicKind, LiteralValue, PropertyInfo, TyVarId, TypeData, TypeId, UseOp, VarKind,
    VarOrigin,
};
