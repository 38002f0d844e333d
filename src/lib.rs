//! flowsolve: the constraint-solving core of a structural type checker with
//! flow-based inference.
//!
//! This facade re-exports the solver and common crates and adds the ambient
//! pieces a host needs: loading `SolverOptions` from a file (`config`) and
//! installing a tracing subscriber (`tracing_config`).
//!
//! ```
//! use flowsolve::{Solver, TypeId};
//!
//! let mut solver = Solver::new();
//! let union = solver.types_mut().union2(TypeId::NUMBER, TypeId::STRING);
//! solver.flow(TypeId::NUMBER, union).unwrap();
//! assert!(solver.errors().is_empty());
//! ```

pub mod config;
pub mod tracing_config;

pub use flowsolve_common as common;
pub use flowsolve_solver as solver;

pub use flowsolve_common::{Diagnostic, DiagnosticCategory, Span};
pub use flowsolve_solver::{
    CacheStats, ChoiceKind, DefId, DefinitionInfo, DefinitionStore, DiagnosticCollector,
    DiagnosticSink, ErrorMessage, GoalId, InternalError, PropertyInfo, RuleTable, Solver,
    SolverOptions, StructuralRules, TyVarId, TypeFormatter, TypeId, UseOp, VarOrigin,
};

pub use config::load_options;
pub use tracing_config::init_tracing;
