//! Error reporting for the solver.
//!
//! ## Architecture: Lazy Diagnostics
//!
//! Flow failures are recorded as structured `ErrorMessage` values holding
//! `TypeId`s. Inside a speculative trial most of them are thrown away, so
//! nothing is formatted until a host asks for it: `ErrorMessage::to_pending`
//! produces a `PendingDiagnostic` of `DiagnosticArg`s and
//! `TypeFormatter::render` turns that into a `Diagnostic` with text.
//!
//! ## Error channels
//!
//! - `ErrorMessage`: user-facing type errors; recorded, propagation continues.
//! - `FlowError::Speculative`: an `ErrorMessage` raised inside a trial; only
//!   the choice engine catches it.
//! - `InternalError`: defects in the solver's own state; fatal for the unit.

use flowsolve_common::diagnostics::{DiagnosticCategory, diagnostic_codes};
use flowsolve_common::interner::Atom;
use std::sync::Arc;
use thiserror::Error;

use crate::def::DefId;
use crate::resolution::GoalId;
use crate::speculation::ChoiceKind;
use crate::types::{TyVarId, TypeId, UseOp};

// =============================================================================
// Structured errors
// =============================================================================

/// A user-facing type error produced by the solver or a rule.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorMessage {
    /// No rule relates `lower` to `upper`.
    Incompatible {
        lower: TypeId,
        upper: TypeId,
        use_op: UseOp,
    },
    /// `upper` requires property `name` that `lower` does not have.
    PropertyMissing {
        name: Atom,
        lower: TypeId,
        upper: TypeId,
        use_op: UseOp,
    },
    /// The propagation chain through this pair got too long.
    RecursionLimit { lower: TypeId, upper: TypeId },
    /// Every alternative of a union or intersection failed.
    NoMatchingAlternative {
        lower: TypeId,
        upper: TypeId,
        kind: ChoiceKind,
        branches: Vec<BranchFailure>,
    },
    /// Two alternatives matched only conditionally on unresolved variables
    /// and neither subsumes the other. `vars` were unified with `any`.
    SpeculationAmbiguous {
        lower: TypeId,
        upper: TypeId,
        kind: ChoiceKind,
        first: usize,
        second: usize,
        vars: Vec<TyVarId>,
    },
}

/// Why one alternative of a choice point failed.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchFailure {
    pub index: usize,
    pub error: ErrorMessage,
}

impl ErrorMessage {
    pub fn code(&self) -> u32 {
        match self {
            ErrorMessage::Incompatible { .. } => diagnostic_codes::INCOMPATIBLE,
            ErrorMessage::PropertyMissing { .. } => diagnostic_codes::PROPERTY_MISSING,
            ErrorMessage::RecursionLimit { .. } => diagnostic_codes::RECURSION_LIMIT,
            ErrorMessage::NoMatchingAlternative { .. } => {
                diagnostic_codes::NO_MATCHING_ALTERNATIVE
            }
            ErrorMessage::SpeculationAmbiguous { .. } => diagnostic_codes::SPECULATION_AMBIGUOUS,
        }
    }

    /// The producer/consumer pair this error is blamed on.
    pub fn pair(&self) -> (TypeId, TypeId) {
        match *self {
            ErrorMessage::Incompatible { lower, upper, .. }
            | ErrorMessage::PropertyMissing { lower, upper, .. }
            | ErrorMessage::RecursionLimit { lower, upper }
            | ErrorMessage::NoMatchingAlternative { lower, upper, .. }
            | ErrorMessage::SpeculationAmbiguous { lower, upper, .. } => (lower, upper),
        }
    }

    pub fn use_op(&self) -> UseOp {
        match *self {
            ErrorMessage::Incompatible { use_op, .. }
            | ErrorMessage::PropertyMissing { use_op, .. } => use_op,
            _ => UseOp::Unknown,
        }
    }

    /// Structured, not yet formatted form of this error.
    pub fn to_pending(&self) -> PendingDiagnostic {
        let code = self.code();
        match self {
            ErrorMessage::Incompatible { lower, upper, .. }
            | ErrorMessage::RecursionLimit { lower, upper } => {
                PendingDiagnostic::error(code, vec![(*lower).into(), (*upper).into()])
            }
            ErrorMessage::PropertyMissing {
                name, lower, upper, ..
            } => PendingDiagnostic::error(
                code,
                vec![(*name).into(), (*lower).into(), (*upper).into()],
            ),
            ErrorMessage::NoMatchingAlternative {
                lower,
                upper,
                branches,
                ..
            } => branches.iter().fold(
                PendingDiagnostic::error(code, vec![(*lower).into(), (*upper).into()]),
                |diag, branch| diag.with_related(branch.error.to_pending()),
            ),
            ErrorMessage::SpeculationAmbiguous {
                lower,
                upper,
                kind,
                first,
                second,
                ..
            } => {
                let subject = match kind {
                    ChoiceKind::Union => *upper,
                    ChoiceKind::Intersection => *lower,
                };
                PendingDiagnostic::error(
                    code,
                    vec![
                        ordinal(*first).into(),
                        ordinal(*second).into(),
                        subject.into(),
                    ],
                )
            }
        }
    }
}

/// "first", "second", ... for alternative indices.
pub fn ordinal(index: usize) -> String {
    const WORDS: [&str; 10] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
        "tenth",
    ];
    match WORDS.get(index) {
        Some(word) => (*word).to_string(),
        None => {
            let n = index + 1;
            let suffix = match (n % 10, n % 100) {
                (1, r) if r != 11 => "st",
                (2, r) if r != 12 => "nd",
                (3, r) if r != 13 => "rd",
                _ => "th",
            };
            format!("{n}{suffix}")
        }
    }
}

// =============================================================================
// Lazy Diagnostic Arguments
// =============================================================================

/// Argument for a diagnostic message template.
///
/// Instead of eagerly formatting types to strings, we store the raw data
/// and only format when rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticArg {
    /// A type reference (will be formatted via TypeFormatter)
    Type(TypeId),
    /// An interned string
    Atom(Atom),
    /// A plain string
    String(Arc<str>),
    /// A number
    Number(usize),
}

macro_rules! impl_from_diagnostic_arg {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(impl From<$source> for DiagnosticArg {
            fn from(v: $source) -> Self { Self::$variant(v) }
        })*
    };
}

impl_from_diagnostic_arg! {
    TypeId => Type,
    Atom   => Atom,
    usize  => Number,
}

impl From<&str> for DiagnosticArg {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for DiagnosticArg {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

/// A diagnostic that hasn't been rendered yet.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingDiagnostic {
    pub code: u32,
    pub args: Vec<DiagnosticArg>,
    pub category: DiagnosticCategory,
    pub related: Vec<PendingDiagnostic>,
}

impl PendingDiagnostic {
    pub fn error(code: u32, args: Vec<DiagnosticArg>) -> Self {
        Self {
            code,
            args,
            category: DiagnosticCategory::Error,
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: PendingDiagnostic) -> Self {
        self.related.push(related);
        self
    }
}

// =============================================================================
// Fatal errors and the flow result
// =============================================================================

/// A defect in the solver's own state. Fatal for the current checking unit.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("type variable {0:?} does not exist in this session")]
    MissingVariable(TyVarId),
    #[error("speculative error escaped its choice point")]
    EscapedSpeculation,
    #[error("definition {0:?} is not registered or has no body")]
    MissingDefinition(DefId),
    #[error("definition {def:?} expects {expected} type arguments, got {got}")]
    DefinitionArity {
        def: DefId,
        expected: usize,
        got: usize,
    },
    #[error("resolution goal {0:?} does not exist")]
    MissingGoal(GoalId),
    #[error("malformed type {0:?}")]
    MalformedType(TypeId),
    #[error("speculation case stack underflow")]
    CaseStackUnderflow,
}

/// Failure of one recursive flow step.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowError {
    /// A type error raised inside a speculative trial.
    Speculative(Box<ErrorMessage>),
    Internal(InternalError),
}

impl From<InternalError> for FlowError {
    fn from(err: InternalError) -> Self {
        FlowError::Internal(err)
    }
}

impl FlowError {
    /// Convert to the public error type once outside every choice point.
    pub fn into_internal(self) -> InternalError {
        match self {
            FlowError::Internal(err) => err,
            FlowError::Speculative(_) => InternalError::EscapedSpeculation,
        }
    }
}

pub type FlowResult = Result<(), FlowError>;

// =============================================================================
// Sinks
// =============================================================================

/// Receives every error the solver records outside speculation.
pub trait DiagnosticSink {
    fn report_error(&mut self, error: &ErrorMessage);
}

/// Collects recorded errors in order.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    errors: Vec<ErrorMessage>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ErrorMessage) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ErrorMessage] {
        &self.errors
    }

    pub fn take(&mut self) -> Vec<ErrorMessage> {
        std::mem::take(&mut self.errors)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl DiagnosticSink for DiagnosticCollector {
    fn report_error(&mut self, error: &ErrorMessage) {
        self.errors.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(0), "first");
        assert_eq!(ordinal(1), "second");
        assert_eq!(ordinal(10), "11th");
        assert_eq!(ordinal(20), "21st");
        assert_eq!(ordinal(21), "22nd");
    }

    #[test]
    fn speculative_error_escapes_as_internal() {
        let err = FlowError::Speculative(Box::new(ErrorMessage::RecursionLimit {
            lower: TypeId::NUMBER,
            upper: TypeId::STRING,
        }));
        assert_eq!(err.into_internal(), InternalError::EscapedSpeculation);
    }

    #[test]
    fn no_match_collects_branch_errors_as_related() {
        let err = ErrorMessage::NoMatchingAlternative {
            lower: TypeId::BOOLEAN,
            upper: TypeId::ANY,
            kind: ChoiceKind::Union,
            branches: vec![
                BranchFailure {
                    index: 0,
                    error: ErrorMessage::Incompatible {
                        lower: TypeId::BOOLEAN,
                        upper: TypeId::NUMBER,
                        use_op: UseOp::Unknown,
                    },
                },
                BranchFailure {
                    index: 1,
                    error: ErrorMessage::Incompatible {
                        lower: TypeId::BOOLEAN,
                        upper: TypeId::STRING,
                        use_op: UseOp::Unknown,
                    },
                },
            ],
        };
        let pending = err.to_pending();
        assert_eq!(pending.code, diagnostic_codes::NO_MATCHING_ALTERNATIVE);
        assert_eq!(pending.related.len(), 2);
        assert_eq!(pending.related[1].args[1], DiagnosticArg::Type(TypeId::STRING));
    }

    #[test]
    fn collector_records_in_order() {
        let mut collector = DiagnosticCollector::new();
        let first = ErrorMessage::RecursionLimit {
            lower: TypeId::NUMBER,
            upper: TypeId::STRING,
        };
        collector.report_error(&first);
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.take(), vec![first]);
        assert!(collector.is_empty());
    }
}
