//! Common types and utilities shared by the flowsolve crates.
//!
//! This crate provides foundational types used across the workspace:
//! - String interning (`Atom`, `Interner`)
//! - Source spans (`Span`)
//! - Diagnostic types and codes
//! - Centralized limits and thresholds

pub mod diagnostics;
pub mod interner;
pub mod limits;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticCategory, diagnostic_codes};
pub use interner::{Atom, Interner};
pub use span::Span;
