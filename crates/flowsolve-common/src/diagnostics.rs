//! Diagnostic types and message templates for solver errors.

use serde::Serialize;

use crate::span::Span;

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

/// Related information for a diagnostic (e.g., the other side of a flow).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub span: Span,
    pub message_text: String,
    pub category: DiagnosticCategory,
}

/// A rendered solver diagnostic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub span: Span,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    #[must_use]
    pub const fn error(span: Span, message: String, code: u32) -> Self {
        Self {
            span,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            related_information: Vec::new(),
        }
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, span: Span, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            span,
            message_text: message,
            category: DiagnosticCategory::Message,
        });
        self
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

pub mod diagnostic_codes {
    pub const INCOMPATIBLE: u32 = 1001;
    pub const PROPERTY_MISSING: u32 = 1002;
    pub const RECURSION_LIMIT: u32 = 1003;
    pub const NO_MATCHING_ALTERNATIVE: u32 = 1004;
    pub const SPECULATION_AMBIGUOUS: u32 = 1005;
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    DiagnosticMessage {
        code: diagnostic_codes::INCOMPATIBLE,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' is incompatible with type '{1}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::PROPERTY_MISSING,
        category: DiagnosticCategory::Error,
        message: "Property '{0}' is missing in type '{1}' but required in type '{2}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::RECURSION_LIMIT,
        category: DiagnosticCategory::Error,
        message: "Checking '{0}' against '{1}' is excessively deep and possibly infinite.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::NO_MATCHING_ALTERNATIVE,
        category: DiagnosticCategory::Error,
        message: "Could not decide which case to select for '{0}' flowing into '{1}'.",
    },
    DiagnosticMessage {
        code: diagnostic_codes::SPECULATION_AMBIGUOUS,
        category: DiagnosticCategory::Error,
        message: "Could not decide between the {0} and {1} alternatives of '{2}'; both depend on unresolved types.",
    },
];

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_message_replaces_placeholders() {
        let template = get_message_template(diagnostic_codes::INCOMPATIBLE).unwrap_or_default();
        assert_eq!(
            format_message(template, &["string", "number"]),
            "Type 'string' is incompatible with type 'number'."
        );
    }

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<u32> = DIAGNOSTIC_MESSAGES.iter().map(|m| m.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), DIAGNOSTIC_MESSAGES.len());
    }

    #[test]
    fn serializes_without_empty_related() {
        let diag = Diagnostic::error(Span::new(0, 1, 4), "msg".into(), 1001);
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("related_information"));
        let diag = diag.with_related(Span::new(0, 5, 6), "here".into());
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("related_information"));
    }
}
