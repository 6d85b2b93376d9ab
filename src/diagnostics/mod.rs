//! Diagnostic messages produced while parsing

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::Span;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
            DiagnosticSeverity::Hint => write!(f, "hint"),
        }
    }
}

/// Extra context attached to a diagnostic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticDetails {
    /// Text that was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
    /// What the parser expected instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Free-form note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

/// Position-tagged diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: String,
    pub message: String,
    pub span: Span,
    #[serde(default)]
    pub details: DiagnosticDetails,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        span: Span,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            span,
            details: DiagnosticDetails::default(),
        }
    }

    pub fn error(span: Span, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, span, code, message)
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.details.found = Some(found.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.details.expected = Some(expected.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.details.info = Some(info.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}[{}]: {}", self.span.start, self.severity, self.code, self.message)?;
        if let Some(expected) = &self.details.expected {
            write!(f, " (expected {expected})")?;
        }
        if let Some(info) = &self.details.info {
            write!(f, "\n  note: {info}")?;
        }
        Ok(())
    }
}

/// Diagnostic codes
pub mod codes {
    /// Malformed input: invalid UTF-8 or a character outside the token set
    pub const LEXICAL_ERROR: &str = "AW001";
    /// Unexpected token
    pub const SYNTAX_ERROR: &str = "AW002";
    /// Reference to a label that is never declared
    pub const UNRESOLVED_REFERENCE: &str = "AW003";
    /// Label declared twice
    pub const DUPLICATE_LABEL: &str = "AW004";
    /// `}` without `{`, or nesting deeper than allowed
    pub const UNBALANCED_BLOCK: &str = "AW005";
    /// Symbol or slab index space exhausted
    pub const CAPACITY_EXCEEDED: &str = "AW100";
    /// Input the scanner cannot resume from
    pub const CORRUPT_INPUT: &str = "AW101";
    /// End of input inside a `{` block
    pub const UNCLOSED_BLOCK: &str = "AW102";
    /// Diagnostic limit reached
    pub const TOO_MANY_DIAGNOSTICS: &str = "AW103";
    /// Graph contract violation inside the parser
    pub const INTERNAL_ERROR: &str = "AW199";
}
