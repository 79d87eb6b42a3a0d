use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A structured diagnostic carrying file/line/column, per spec §7's
/// propagation policy: a failure to emit one declaration is recorded here
/// and does not abort emission of its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    /// Simple name of the declaration whose emission produced this
    /// diagnostic, for grouping in a CLI report.
    pub declaration: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span, declaration: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
            declaration: declaration.into(),
        }
    }
}
