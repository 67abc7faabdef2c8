//! Diagnostics sink for user-facing errors
//!
//! Semantic errors are reported here and compilation continues, so one run
//! surfaces as many problems as possible. The driver checks `has_errors`
//! to decide whether code generation may run.
#![allow(dead_code)]

use crate::utils::Span;
use std::fmt;

/// A single user diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

/// Ordered collection of diagnostics, in report order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic at the given position.
    pub fn report<S: Into<String>>(&mut self, span: Span, message: S) {
        self.errors.push(Diagnostic {
            span,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter()
    }
}
