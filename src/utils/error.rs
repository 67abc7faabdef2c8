//! Error handling for the Gibberish compiler
//!
//! Two disjoint channels exist: user diagnostics go through
//! [`crate::utils::Diagnostics`] and never unwind, while this `Error` type
//! carries parse failures, I/O failures, and internal compiler errors up to
//! the driver.
#![allow(dead_code)]

use crate::utils::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Parser Errors ====================

    #[error("{span}: unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("{span}: expected identifier")]
    ExpectedIdent { span: Span },

    #[error("{span}: expected a type")]
    ExpectedType { span: Span },

    #[error("{span}: expected an expression")]
    ExpectedExpr { span: Span },

    #[error("{span}: expected a statement")]
    ExpectedStmt { span: Span },

    // ==================== Internal Errors ====================
    //
    // These are compiler bugs, not user errors. The driver reports them
    // as internal compiler errors and exits with a distinct status.

    #[error("scope removed from an empty symbol table")]
    EmptyScope,

    #[error("duplicate declaration of `{name}` slipped past the local lookup")]
    DuplicateDecl { name: String },

    #[error("empty name added to the symbol table")]
    IllegalName,

    #[error("identifier `{name}` has no symbol binding")]
    UnboundIdent { name: String },

    #[error("symbol `{name}` has an unexpected kind for this context")]
    UnexpectedSymbol { name: String },

    // ==================== Driver Errors ====================

    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error indicates a compiler bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::EmptyScope
                | Self::DuplicateDecl { .. }
                | Self::IllegalName
                | Self::UnboundIdent { .. }
                | Self::UnexpectedSymbol { .. }
        )
    }

    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::UnexpectedToken { span, .. } => Some(*span),
            Self::ExpectedIdent { span } => Some(*span),
            Self::ExpectedType { span } => Some(*span),
            Self::ExpectedExpr { span } => Some(*span),
            Self::ExpectedStmt { span } => Some(*span),
            _ => None,
        }
    }
}
