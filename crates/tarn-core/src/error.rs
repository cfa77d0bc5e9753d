//! Compilation error taxonomy.
//!
//! Errors bubble out of the compiler as a single tagged kind; no recovery is
//! attempted and partial output is discarded. The kind name is the stable
//! identifier reported by the CLI and by the wasm-hosted entrypoint.

use crate::syntax::parser::ParseError;
use thiserror::Error;

/// A fatal compilation error.
#[derive(Debug, Error)]
pub enum CompileError {
    /// An identifier references no parameter or local in scope.
    #[error("UndefinedVariable: `{0}`")]
    UndefinedVariable(String),

    /// A call or export names no known function.
    #[error("UndefinedFunction: `{0}`")]
    UndefinedFunction(String),

    /// Two functions, parameters, locals, or exports share a name.
    #[error("DuplicateDefinition: `{0}`")]
    DuplicateDefinition(String),

    /// Operand, branch, return, initializer, or condition types disagree.
    #[error("TypeMismatch: {0}")]
    TypeMismatch(String),

    /// The operator has no mapping for the operand type.
    #[error("UnsupportedOperator: {0}")]
    UnsupportedOperator(String),

    /// A literal or dense index exceeds its representable range.
    #[error("Overflow: {0}")]
    Overflow(String),

    /// A fixed output region cannot hold the result.
    #[error("OutOfMemory")]
    OutOfMemory,

    /// The source text is not a well-formed program.
    #[error("ParseError: {0}")]
    Parse(ParseError),
}

impl CompileError {
    /// Stable kind name, used on the CLI error channel and in the
    /// wasm-hosted `error: <kind>` reply.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CompileError::UndefinedVariable(_) => "UndefinedVariable",
            CompileError::UndefinedFunction(_) => "UndefinedFunction",
            CompileError::DuplicateDefinition(_) => "DuplicateDefinition",
            CompileError::TypeMismatch(_) => "TypeMismatch",
            CompileError::UnsupportedOperator(_) => "UnsupportedOperator",
            CompileError::Overflow(_) => "Overflow",
            CompileError::OutOfMemory => "OutOfMemory",
            CompileError::Parse(_) => "ParseError",
        }
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        match e {
            // Out-of-range literals are caught while lexing but belong to
            // the Overflow kind.
            ParseError::IntOutOfRange(lit) => CompileError::Overflow(lit),
            other => CompileError::Parse(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            CompileError::UndefinedVariable("x".into()).kind_name(),
            "UndefinedVariable"
        );
        assert_eq!(CompileError::OutOfMemory.kind_name(), "OutOfMemory");
    }

    #[test]
    fn test_int_out_of_range_maps_to_overflow() {
        let err = CompileError::from(ParseError::IntOutOfRange("9e99".into()));
        assert!(matches!(err, CompileError::Overflow(_)));
    }
}
