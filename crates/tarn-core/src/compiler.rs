//! Compiler driver.
//!
//! A compilation is a pure function from source text to either a complete
//! module byte buffer or a single [`CompileError`] kind. The driver holds
//! no state beyond the string interner, so independent invocations are
//! free to run side by side.

use crate::codegen;
use crate::error::CompileError;
use crate::interner::Interner;
use crate::syntax::ast::Ast;
use crate::syntax::parser;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compiler instance.
#[derive(Default)]
pub struct Compiler {
    interner: Interner,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Parse source text into the arena AST.
    pub fn parse(&self, source: &str) -> CompileResult<Ast> {
        parser::parse(source).map_err(CompileError::from)
    }

    /// Analyze an AST and generate the module bytes.
    pub fn generate(&self, ast: &Ast) -> CompileResult<Vec<u8>> {
        codegen::generate(ast, &self.interner)
    }

    /// Compile source text to a WebAssembly module.
    pub fn compile(&self, source: &str) -> CompileResult<Vec<u8>> {
        let ast = self.parse(source)?;
        self.generate(&ast)
    }
}

/// Compile source text with a fresh [`Compiler`].
pub fn compile(source: &str) -> CompileResult<Vec<u8>> {
    Compiler::new().compile(source)
}
