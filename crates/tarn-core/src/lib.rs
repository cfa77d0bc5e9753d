//! Tarn compiler
//!
//! A single-pass compiler from a small S-expression language with
//! WebAssembly-native primitive types to a standalone WebAssembly 1.0
//! (MVP) binary module.
//!
//! # Architecture
//!
//! ```text
//!  source ─► Parser ─► AST (arena) ─► Analyzer + Codegen ─► .wasm bytes
//!            (pest)                   ┌──────────────────┐
//!                                     │ decls   collect  │ module tables
//!                                     │ locals  collect  │ per-function
//!                                     │ typer   type_of  │ pure typing
//!                                     │ codegen emit     │ direct binary
//!                                     └──────────────────┘
//! ```
//!
//! The pipeline is strictly linear: the parser builds an arena of nodes
//! addressed by dense handles, a declaration pass fixes global function
//! indices and interned signatures, and each function body is emitted in
//! one traversal against a per-function local table. There is no
//! intermediate representation between the AST and the wire bytes.

pub mod codegen;
pub mod compiler;
pub mod decls;
pub mod error;
pub mod ids;
pub mod index_vec;
pub mod interner;
pub mod locals;
pub mod syntax;
pub mod typer;
pub mod types;

pub use compiler::{compile, CompileResult, Compiler};
pub use error::CompileError;
pub use ids::{FuncIdx, LocalIdx, NodeId, TypeIdx};
pub use index_vec::{Idx, IndexVec};
pub use interner::{Interner, Name};
pub use syntax::{parse, Ast, BinOp, Node, ParseError};
pub use types::{FuncSig, SigInterner, ValType};
