//! Module-level declarations.
//!
//! A single pass over the top-level forms populates the function table,
//! the import and export lists, and the memory flag. Imported functions
//! take the low global indices, defined functions follow in definition
//! order, and no index changes afterwards.

use crate::error::CompileError;
use crate::ids::{FuncIdx, NodeId, TypeIdx};
use crate::interner::{Interner, Name};
use crate::syntax::ast::{Ast, Node};
use crate::types::{FuncSig, SigInterner};
use std::collections::HashMap;

/// Function table entry.
#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub index: FuncIdx,
    pub type_idx: TypeIdx,
    pub sig: FuncSig,
}

/// An imported function, in AST order.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub module: String,
    pub field: String,
    pub type_idx: TypeIdx,
}

/// Everything the module assembler needs to know about the program shape.
#[derive(Debug, Default)]
pub struct ModuleDecls {
    funcs: HashMap<Name, FuncInfo>,
    /// Function definition nodes with their interned signature indices,
    /// in definition order.
    pub defs: Vec<(NodeId, TypeIdx)>,
    pub imports: Vec<ImportRecord>,
    /// Exported names in declaration order.
    pub exports: Vec<String>,
    /// Set when any load or store appears anywhere in the module.
    pub uses_memory: bool,
}

impl ModuleDecls {
    pub fn lookup(&self, name: Name) -> Option<&FuncInfo> {
        self.funcs.get(&name)
    }

    pub fn import_count(&self) -> u32 {
        self.imports.len() as u32
    }
}

/// Collect module-level declarations.
///
/// Imports are scanned first so they occupy global indices starting at 0;
/// a second scan registers definitions and exports. Export names are only
/// resolved later, when the Export section is emitted.
pub fn collect(
    ast: &Ast,
    sigs: &mut SigInterner,
    interner: &Interner,
) -> Result<ModuleDecls, CompileError> {
    let mut decls = ModuleDecls::default();
    let mut next_index = 0u32;

    for &id in &ast.top_level {
        if let Node::ImportFunc(imp) = ast.node(id) {
            let sig = FuncSig {
                params: imp.params.clone(),
                ret: imp.ret,
            };
            let type_idx = sigs.intern(sig.clone());
            let name = interner.intern(&imp.field);
            let info = FuncInfo {
                index: FuncIdx(next_index),
                type_idx,
                sig,
            };
            if decls.funcs.insert(name, info).is_some() {
                return Err(CompileError::DuplicateDefinition(imp.field.clone()));
            }
            decls.imports.push(ImportRecord {
                module: imp.module.clone(),
                field: imp.field.clone(),
                type_idx,
            });
            next_index += 1;
        }
    }

    for &id in &ast.top_level {
        match ast.node(id) {
            Node::Func(func) => {
                let sig = FuncSig {
                    params: func.params.iter().map(|&(_, ty)| ty).collect(),
                    ret: func.ret,
                };
                let type_idx = sigs.intern(sig.clone());
                let name = interner.intern(&func.name);
                let info = FuncInfo {
                    index: FuncIdx(next_index),
                    type_idx,
                    sig,
                };
                if decls.funcs.insert(name, info).is_some() {
                    return Err(CompileError::DuplicateDefinition(func.name.clone()));
                }
                decls.defs.push((id, type_idx));
                next_index += 1;
            }
            Node::Export(name) => {
                if decls.exports.iter().any(|e| e == name) {
                    return Err(CompileError::DuplicateDefinition(name.clone()));
                }
                decls.exports.push(name.clone());
            }
            Node::ImportFunc(_) => {}
            other => {
                // The parser admits only declarations at the top level.
                unreachable!("non-declaration at top level: {other:?}")
            }
        }
    }

    decls.uses_memory = ast
        .nodes()
        .any(|n| matches!(n, Node::Load { .. } | Node::Store { .. }));

    tracing::debug!(
        imports = decls.imports.len(),
        functions = decls.defs.len(),
        exports = decls.exports.len(),
        uses_memory = decls.uses_memory,
        "collected declarations"
    );

    Ok(decls)
}
