//! Per-function local table.
//!
//! The binary format wants every local declared up front, while source
//! locals may appear anywhere in a body. A pre-order pre-pass assigns a
//! dense index to each declaration; the emitter never adds locals. The
//! table is rebuilt from scratch for every function because scoping is
//! flat per function (no shadowing, no nested scopes).

use crate::error::CompileError;
use crate::ids::{LocalIdx, NodeId};
use crate::interner::{Interner, Name};
use crate::syntax::ast::{Ast, FuncDef, Node};
use crate::types::ValType;
use std::collections::HashMap;

/// Information about a parameter or declared local.
#[derive(Debug, Clone, Copy)]
pub struct LocalInfo {
    pub index: LocalIdx,
    pub ty: ValType,
}

/// Name resolution table for one function body.
#[derive(Debug, Default)]
pub struct LocalTable {
    map: HashMap<Name, LocalInfo>,
    param_count: u32,
    /// Non-parameter local types in declaration order, for the
    /// code-section local-group prefix.
    extra: Vec<ValType>,
}

impl LocalTable {
    /// Build the complete table for a function: parameters first (indices
    /// `0..param_count`), then every `var` in the body in source order.
    pub fn build(
        func: &FuncDef,
        ast: &Ast,
        interner: &Interner,
    ) -> Result<LocalTable, CompileError> {
        let mut table = LocalTable::default();

        for (name, ty) in &func.params {
            table.declare_param(name, *ty, interner)?;
        }

        for &child in &func.body {
            table.collect(child, ast, interner)?;
        }

        tracing::trace!(
            params = table.param_count,
            locals = table.extra.len(),
            "collected locals"
        );

        Ok(table)
    }

    pub fn lookup(&self, name: Name) -> Option<LocalInfo> {
        self.map.get(&name).copied()
    }

    /// Non-parameter local types in declaration order.
    pub fn extra(&self) -> &[ValType] {
        &self.extra
    }

    fn declare_param(
        &mut self,
        name: &str,
        ty: ValType,
        interner: &Interner,
    ) -> Result<(), CompileError> {
        let index = LocalIdx(self.param_count);
        let key = interner.intern(name);
        if self.map.insert(key, LocalInfo { index, ty }).is_some() {
            return Err(CompileError::DuplicateDefinition(name.to_string()));
        }
        self.param_count += 1;
        Ok(())
    }

    fn declare_local(
        &mut self,
        name: &str,
        ty: ValType,
        interner: &Interner,
    ) -> Result<(), CompileError> {
        let index = LocalIdx(self.param_count + self.extra.len() as u32);
        let key = interner.intern(name);
        if self.map.insert(key, LocalInfo { index, ty }).is_some() {
            return Err(CompileError::DuplicateDefinition(name.to_string()));
        }
        self.extra.push(ty);
        Ok(())
    }

    /// Pre-order walk over every construct that may nest a declaration.
    fn collect(
        &mut self,
        id: NodeId,
        ast: &Ast,
        interner: &Interner,
    ) -> Result<(), CompileError> {
        match ast.node(id) {
            Node::Var { name, ty, init } => {
                self.declare_local(name, *ty, interner)?;
                self.collect(*init, ast, interner)
            }
            Node::Binary { lhs, rhs, .. } => {
                self.collect(*lhs, ast, interner)?;
                self.collect(*rhs, ast, interner)
            }
            Node::Call { args, .. } => {
                for &arg in args {
                    self.collect(arg, ast, interner)?;
                }
                Ok(())
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                self.collect(*cond, ast, interner)?;
                self.collect(*then, ast, interner)?;
                if let Some(els) = otherwise {
                    self.collect(*els, ast, interner)?;
                }
                Ok(())
            }
            Node::Block(children) => {
                for &child in children {
                    self.collect(child, ast, interner)?;
                }
                Ok(())
            }
            Node::Set { value, .. } => self.collect(*value, ast, interner),
            Node::While { cond, body } => {
                self.collect(*cond, ast, interner)?;
                for &child in body {
                    self.collect(child, ast, interner)?;
                }
                Ok(())
            }
            Node::Load { addr, .. } => self.collect(*addr, ast, interner),
            Node::Store { addr, value, .. } => {
                self.collect(*addr, ast, interner)?;
                self.collect(*value, ast, interner)
            }
            Node::Int(_) | Node::Float(_) | Node::Ident(_) => Ok(()),
            Node::Func(_) | Node::Export(_) | Node::ImportFunc(_) => {
                unreachable!("declaration form inside a function body")
            }
        }
    }
}
