//! Expression typing.
//!
//! [`type_of`] is a pure function over node handles. The emitter consults
//! it to pick operator opcodes, block result bytes, and drop points; it
//! never caches, the tree is shallow. Type *agreement* (operands, branches,
//! initializers, conditions) is enforced at emission, not here; the only
//! failures here are unresolved names.

use crate::decls::ModuleDecls;
use crate::error::CompileError;
use crate::ids::NodeId;
use crate::interner::Interner;
use crate::locals::LocalTable;
use crate::syntax::ast::{Ast, Node};
use crate::types::ValType;

/// Compute the value type an expression leaves on the stack, or `None`
/// for void.
pub fn type_of(
    id: NodeId,
    ast: &Ast,
    decls: &ModuleDecls,
    locals: &LocalTable,
    interner: &Interner,
) -> Result<Option<ValType>, CompileError> {
    match ast.node(id) {
        Node::Int(_) => Ok(Some(ValType::I32)),
        Node::Float(_) => Ok(Some(ValType::F64)),

        Node::Ident(name) => match locals.lookup(interner.intern(name)) {
            Some(info) => Ok(Some(info.ty)),
            None => Err(CompileError::UndefinedVariable(name.clone())),
        },

        Node::Binary { op, lhs, .. } => {
            if op.is_comparison() {
                Ok(Some(ValType::I32))
            } else {
                type_of(*lhs, ast, decls, locals, interner)
            }
        }

        Node::Call { callee, .. } => match decls.lookup(interner.intern(callee)) {
            Some(info) => Ok(info.sig.ret),
            None => Err(CompileError::UndefinedFunction(callee.clone())),
        },

        Node::If {
            then, otherwise, ..
        } => match otherwise {
            Some(_) => type_of(*then, ast, decls, locals, interner),
            None => Ok(None),
        },

        Node::Block(children) => match children.last() {
            Some(&last) => type_of(last, ast, decls, locals, interner),
            None => Ok(None),
        },

        Node::Load { ty, .. } => Ok(Some(*ty)),

        Node::Var { .. } | Node::Set { .. } | Node::While { .. } | Node::Store { .. } => Ok(None),

        Node::Func(_) | Node::Export(_) | Node::ImportFunc(_) => {
            unreachable!("declaration form in expression position")
        }
    }
}
