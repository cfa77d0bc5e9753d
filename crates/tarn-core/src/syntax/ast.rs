//! Abstract syntax tree.
//!
//! The tree lives in a single append-only arena and is referenced by dense
//! [`NodeId`] handles. The parser constructs it; everything downstream
//! only reads.

use crate::ids::NodeId;
use crate::index_vec::IndexVec;
use crate::types::ValType;
use serde::Serialize;

/// The node arena plus the ordered list of top-level forms.
#[derive(Debug, Default, Serialize)]
pub struct Ast {
    nodes: IndexVec<NodeId, Node>,
    pub top_level: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Binary operator heads of the surface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn from_head(head: &str) -> Option<BinOp> {
        Some(match head {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Rem,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "xor" => BinOp::Xor,
            "shl" => BinOp::Shl,
            "shr" => BinOp::Shr,
            _ => return None,
        })
    }

    pub fn head(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        }
    }

    /// Comparisons produce `i32` regardless of the operand type.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }
}

/// A function definition: `(fn name ((p ty) ...) [ret] body...)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<(String, ValType)>,
    pub ret: Option<ValType>,
    pub body: Vec<NodeId>,
}

/// An imported function: `(import module field ((p ty) ...) [ret])`.
///
/// The import is callable under its field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDef {
    pub module: String,
    pub field: String,
    pub params: Vec<ValType>,
    pub ret: Option<ValType>,
}

/// A tagged AST node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    Int(i64),
    Float(f64),
    Ident(String),
    Binary {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Call {
        callee: String,
        args: Vec<NodeId>,
    },
    If {
        cond: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    },
    Block(Vec<NodeId>),
    Var {
        name: String,
        ty: ValType,
        init: NodeId,
    },
    Set {
        name: String,
        value: NodeId,
    },
    While {
        cond: NodeId,
        body: Vec<NodeId>,
    },
    Load {
        ty: ValType,
        addr: NodeId,
    },
    Store {
        ty: ValType,
        addr: NodeId,
        value: NodeId,
    },
    Func(FuncDef),
    Export(String),
    ImportFunc(ImportDef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_op_heads_round_trip() {
        for op in [
            BinOp::Add,
            BinOp::Sub,
            BinOp::Mul,
            BinOp::Div,
            BinOp::Rem,
            BinOp::Eq,
            BinOp::Ne,
            BinOp::Lt,
            BinOp::Gt,
            BinOp::Le,
            BinOp::Ge,
            BinOp::And,
            BinOp::Or,
            BinOp::Xor,
            BinOp::Shl,
            BinOp::Shr,
        ] {
            assert_eq!(BinOp::from_head(op.head()), Some(op));
        }
        assert_eq!(BinOp::from_head("<<"), None);
    }

    #[test]
    fn test_comparison_classification() {
        assert!(BinOp::Le.is_comparison());
        assert!(!BinOp::Shl.is_comparison());
    }
}
