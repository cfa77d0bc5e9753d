//! Parser: S-expression text to the arena AST.

use super::ast::{Ast, BinOp, FuncDef, ImportDef, Node};
use crate::ids::NodeId;
use crate::types::ValType;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SexpParser;

/// Parse error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("expected {expected}, found `{found}`")]
    UnexpectedRule { expected: String, found: String },

    #[error("malformed `{head}` form: {message}")]
    Malformed { head: String, message: String },

    #[error("missing {0}")]
    Missing(String),

    #[error("`{0}` is not allowed at the top level; expected fn, export, or import")]
    UnexpectedTopLevel(String),

    #[error("`{0}` is a reserved type name")]
    ReservedName(String),

    #[error("unknown type name `{0}`")]
    UnknownType(String),

    #[error("invalid numeric literal `{0}`")]
    InvalidNumber(String),

    #[error("integer literal `{0}` is out of range")]
    IntOutOfRange(String),
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        ParseError::Syntax {
            message: err.variant.message().to_string(),
            line,
            column,
        }
    }
}

fn malformed(head: &str, message: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        head: head.to_string(),
        message: message.into(),
    }
}

/// Reject the reserved type identifiers in binding positions.
fn check_bindable(name: &str) -> Result<(), ParseError> {
    if name == "void" || ValType::from_name(name).is_some() {
        return Err(ParseError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Parse a source file into an [`Ast`].
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    let mut pairs = SexpParser::parse(Rule::file, source)?;
    let file = pairs
        .next()
        .ok_or_else(|| ParseError::Missing("input".into()))?;

    let mut ast = Ast::new();
    for pair in file.into_inner() {
        match pair.as_rule() {
            Rule::EOI => {}
            Rule::list => {
                let id = lower_top_level(pair, &mut ast)?;
                ast.top_level.push(id);
            }
            _ => return Err(ParseError::UnexpectedTopLevel(pair.as_str().to_string())),
        }
    }
    Ok(ast)
}

fn expect_symbol<'a>(
    iter: &mut impl Iterator<Item = Pair<'a, Rule>>,
    what: &str,
) -> Result<String, ParseError> {
    match iter.next() {
        Some(p) if p.as_rule() == Rule::symbol => Ok(p.as_str().to_string()),
        Some(p) => Err(ParseError::UnexpectedRule {
            expected: what.to_string(),
            found: p.as_str().to_string(),
        }),
        None => Err(ParseError::Missing(what.to_string())),
    }
}

fn expect_type<'a>(
    iter: &mut impl Iterator<Item = Pair<'a, Rule>>,
    head: &str,
) -> Result<ValType, ParseError> {
    let name = expect_symbol(iter, "type name")?;
    if name == "void" {
        return Err(malformed(head, "`void` is not a value type here"));
    }
    ValType::from_name(&name).ok_or(ParseError::UnknownType(name))
}

fn expect_end<'a>(
    iter: &mut impl Iterator<Item = Pair<'a, Rule>>,
    head: &str,
) -> Result<(), ParseError> {
    match iter.next() {
        Some(p) => Err(malformed(
            head,
            format!("unexpected trailing form `{}`", p.as_str()),
        )),
        None => Ok(()),
    }
}

fn lower_top_level(pair: Pair<'_, Rule>, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let mut inner = pair.into_inner();
    let head = match inner.next() {
        Some(p) if p.as_rule() == Rule::symbol => p.as_str().to_string(),
        Some(p) => return Err(ParseError::UnexpectedTopLevel(p.as_str().to_string())),
        None => return Err(ParseError::UnexpectedTopLevel("()".to_string())),
    };

    match head.as_str() {
        "fn" => lower_fn(inner, ast),
        "export" => {
            let name = expect_symbol(&mut inner, "export name")?;
            expect_end(&mut inner, "export")?;
            Ok(ast.push(Node::Export(name)))
        }
        "import" => lower_import(inner, ast),
        other => Err(ParseError::UnexpectedTopLevel(other.to_string())),
    }
}

/// Parse a `((name type) ...)` parameter list.
fn lower_params(pair: Pair<'_, Rule>, head: &str) -> Result<Vec<(String, ValType)>, ParseError> {
    if pair.as_rule() != Rule::list {
        return Err(malformed(head, "expected a ((name type) ...) parameter list"));
    }
    let mut params = Vec::new();
    for p in pair.into_inner() {
        if p.as_rule() != Rule::list {
            return Err(malformed(head, "parameter must be a (name type) pair"));
        }
        let mut parts = p.into_inner();
        let name = expect_symbol(&mut parts, "parameter name")?;
        check_bindable(&name)?;
        let ty = expect_type(&mut parts, head)?;
        expect_end(&mut parts, head)?;
        params.push((name, ty));
    }
    Ok(params)
}

/// `(fn name ((p ty) ...) [ret] body...)`
fn lower_fn<'a>(
    inner: impl Iterator<Item = Pair<'a, Rule>>,
    ast: &mut Ast,
) -> Result<NodeId, ParseError> {
    let mut inner = inner.peekable();

    let name = expect_symbol(&mut inner, "function name")?;
    check_bindable(&name)?;

    let params_pair = inner
        .next()
        .ok_or_else(|| ParseError::Missing("parameter list".into()))?;
    let params = lower_params(params_pair, "fn")?;

    // An optional return type follows the parameter list; `void` spells
    // out the default. The type identifiers are reserved, so a symbol
    // naming one can never be a body expression.
    let mut ret = None;
    if let Some(p) = inner.peek() {
        if p.as_rule() == Rule::symbol {
            if let Some(ty) = ValType::from_name(p.as_str()) {
                ret = Some(ty);
                inner.next();
            } else if p.as_str() == "void" {
                inner.next();
            }
        }
    }

    let mut body = Vec::new();
    for p in inner {
        body.push(lower_form(p, ast)?);
    }

    Ok(ast.push(Node::Func(FuncDef {
        name,
        params,
        ret,
        body,
    })))
}

/// `(import module field ((p ty) ...) [ret])`
fn lower_import<'a>(
    mut inner: impl Iterator<Item = Pair<'a, Rule>>,
    ast: &mut Ast,
) -> Result<NodeId, ParseError> {
    let module = expect_symbol(&mut inner, "import module name")?;
    let field = expect_symbol(&mut inner, "import field name")?;
    check_bindable(&field)?;

    let params_pair = inner
        .next()
        .ok_or_else(|| ParseError::Missing("parameter list".into()))?;
    let params = lower_params(params_pair, "import")?
        .into_iter()
        .map(|(_, ty)| ty)
        .collect();

    let mut ret = None;
    if let Some(p) = inner.next() {
        let name = match p.as_rule() {
            Rule::symbol => p.as_str(),
            _ => {
                return Err(malformed("import", "return type must be a type name"));
            }
        };
        if name != "void" {
            ret = Some(ValType::from_name(name).ok_or_else(|| ParseError::UnknownType(name.to_string()))?);
        }
        expect_end(&mut inner, "import")?;
    }

    Ok(ast.push(Node::ImportFunc(ImportDef {
        module,
        field,
        params,
        ret,
    })))
}

fn parse_int(text: &str) -> Result<i64, ParseError> {
    text.parse::<i64>()
        .map_err(|_| ParseError::IntOutOfRange(text.to_string()))
}

fn parse_hex(text: &str) -> Result<i64, ParseError> {
    // Keep the sign, drop the `0x` marker.
    let digits = text.replacen("0x", "", 1);
    i64::from_str_radix(&digits, 16).map_err(|_| ParseError::IntOutOfRange(text.to_string()))
}

fn lower_form(pair: Pair<'_, Rule>, ast: &mut Ast) -> Result<NodeId, ParseError> {
    match pair.as_rule() {
        Rule::int => Ok(ast.push(Node::Int(parse_int(pair.as_str())?))),
        Rule::hex => Ok(ast.push(Node::Int(parse_hex(pair.as_str())?))),
        Rule::float => {
            let value = pair
                .as_str()
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber(pair.as_str().to_string()))?;
            Ok(ast.push(Node::Float(value)))
        }
        Rule::symbol => Ok(ast.push(Node::Ident(pair.as_str().to_string()))),
        Rule::list => lower_list(pair, ast),
        _ => Err(ParseError::UnexpectedRule {
            expected: "expression".to_string(),
            found: pair.as_str().to_string(),
        }),
    }
}

fn lower_list(pair: Pair<'_, Rule>, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let mut inner = pair.into_inner();
    let head = match inner.next() {
        Some(p) if p.as_rule() == Rule::symbol => p.as_str().to_string(),
        Some(p) => {
            return Err(ParseError::UnexpectedRule {
                expected: "operator or keyword".to_string(),
                found: p.as_str().to_string(),
            })
        }
        None => return Err(malformed("()", "empty application")),
    };

    if let Some(op) = BinOp::from_head(&head) {
        let lhs = inner
            .next()
            .ok_or_else(|| malformed(&head, "expects exactly two operands"))?;
        let rhs = inner
            .next()
            .ok_or_else(|| malformed(&head, "expects exactly two operands"))?;
        let lhs = lower_form(lhs, ast)?;
        let rhs = lower_form(rhs, ast)?;
        expect_end(&mut inner, &head)?;
        return Ok(ast.push(Node::Binary { op, lhs, rhs }));
    }

    match head.as_str() {
        "if" => {
            let cond = inner
                .next()
                .ok_or_else(|| malformed("if", "missing condition"))?;
            let then = inner
                .next()
                .ok_or_else(|| malformed("if", "missing consequent"))?;
            let cond = lower_form(cond, ast)?;
            let then = lower_form(then, ast)?;
            let otherwise = match inner.next() {
                Some(p) => Some(lower_form(p, ast)?),
                None => None,
            };
            expect_end(&mut inner, "if")?;
            Ok(ast.push(Node::If {
                cond,
                then,
                otherwise,
            }))
        }
        "block" => {
            let mut children = Vec::new();
            for p in inner {
                children.push(lower_form(p, ast)?);
            }
            Ok(ast.push(Node::Block(children)))
        }
        "var" => {
            let name = expect_symbol(&mut inner, "local name")?;
            check_bindable(&name)?;
            let ty = expect_type(&mut inner, "var")?;
            let init = inner
                .next()
                .ok_or_else(|| malformed("var", "missing initializer"))?;
            let init = lower_form(init, ast)?;
            expect_end(&mut inner, "var")?;
            Ok(ast.push(Node::Var { name, ty, init }))
        }
        "set" => {
            let name = expect_symbol(&mut inner, "local name")?;
            let value = inner
                .next()
                .ok_or_else(|| malformed("set", "missing value"))?;
            let value = lower_form(value, ast)?;
            expect_end(&mut inner, "set")?;
            Ok(ast.push(Node::Set { name, value }))
        }
        "while" => {
            let cond = inner
                .next()
                .ok_or_else(|| malformed("while", "missing condition"))?;
            let cond = lower_form(cond, ast)?;
            let mut body = Vec::new();
            for p in inner {
                body.push(lower_form(p, ast)?);
            }
            Ok(ast.push(Node::While { cond, body }))
        }
        "load" => {
            let ty = expect_type(&mut inner, "load")?;
            let addr = inner
                .next()
                .ok_or_else(|| malformed("load", "missing address"))?;
            let addr = lower_form(addr, ast)?;
            expect_end(&mut inner, "load")?;
            Ok(ast.push(Node::Load { ty, addr }))
        }
        "store" => {
            let ty = expect_type(&mut inner, "store")?;
            let addr = inner
                .next()
                .ok_or_else(|| malformed("store", "missing address"))?;
            let addr = lower_form(addr, ast)?;
            let value = inner
                .next()
                .ok_or_else(|| malformed("store", "missing value"))?;
            let value = lower_form(value, ast)?;
            expect_end(&mut inner, "store")?;
            Ok(ast.push(Node::Store { ty, addr, value }))
        }
        "fn" | "export" | "import" => Err(malformed(&head, "only allowed at the top level")),
        _ => {
            let mut args = Vec::new();
            for p in inner {
                args.push(lower_form(p, ast)?);
            }
            Ok(ast.push(Node::Call { callee: head, args }))
        }
    }
}
