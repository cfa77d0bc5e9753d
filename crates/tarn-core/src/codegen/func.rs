//! Per-function body emission.
//!
//! Emission is single-pass over the AST: each construct has a fixed
//! translation, and every type agreement the module relies on is checked
//! here, right before the bytes that depend on it are written. Stack
//! balance follows one rule: every non-void child in a non-terminal (or
//! void-context) position is followed by an explicit `drop`.

use super::opcodes;
use super::writer::Writer;
use crate::decls::ModuleDecls;
use crate::error::CompileError;
use crate::ids::NodeId;
use crate::interner::Interner;
use crate::locals::{LocalInfo, LocalTable};
use crate::syntax::ast::{Ast, FuncDef, Node};
use crate::typer::type_of;
use crate::types::ValType;

fn ty_str(ty: Option<ValType>) -> &'static str {
    match ty {
        Some(ValType::I32) => "i32",
        Some(ValType::I64) => "i64",
        Some(ValType::F32) => "f32",
        Some(ValType::F64) => "f64",
        None => "void",
    }
}

pub(crate) struct FuncEmitter<'a> {
    ast: &'a Ast,
    decls: &'a ModuleDecls,
    interner: &'a Interner,
    locals: LocalTable,
    code: Writer,
}

impl<'a> FuncEmitter<'a> {
    /// Emit one framed Code-section entry: total length, local groups,
    /// code bytes, final `end`.
    pub fn emit(
        func: &FuncDef,
        ast: &'a Ast,
        decls: &'a ModuleDecls,
        interner: &'a Interner,
    ) -> Result<Vec<u8>, CompileError> {
        let locals = LocalTable::build(func, ast, interner)?;
        let mut emitter = FuncEmitter {
            ast,
            decls,
            interner,
            locals,
            code: Writer::new(),
        };

        emitter.emit_body(func)?;
        emitter.code.byte(opcodes::END);

        // Consecutive locals of one type are run-length encoded.
        let mut body = Writer::new();
        let groups = local_groups(emitter.locals.extra());
        body.uleb(groups.len() as u32);
        for (count, ty) in groups {
            body.uleb(count);
            body.byte(ty.tag());
        }
        body.bytes(emitter.code.as_bytes());

        let mut framed = Writer::new();
        framed.uleb(body.len() as u32);
        framed.bytes(body.as_bytes());
        Ok(framed.into_bytes())
    }

    /// The body is a block: drop all but the last child; the last child
    /// must produce the declared return type, or is itself dropped when
    /// the function returns void.
    fn emit_body(&mut self, func: &FuncDef) -> Result<(), CompileError> {
        let Some((&last, rest)) = func.body.split_last() else {
            if func.ret.is_some() {
                return Err(CompileError::TypeMismatch(format!(
                    "function `{}` declares a result but has an empty body",
                    func.name
                )));
            }
            return Ok(());
        };

        for &child in rest {
            self.emit_dropped(child)?;
        }

        let last_ty = self.ty_of(last)?;
        match func.ret {
            Some(ret) => {
                if last_ty != Some(ret) {
                    return Err(CompileError::TypeMismatch(format!(
                        "function `{}` declares {} but its body produces {}",
                        func.name,
                        ret,
                        ty_str(last_ty)
                    )));
                }
                self.emit_expr(last)?;
            }
            None => {
                self.emit_expr(last)?;
                if last_ty.is_some() {
                    self.code.byte(opcodes::DROP);
                }
            }
        }
        Ok(())
    }

    fn ty_of(&self, id: NodeId) -> Result<Option<ValType>, CompileError> {
        type_of(id, self.ast, self.decls, &self.locals, self.interner)
    }

    fn local(&self, name: &str) -> Result<LocalInfo, CompileError> {
        self.locals
            .lookup(self.interner.intern(name))
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))
    }

    /// Emit a child in void context: any produced value is dropped.
    fn emit_dropped(&mut self, id: NodeId) -> Result<(), CompileError> {
        let ty = self.ty_of(id)?;
        self.emit_expr(id)?;
        if ty.is_some() {
            self.code.byte(opcodes::DROP);
        }
        Ok(())
    }

    /// Require a child to produce `i32`, the type of conditions and
    /// memory addresses.
    fn emit_i32(&mut self, id: NodeId, what: &str) -> Result<(), CompileError> {
        let ty = self.ty_of(id)?;
        if ty != Some(ValType::I32) {
            return Err(CompileError::TypeMismatch(format!(
                "{what} must be i32, found {}",
                ty_str(ty)
            )));
        }
        self.emit_expr(id)
    }

    fn emit_expr(&mut self, id: NodeId) -> Result<(), CompileError> {
        match self.ast.node(id) {
            Node::Int(value) => {
                // Integer literals are i32; the encoding is signed LEB128.
                if i32::try_from(*value).is_err() {
                    return Err(CompileError::Overflow(format!(
                        "integer literal {value} does not fit in i32"
                    )));
                }
                self.code.byte(opcodes::I32_CONST);
                self.code.sleb(*value);
            }

            Node::Float(value) => {
                self.code.byte(opcodes::F64_CONST);
                self.code.f64_raw(*value);
            }

            Node::Ident(name) => {
                let info = self.local(name)?;
                self.code.byte(opcodes::LOCAL_GET);
                self.code.uleb(info.index.0);
            }

            Node::Binary { op, lhs, rhs } => {
                let lhs_ty = self.ty_of(*lhs)?;
                let rhs_ty = self.ty_of(*rhs)?;
                let operand_ty = match lhs_ty {
                    Some(ty) if rhs_ty == Some(ty) => ty,
                    _ => {
                        return Err(CompileError::TypeMismatch(format!(
                            "`{}` applied to {} and {}",
                            op.head(),
                            ty_str(lhs_ty),
                            ty_str(rhs_ty)
                        )))
                    }
                };
                // Dispatch by the left operand's type; fails early for
                // float-incompatible operators.
                let opcode = opcodes::binary(*op, operand_ty)?;
                self.emit_expr(*lhs)?;
                self.emit_expr(*rhs)?;
                self.code.byte(opcode);
            }

            Node::Call { callee, args } => {
                let info = self
                    .decls
                    .lookup(self.interner.intern(callee))
                    .ok_or_else(|| CompileError::UndefinedFunction(callee.clone()))?
                    .clone();
                if args.len() != info.sig.params.len() {
                    return Err(CompileError::TypeMismatch(format!(
                        "`{callee}` takes {} argument(s), found {}",
                        info.sig.params.len(),
                        args.len()
                    )));
                }
                for (&arg, &param_ty) in args.iter().zip(&info.sig.params) {
                    let arg_ty = self.ty_of(arg)?;
                    if arg_ty != Some(param_ty) {
                        return Err(CompileError::TypeMismatch(format!(
                            "argument to `{callee}` must be {param_ty}, found {}",
                            ty_str(arg_ty)
                        )));
                    }
                    self.emit_expr(arg)?;
                }
                self.code.byte(opcodes::CALL);
                self.code.uleb(info.index.0);
            }

            Node::If {
                cond,
                then,
                otherwise,
            } => {
                let then_ty = self.ty_of(*then)?;
                match otherwise {
                    Some(els) => {
                        let else_ty = self.ty_of(*els)?;
                        if then_ty != else_ty {
                            return Err(CompileError::TypeMismatch(format!(
                                "if branches produce {} and {}",
                                ty_str(then_ty),
                                ty_str(else_ty)
                            )));
                        }
                        self.emit_i32(*cond, "if condition")?;
                        self.code.byte(opcodes::IF);
                        self.code
                            .byte(then_ty.map_or(opcodes::VOID_BLOCK, ValType::tag));
                        self.emit_expr(*then)?;
                        self.code.byte(opcodes::ELSE);
                        self.emit_expr(*els)?;
                        self.code.byte(opcodes::END);
                    }
                    None => {
                        // Statement form: the consequent's value, if any,
                        // is discarded inside the block.
                        self.emit_i32(*cond, "if condition")?;
                        self.code.byte(opcodes::IF);
                        self.code.byte(opcodes::VOID_BLOCK);
                        self.emit_expr(*then)?;
                        if then_ty.is_some() {
                            self.code.byte(opcodes::DROP);
                        }
                        self.code.byte(opcodes::END);
                    }
                }
            }

            Node::Block(children) => {
                if let Some((&last, rest)) = children.split_last() {
                    for &child in rest {
                        self.emit_dropped(child)?;
                    }
                    self.emit_expr(last)?;
                }
            }

            Node::Var { name, ty, init } => {
                let init_ty = self.ty_of(*init)?;
                if init_ty != Some(*ty) {
                    return Err(CompileError::TypeMismatch(format!(
                        "`{name}` is declared {ty} but initialized with {}",
                        ty_str(init_ty)
                    )));
                }
                self.emit_expr(*init)?;
                let info = self.local(name)?;
                self.code.byte(opcodes::LOCAL_SET);
                self.code.uleb(info.index.0);
            }

            Node::Set { name, value } => {
                let info = self.local(name)?;
                let value_ty = self.ty_of(*value)?;
                if value_ty != Some(info.ty) {
                    return Err(CompileError::TypeMismatch(format!(
                        "`{name}` is declared {} but assigned {}",
                        info.ty,
                        ty_str(value_ty)
                    )));
                }
                self.emit_expr(*value)?;
                self.code.byte(opcodes::LOCAL_SET);
                self.code.uleb(info.index.0);
            }

            Node::While { cond, body } => {
                // block (void)
                //   loop (void)
                //     <cond> i32.eqz br_if 1   ;; exit the block
                //     <body, every child dropped>
                //     br 0                     ;; next iteration
                //   end
                // end
                self.code.byte(opcodes::BLOCK);
                self.code.byte(opcodes::VOID_BLOCK);
                self.code.byte(opcodes::LOOP);
                self.code.byte(opcodes::VOID_BLOCK);
                self.emit_i32(*cond, "while condition")?;
                self.code.byte(opcodes::I32_EQZ);
                self.code.byte(opcodes::BR_IF);
                self.code.uleb(1);
                for &child in body {
                    self.emit_dropped(child)?;
                }
                self.code.byte(opcodes::BR);
                self.code.uleb(0);
                self.code.byte(opcodes::END);
                self.code.byte(opcodes::END);
            }

            Node::Load { ty, addr } => {
                self.emit_i32(*addr, "load address")?;
                self.code.byte(opcodes::load(*ty));
                self.code.uleb(ty.align_exp());
                self.code.uleb(0);
            }

            Node::Store { ty, addr, value } => {
                let value_ty = self.ty_of(*value)?;
                if value_ty != Some(*ty) {
                    return Err(CompileError::TypeMismatch(format!(
                        "store of {ty} given a {} value",
                        ty_str(value_ty)
                    )));
                }
                self.emit_i32(*addr, "store address")?;
                self.emit_expr(*value)?;
                self.code.byte(opcodes::store(*ty));
                self.code.uleb(ty.align_exp());
                self.code.uleb(0);
            }

            Node::Func(_) | Node::Export(_) | Node::ImportFunc(_) => {
                unreachable!("declaration form in expression position")
            }
        }
        Ok(())
    }
}

fn local_groups(types: &[ValType]) -> Vec<(u32, ValType)> {
    let mut groups: Vec<(u32, ValType)> = Vec::new();
    for &ty in types {
        match groups.last_mut() {
            Some((count, last)) if *last == ty => *count += 1,
            _ => groups.push((1, ty)),
        }
    }
    groups
}
