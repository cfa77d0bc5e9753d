//! tarn-smith: random Tarn source generator.
//!
//! Generates random but **valid** Tarn programs from an
//! [`arbitrary::Unstructured`] byte stream. The generated code is
//! semantically valid, not just syntactically correct: expressions are
//! typed by construction, every referenced local exists, and calls only
//! target earlier functions with constructible argument types. Fuzzers
//! and property tests can therefore drive the analyzer and code
//! generator directly instead of bouncing off the parser.
//!
//! # Usage
//!
//! ```rust
//! use arbitrary::Unstructured;
//! use tarn_smith::Program;
//!
//! let data = [0x17u8; 512];
//! let mut u = Unstructured::new(&data);
//! let program: Program = u.arbitrary().unwrap();
//! let source = program.to_source();
//! assert!(source.contains("(fn "));
//! ```

use arbitrary::{Arbitrary, Result, Unstructured};

/// Configuration for the generator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of functions per program.
    pub max_functions: usize,
    /// Maximum number of parameters per function.
    pub max_params: usize,
    /// Maximum number of statements before a function's result expression.
    pub max_body_len: usize,
    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_functions: 4,
            max_params: 3,
            max_body_len: 4,
            max_expr_depth: 3,
        }
    }
}

/// The four value types of the surface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    I32,
    I64,
    F32,
    F64,
}

pub const ALL_TYPES: [Ty; 4] = [Ty::I32, Ty::I64, Ty::F32, Ty::F64];

impl Ty {
    pub fn name(self) -> &'static str {
        match self {
            Ty::I32 => "i32",
            Ty::I64 => "i64",
            Ty::F32 => "f32",
            Ty::F64 => "f64",
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Ty::I32 | Ty::I64)
    }
}

/// A generated function: declared interface plus rendered body forms.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub ret: Option<Ty>,
    body: Vec<String>,
}

impl Function {
    fn to_source(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, ty)| format!("({} {})", name, ty.name()))
            .collect();
        let ret = match self.ret {
            Some(ty) => ty.name(),
            None => "void",
        };
        let mut out = format!("(fn {} ({}) {}", self.name, params.join(" "), ret);
        for form in &self.body {
            out.push_str("\n  ");
            out.push_str(form);
        }
        out.push(')');
        out
    }
}

/// A generated program. Every function is exported.
#[derive(Debug)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn arbitrary_with_config(u: &mut Unstructured, config: &Config) -> Result<Self> {
        let count = u.int_in_range(1..=config.max_functions)?;
        let mut gen = Generator {
            config: config.clone(),
            functions: Vec::new(),
        };
        for i in 0..count {
            let func = gen.function(u, i)?;
            gen.functions.push(func);
        }
        Ok(Program {
            functions: gen.functions,
        })
    }

    /// Render the program as Tarn source.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for func in &self.functions {
            out.push_str(&func.to_source());
            out.push_str("\n\n");
        }
        for func in &self.functions {
            out.push_str(&format!("(export {})\n", func.name));
        }
        out
    }
}

impl<'a> Arbitrary<'a> for Program {
    fn arbitrary(u: &mut Unstructured<'a>) -> Result<Self> {
        Self::arbitrary_with_config(u, &Config::default())
    }
}

/// Per-program generation state.
struct Generator {
    config: Config,
    functions: Vec<Function>,
}

/// Per-function generation state: visible locals and a name counter.
struct Scope {
    locals: Vec<(String, Ty)>,
    next_var: usize,
}

impl Scope {
    fn locals_of(&self, ty: Ty) -> Vec<&str> {
        self.locals
            .iter()
            .filter(|(_, t)| *t == ty)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// A type is constructible when a literal exists for it or some
    /// visible local already carries it.
    fn constructible(&self, ty: Ty) -> bool {
        matches!(ty, Ty::I32 | Ty::F64) || self.locals.iter().any(|(_, t)| *t == ty)
    }

    fn constructible_types(&self) -> Vec<Ty> {
        ALL_TYPES
            .into_iter()
            .filter(|&ty| self.constructible(ty))
            .collect()
    }
}

impl Generator {
    fn function(&mut self, u: &mut Unstructured, index: usize) -> Result<Function> {
        let param_count = u.int_in_range(0..=self.config.max_params)?;
        let mut params = Vec::with_capacity(param_count);
        for p in 0..param_count {
            let ty = *u.choose(&ALL_TYPES)?;
            params.push((format!("p{p}"), ty));
        }

        let mut scope = Scope {
            locals: params.clone(),
            next_var: 0,
        };

        let mut body = Vec::new();
        let stmt_count = u.int_in_range(0..=self.config.max_body_len)?;
        for _ in 0..stmt_count {
            body.push(self.stmt(u, &mut scope, self.config.max_expr_depth)?);
        }

        // Void functions may end on a statement; value-returning ones end
        // on an expression of the declared type.
        let candidates = scope.constructible_types();
        let ret = if u.arbitrary::<bool>()? {
            Some(*u.choose(&candidates)?)
        } else {
            None
        };
        if let Some(ty) = ret {
            let result = self.expr(u, &scope, ty, self.config.max_expr_depth)?;
            body.push(result);
        }

        Ok(Function {
            name: format!("f{index}"),
            params,
            ret,
            body,
        })
    }

    /// A void-typed statement form.
    fn stmt(&self, u: &mut Unstructured, scope: &mut Scope, depth: usize) -> Result<String> {
        let mutable: Vec<(String, Ty)> = scope.locals.clone();
        let choice = u.int_in_range(0..=4u8)?;
        match choice {
            // Declare a fresh local.
            0 | 1 => {
                let candidates = scope.constructible_types();
                let ty = *u.choose(&candidates)?;
                let init = self.expr(u, scope, ty, depth.saturating_sub(1))?;
                let name = format!("v{}", scope.next_var);
                scope.next_var += 1;
                scope.locals.push((name.clone(), ty));
                Ok(format!("(var {} {} {})", name, ty.name(), init))
            }
            // Reassign an existing local.
            2 if !mutable.is_empty() => {
                let (name, ty) = u.choose(&mutable)?;
                let value = self.expr(u, scope, *ty, depth.saturating_sub(1))?;
                Ok(format!("(set {name} {value})"))
            }
            // Statement-form if: the consequent's value is discarded.
            3 => {
                let cond = self.expr(u, scope, Ty::I32, depth.saturating_sub(1))?;
                let candidates = scope.constructible_types();
                let ty = *u.choose(&candidates)?;
                let then = self.expr(u, scope, ty, depth.saturating_sub(1))?;
                Ok(format!("(if {cond} {then})"))
            }
            // Store to linear memory at a small constant address.
            4 => {
                let addr = u.int_in_range(0..=255u32)? * 4;
                let value = self.expr(u, scope, Ty::I32, depth.saturating_sub(1))?;
                Ok(format!("(store i32 {addr} {value})"))
            }
            _ => {
                // No local to assign yet; declare one instead.
                let init = self.expr(u, scope, Ty::I32, depth.saturating_sub(1))?;
                let name = format!("v{}", scope.next_var);
                scope.next_var += 1;
                scope.locals.push((name.clone(), Ty::I32));
                Ok(format!("(var {name} i32 {init})"))
            }
        }
    }

    fn literal(&self, u: &mut Unstructured, ty: Ty) -> Result<String> {
        match ty {
            Ty::I32 => {
                let value: i16 = u.arbitrary()?;
                if value >= 0 && u.arbitrary::<bool>()? {
                    Ok(format!("0x{value:X}"))
                } else {
                    Ok(value.to_string())
                }
            }
            Ty::F64 => {
                let whole = u.int_in_range(0..=9999u32)?;
                let frac = u.int_in_range(0..=99u32)?;
                Ok(format!("{whole}.{frac}"))
            }
            // No literal syntax reaches i64/f32; callers guard on
            // constructibility first.
            Ty::I64 | Ty::F32 => Err(arbitrary::Error::IncorrectFormat),
        }
    }

    /// An expression of exactly the requested type.
    fn expr(&self, u: &mut Unstructured, scope: &Scope, ty: Ty, depth: usize) -> Result<String> {
        let locals = scope.locals_of(ty);

        if depth == 0 {
            if !locals.is_empty() && (!matches!(ty, Ty::I32 | Ty::F64) || u.arbitrary::<bool>()?) {
                return Ok(u.choose(&locals)?.to_string());
            }
            return self.literal(u, ty);
        }

        // Callees must return `ty` and take only argument types this
        // scope can construct.
        let callees: Vec<&Function> = self
            .functions
            .iter()
            .filter(|f| f.ret == Some(ty))
            .filter(|f| f.params.iter().all(|&(_, p)| scope.constructible(p)))
            .collect();

        let choice = u.int_in_range(0..=5u8)?;
        match choice {
            0 => {
                if locals.is_empty() {
                    self.literal(u, ty)
                } else {
                    Ok(u.choose(&locals)?.to_string())
                }
            }
            1 | 2 => {
                let op = if ty.is_integer() {
                    *u.choose(&["+", "-", "*", "and", "or", "xor"])?
                } else {
                    *u.choose(&["+", "-", "*", "/"])?
                };
                let lhs = self.expr(u, scope, ty, depth - 1)?;
                let rhs = self.expr(u, scope, ty, depth - 1)?;
                Ok(format!("({op} {lhs} {rhs})"))
            }
            3 if ty == Ty::I32 => {
                // A comparison over any constructible operand type.
                let candidates = scope.constructible_types();
                let operand = *u.choose(&candidates)?;
                let op = *u.choose(&["==", "!=", "<", ">", "<=", ">="])?;
                let lhs = self.expr(u, scope, operand, depth - 1)?;
                let rhs = self.expr(u, scope, operand, depth - 1)?;
                Ok(format!("({op} {lhs} {rhs})"))
            }
            4 => {
                let cond = self.expr(u, scope, Ty::I32, depth - 1)?;
                let then = self.expr(u, scope, ty, depth - 1)?;
                let els = self.expr(u, scope, ty, depth - 1)?;
                Ok(format!("(if {cond} {then} {els})"))
            }
            5 if !callees.is_empty() => {
                let callee = u.choose(&callees)?;
                let mut args = Vec::with_capacity(callee.params.len());
                for &(_, p) in &callee.params {
                    args.push(self.expr(u, scope, p, depth - 1)?);
                }
                let name = &callee.name;
                if args.is_empty() {
                    Ok(format!("({name})"))
                } else {
                    Ok(format!("({} {})", name, args.join(" ")))
                }
            }
            _ => {
                if locals.is_empty() {
                    self.literal(u, ty)
                } else {
                    Ok(u.choose(&locals)?.to_string())
                }
            }
        }
    }
}
