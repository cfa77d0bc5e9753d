//! Host runtime for compiled Tarn modules.
//!
//! Loads a `.wasm` produced by `tarnc` and either invokes a named export
//! with scalar arguments, drives the wasmexec pointer contract against
//! stdin, or just lists the module's exports. Imports the module declares
//! are stubbed with trapping functions, which is enough for inspection
//! and for modules that never call them.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use wasmtime::{Engine, Extern, ExternType, Instance, Linker, Module, Store, Val, ValType};

/// Offsets of the wasmexec contract: input is written at `INPUT_BASE`,
/// the reply is read from the pointer `run` returns.
const INPUT_BASE: u64 = 0x10000;
const PAGE_SIZE: u64 = 0x10000;

#[derive(Parser)]
#[command(name = "tarn-host")]
#[command(about = "Run compiled Tarn modules with wasmtime", long_about = None)]
struct Args {
    /// Path to the compiled module.
    module: PathBuf,

    /// Export to invoke.
    #[arg(long)]
    invoke: Option<String>,

    /// Arguments for the invoked export (i32/i64/f32/f64, per the
    /// export's signature).
    args: Vec<String>,

    /// Feed stdin to the module through the wasmexec contract and write
    /// the reply payload to stdout.
    #[arg(long, conflicts_with = "invoke")]
    exec: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let engine = Engine::default();
    let module = Module::from_file(&engine, &args.module)
        .with_context(|| format!("failed to load {}", args.module.display()))?;

    let mut linker: Linker<()> = Linker::new(&engine);
    linker
        .define_unknown_imports_as_traps(&module)
        .context("failed to stub imports")?;

    let mut store = Store::new(&engine, ());
    let instance = linker
        .instantiate(&mut store, &module)
        .context("failed to instantiate module")?;

    if args.exec {
        return wasmexec(&mut store, &instance);
    }

    match &args.invoke {
        Some(name) => invoke(&mut store, &instance, name, &args.args),
        None => list_exports(&module),
    }
}

fn list_exports(module: &Module) -> Result<()> {
    for export in module.exports() {
        match export.ty() {
            ExternType::Func(ty) => println!("func   {} : {ty}", export.name()),
            ExternType::Memory(_) => println!("memory {}", export.name()),
            other => println!("other  {} : {other:?}", export.name()),
        }
    }
    Ok(())
}

fn parse_arg(text: &str, ty: &ValType) -> Result<Val> {
    Ok(match ty {
        ValType::I32 => Val::I32(text.parse().with_context(|| format!("bad i32 `{text}`"))?),
        ValType::I64 => Val::I64(text.parse().with_context(|| format!("bad i64 `{text}`"))?),
        ValType::F32 => {
            let v: f32 = text.parse().with_context(|| format!("bad f32 `{text}`"))?;
            Val::F32(v.to_bits())
        }
        ValType::F64 => {
            let v: f64 = text.parse().with_context(|| format!("bad f64 `{text}`"))?;
            Val::F64(v.to_bits())
        }
        other => bail!("unsupported parameter type {other}"),
    })
}

fn invoke(store: &mut Store<()>, instance: &Instance, name: &str, args: &[String]) -> Result<()> {
    let func = instance
        .get_func(&mut *store, name)
        .with_context(|| format!("no exported function `{name}`"))?;
    let ty = func.ty(&*store);

    let params: Vec<ValType> = ty.params().collect();
    if params.len() != args.len() {
        bail!("`{name}` takes {} argument(s), got {}", params.len(), args.len());
    }
    let params: Vec<Val> = args
        .iter()
        .zip(&params)
        .map(|(text, ty)| parse_arg(text, ty))
        .collect::<Result<_>>()?;

    let mut results = vec![Val::I32(0); ty.results().len()];
    func.call(&mut *store, &params, &mut results)
        .with_context(|| format!("`{name}` trapped"))?;

    for result in results {
        match result {
            Val::I32(v) => println!("{v}"),
            Val::I64(v) => println!("{v}"),
            Val::F32(bits) => println!("{}", f32::from_bits(bits)),
            Val::F64(bits) => println!("{}", f64::from_bits(bits)),
            other => println!("{other:?}"),
        }
    }
    Ok(())
}

/// Drive the wasmexec contract: write stdin at `INPUT_BASE`, call
/// `run(ptr, len)`, read the length-prefixed reply at the returned
/// pointer, and copy the payload to stdout.
fn wasmexec(store: &mut Store<()>, instance: &Instance) -> Result<()> {
    let memory = match instance.get_export(&mut *store, "memory") {
        Some(Extern::Memory(m)) => m,
        _ => bail!("module does not export `memory`"),
    };

    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("failed to read stdin")?;

    // Grow memory to cover the input region before writing into it.
    let needed_pages = (INPUT_BASE + input.len() as u64).div_ceil(PAGE_SIZE) + 1;
    let current = memory.size(&*store);
    if current < needed_pages {
        memory
            .grow(&mut *store, needed_pages - current)
            .context("failed to grow memory")?;
    }
    memory
        .write(&mut *store, INPUT_BASE as usize, &input)
        .context("failed to write input")?;

    let run = instance
        .get_typed_func::<(i32, i32), i32>(&mut *store, "run")
        .context("module does not export `run(i32, i32) -> i32`")?;
    let reply = run.call(&mut *store, (INPUT_BASE as i32, input.len() as i32))? as usize;

    let mut len = [0u8; 4];
    memory
        .read(&*store, reply, &mut len)
        .context("reply pointer out of bounds")?;
    let len = u32::from_le_bytes(len) as usize;

    let mut payload = vec![0u8; len];
    memory
        .read(&*store, reply + 4, &mut payload)
        .context("reply payload out of bounds")?;

    use std::io::Write;
    std::io::stdout()
        .write_all(&payload)
        .context("failed to write reply")?;
    Ok(())
}
