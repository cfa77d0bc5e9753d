//! Tarn compiler CLI.

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tarn_core::{CompileError, Compiler};

#[derive(Parser)]
#[command(name = "tarnc")]
#[command(version, about = "Tarn compiler", long_about = None)]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Output path for the compiled module.
    #[arg(default_value = "out.wasm")]
    output: PathBuf,

    /// Print the parsed AST as JSON and emit nothing.
    #[arg(long)]
    dump_ast: bool,
}

enum RunError {
    Compile(CompileError),
    Other(anyhow::Error),
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        RunError::Other(e)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Compile(e)) => {
            // The stable error channel is the kind name; details go to
            // the log.
            tracing::debug!(error = %e, "compilation failed");
            eprintln!("{}", e.kind_name());
            ExitCode::FAILURE
        }
        Err(RunError::Other(e)) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let compiler = Compiler::new();

    if cli.dump_ast {
        let ast = compiler.parse(&source).map_err(RunError::Compile)?;
        let json = serde_json::to_string_pretty(&ast)
            .context("failed to serialize AST")?;
        println!("{json}");
        return Ok(());
    }

    let module = compiler.compile(&source).map_err(RunError::Compile)?;
    fs::write(&cli.output, &module)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    Ok(())
}
