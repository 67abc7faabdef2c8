//! Gibberish Compiler
//!
//! Compiles Gibberish source to MIPS assembly. The pipeline is lexing,
//! parsing, name analysis, type checking, and code generation; the two
//! analysis passes always both run so one invocation surfaces as many
//! diagnostics as possible, and no assembly is written when any
//! diagnostic exists.

mod backend;
mod frontend;
mod sema;
mod types;
mod utils;

use backend::CodeGenerator;
use clap::Parser;
use frontend::lexer::Lexer;
use log::debug;
use sema::{NameAnalyzer, TypeChecker};
use std::path::PathBuf;
use std::process;
use utils::{Error, Result};

/// Gibberish Compiler
#[derive(Parser, Debug)]
#[command(name = "gibc")]
#[command(version = "0.1.0")]
#[command(about = "Gibberish compiler - produces MIPS assembly")]
struct Cli {
    /// Input source file (.gib)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output assembly file (default: input with a .s extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Run name analysis and type checking only
    #[arg(long)]
    stop_after_analysis: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) if e.is_internal() => {
            eprintln!("gibc: internal compiler error: {}", e);
            process::exit(2);
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let source = std::fs::read_to_string(&cli.input).map_err(|e| Error::Io {
        path: cli.input.display().to_string(),
        source: e,
    })?;

    let lexer = Lexer::new(&source);
    let mut parser = frontend::parser::Parser::new(lexer);
    let mut program = parser.parse_program()?;
    debug!("parsed {} top-level declarations", program.decls.len());

    let mut analyzer = NameAnalyzer::new();
    analyzer.analyze(&mut program)?;
    let (symbols, mut diags) = analyzer.finish();
    debug!("name analysis allocated {} symbols", symbols.len());

    // type checking runs even when name analysis found problems, so a
    // single invocation reports as much as it can
    TypeChecker::new(&symbols, &mut diags).check(&mut program);

    if diags.has_errors() {
        for diag in diags.iter() {
            eprintln!("{}", diag);
        }
        return Ok(1);
    }

    if cli.stop_after_analysis {
        return Ok(0);
    }

    let asm = CodeGenerator::new(&symbols).generate(&program)?;
    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("s"));
    std::fs::write(&out_path, asm).map_err(|e| Error::Io {
        path: out_path.display().to_string(),
        source: e,
    })?;
    debug!("wrote {}", out_path.display());
    Ok(0)
}
