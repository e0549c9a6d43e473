//! Oberon-07 compiler front end
//!
//! Usage: oberonc [OPTIONS] <inputs>...

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use oberon_compiler::common::{CompileError, DiagnosticReporter};
use oberon_compiler::driver::{Pipeline, Report};
use oberon_compiler::frontend::{dump_tokens, CompilerConfig};
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ClapParser, Debug)]
#[command(name = "oberonc")]
#[command(author = "Oberon Toolchain Team")]
#[command(version)]
#[command(about = "Semantic front end for Oberon-07 modules", long_about = None)]
struct Args {
    /// Module source files, compiled in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directories searched for imported modules
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Dump tokens (for debugging)
    #[arg(long)]
    dump_tokens: bool,

    /// Dump the resolved tree (for debugging)
    #[arg(long)]
    dump_ast: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Treat warnings as errors
    #[arg(long = "Werror")]
    warnings_as_errors: bool,

    /// Allow variadic formal parameters
    #[arg(long)]
    enable_varargs: bool,

    /// Allow external procedure declarations
    #[arg(long)]
    enable_extern: bool,

    /// Keep nested procedures in place
    #[arg(long)]
    no_lift: bool,
}

impl Args {
    fn config(&self) -> CompilerConfig {
        CompilerConfig {
            dump_tokens: self.dump_tokens,
            dump_ast: self.dump_ast,
            verbose: self.verbose,
            enable_varargs: self.enable_varargs,
            enable_extern: self.enable_extern,
            warnings_as_errors: self.warnings_as_errors,
            lift: !self.no_lift,
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.verbose) {
        eprintln!("warning: {:#}", e);
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Install a subscriber filtered by `RUST_LOG`, or by `--verbose`.
fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

/// Compile every input. Returns false if any module failed.
fn run(args: &Args) -> Result<bool> {
    let mut pipeline = Pipeline::new(args.config()).with_include_dirs(args.include.iter().cloned());
    let mut success = true;

    for input in &args.inputs {
        let source = fs::read_to_string(input).with_context(|| format!("cannot read {}", input.display()))?;
        let filename = input.display().to_string();

        if args.dump_tokens {
            match dump_tokens(&source) {
                Ok(tokens) => {
                    eprintln!("=== Tokens: {} ===", filename);
                    eprint!("{}", tokens);
                    eprintln!("=== End Tokens ===\n");
                }
                Err(error) => {
                    let mut reporter = DiagnosticReporter::new();
                    let file_id = reporter.add_file(filename.as_str(), source.as_str());
                    reporter.report_error(file_id, &error);
                }
            }
        }

        let result = pipeline.compile_source(&filename, &source);
        render(&pipeline.take_reports());
        match result {
            Ok(compiled) => {
                if args.dump_ast {
                    eprintln!("=== AST: {} ===", compiled.module.name);
                    eprintln!("{:#?}", compiled.module);
                    eprintln!("=== End AST ===\n");
                }
                if args.verbose {
                    eprintln!(
                        "Compiled module {} ({} exported declarations)",
                        compiled.module.name,
                        compiled.interface.decls.len()
                    );
                }
            }
            Err(error @ CompileError::Analysis { .. }) => {
                eprintln!("error: {}", error);
                success = false;
            }
            Err(error) => return Err(error).with_context(|| format!("cannot compile {}", filename)),
        }
    }
    Ok(success)
}

fn render(reports: &[Report]) {
    let mut reporter = DiagnosticReporter::new();
    for report in reports {
        let file_id = reporter.add_file(report.file.as_str(), report.source.as_str());
        reporter.report_all(file_id, &report.diagnostics);
    }
}
