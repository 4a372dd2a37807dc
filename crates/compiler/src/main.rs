//! IFJ21 compiler CLI.
//!
//! Reads IFJ21 source from standard input (or a file), writes IFJcode21 to
//! standard output (or a file), and exits with the status matching the
//! first error detected. The human-readable diagnostic goes to stderr.

use clap::Parser as ClapParser;
use ifjc::{CompileError, CompilerConfig};
use std::io::Read as _;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "ifjc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "IFJ21 compiler - translate IFJ21 source to IFJcode21", long_about = None)]
struct Cli {
    /// Input source file (standard input when omitted)
    input: Option<PathBuf>,

    /// Output file for the generated IR (standard output when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to a TOML compiler configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<(), CompileError> {
    let config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };

    let source = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| CompileError::Internal(format!("cannot read {}: {e}", path.display())))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| CompileError::Internal(format!("cannot read stdin: {e}")))?;
            text
        }
    };

    let ir = ifjc::compile(&source, &config)?;

    match &cli.output {
        Some(path) => std::fs::write(path, ir)
            .map_err(|e| CompileError::Internal(format!("cannot write {}: {e}", path.display())))?,
        None => print!("{ir}"),
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("ERROR: {err}");
        process::exit(err.exit_code());
    }
}
