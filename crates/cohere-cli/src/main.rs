#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Verify {
            file,
            model,
            k,
            timeout,
            max_iterations,
            approx,
            format,
            print_clauses,
            stats,
            dump_smt,
        } => commands::verify::run(commands::verify::VerifyArgs {
            file,
            model,
            k,
            timeout,
            max_iterations,
            approx,
            format,
            print_clauses,
            stats,
            dump_smt,
        }),
        Commands::Events { file } => commands::events::run(&file),
        Commands::Models { format } => commands::models::run(&format),
    }
}
