//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cohere")]
#[command(about = "Verification of concurrent programs under weak memory models")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check the program's assertion under a memory model
    Verify {
        /// Program file (JSON)
        file: PathBuf,

        /// Memory model: sc | tso | arm8 | rc11
        #[arg(long, short, default_value = "sc")]
        model: String,

        /// Maximal number of nested coherence guesses
        #[arg(long, default_value_t = 2)]
        k: usize,

        /// Wall-clock timeout in seconds (0 = none)
        #[arg(long, default_value_t = 0)]
        timeout: u64,

        /// Solver calls before giving up (0 = no limit)
        #[arg(long, default_value_t = 0)]
        max_iterations: usize,

        /// Initial approximation handed to the solver: empty | po-loc-rf
        #[arg(long, default_value = "empty")]
        approx: String,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,

        /// Print every blocking clause (text format)
        #[arg(long, default_value_t = false)]
        print_clauses: bool,

        /// Print the refinement statistics (text format)
        #[arg(long, default_value_t = false)]
        stats: bool,

        /// Write the initial SMT-LIB query to this path
        #[arg(long)]
        dump_smt: Option<PathBuf>,
    },

    /// Print the events a program compiles to
    Events {
        /// Program file (JSON)
        file: PathBuf,
    },

    /// List the built-in memory models
    Models {
        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
