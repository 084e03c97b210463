//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Bounded model checking and k-induction for multi-agent transition systems.\n\n\
    Typical path:\n  \
    1. kstep scenario maritime > maritime.json\n  \
    2. kstep bmc maritime.json --depth 30\n  \
    3. kstep prove maritime.json --k 2 --iterate\n\n\
    Exit status is 0 for SAFE or PROVED, 2 for UNSAFE and 3 for UNKNOWN.";

#[derive(Parser)]
#[command(name = "kstep")]
#[command(about = "Bounded model checking and k-induction for multi-agent transition systems")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Which scenario to analyze: a JSON file or a built-in one.
#[derive(Args, Debug)]
pub(crate) struct TargetArgs {
    /// Path to a scenario JSON file
    #[arg(required_unless_present = "canonical", conflicts_with = "canonical")]
    pub(crate) file: Option<PathBuf>,

    /// Built-in scenario: maritime | race | euclid
    #[arg(long)]
    pub(crate) canonical: Option<String>,

    /// Override the arbitration policy: symmetric | current-only | priority-first
    #[arg(long)]
    pub(crate) policy: Option<String>,
}

/// Options shared by every verification command.
#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Safety predicate: sufficient | strong | remainder-decreasing | no-overflow | bezout
    /// (defaults to the scenario's own predicate)
    #[arg(long)]
    pub(crate) safety: Option<String>,

    /// Solver backend: z3 | z3-process | cvc5
    #[arg(long, default_value = "z3")]
    pub(crate) solver: String,

    /// Overall timeout in seconds (0 disables)
    #[arg(long, default_value_t = 300)]
    pub(crate) timeout: u64,

    /// Output format: text | json
    #[arg(long, default_value = "text")]
    pub(crate) format: String,

    /// Dump the SMT-LIB query to file
    #[arg(long)]
    pub(crate) dump_smt: Option<PathBuf>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Search for the shortest violating run up to a depth bound
    Bmc {
        #[command(flatten)]
        target: TargetArgs,

        /// Maximum BMC depth
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        depth: i64,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Prove the safety predicate for every depth with k-induction
    Prove {
        #[command(flatten)]
        target: TargetArgs,

        /// Induction depth
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        k: i64,

        /// Try every induction depth from 0 up to --k
        #[arg(long)]
        iterate: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Print a built-in scenario as JSON
    Scenario {
        /// maritime | race | euclid
        name: String,
    },
}
