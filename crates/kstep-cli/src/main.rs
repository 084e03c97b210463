#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Bmc { target, depth, run } => commands::bmc::run_bmc_command(target, depth, run)?,
        Commands::Prove {
            target,
            k,
            iterate,
            run,
        } => commands::prove::run_prove_command(target, k, iterate, run)?,
        Commands::Scenario { name } => {
            commands::scenario::run_scenario_command(&name)?;
            0
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
