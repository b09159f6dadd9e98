//! Armada CLI - run and inspect bot contest games.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

/// Armada - a deterministic turn-based contest engine
#[derive(Parser, Debug)]
#[command(name = "armada")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single game between bots
    Run {
        /// Map file
        #[arg(short, long)]
        map: std::path::PathBuf,

        /// Bot launch commands (exactly 2)
        #[arg(required = true, num_args = 2..=2)]
        bots: Vec<String>,

        /// Maximum turns (map value used when omitted)
        #[arg(short, long)]
        turns: Option<u32>,

        /// Per-turn time budget in milliseconds
        #[arg(long, default_value = "100")]
        turn_time: u64,

        /// Setup-turn time budget in milliseconds
        #[arg(long, default_value = "5000")]
        load_time: u64,

        /// Seed disclosed to bots (default: random)
        #[arg(short, long)]
        seed: Option<i64>,

        /// Eliminate players on invalid orders
        #[arg(long)]
        strict: bool,

        /// Poll one bot at a time instead of all at once
        #[arg(long)]
        serial: bool,

        /// Save the result record to a JSON file
        #[arg(long)]
        replay: Option<std::path::PathBuf>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Validate a map file
    Validate {
        /// Map file to validate
        #[arg(required = true)]
        map: std::path::PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            map,
            bots,
            turns,
            turn_time,
            load_time,
            seed,
            strict,
            serial,
            replay,
            format,
        } => cli::run::execute(
            map, bots, turns, turn_time, load_time, seed, strict, serial, replay, format,
        ),

        Commands::Validate { map } => cli::validate::execute(map),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
