//! # CLI Module
//!
//! Command-line surface for the pipeline driver.
//!
//! ## Available Commands
//!
//! - `run` - Load a netlist, run a pass pipeline, write the result
//! - `check` - Parse and invariant-check a netlist
//! - `stats` - Print graph/operation/value counts

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use svir_core::IrError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// svir - SystemVerilog graph pipeline driver.
///
/// Loads a netlist image, runs rewrite passes over the graph IR, and emits
/// the transformed netlist.
#[derive(Parser, Debug)]
#[command(name = "svir")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose pass output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pass pipeline over a netlist
    Run {
        /// Input netlist (.json or .svir binary image)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path; the extension picks the format
        #[arg(short, long)]
        output: PathBuf,

        /// Comma-separated pass list
        #[arg(
            short,
            long,
            default_value = "memory-init-check,xmr-resolve,const-fold,redundant-elim,dead-code-elim"
        )]
        passes: String,

        /// JSON layout: compact, pretty-compact, pretty
        #[arg(short = 'm', long, default_value = "pretty-compact")]
        json_mode: String,

        /// Keep running later passes after a failing one
        #[arg(long)]
        keep_going: bool,
    },

    /// Parse a netlist and run the invariant check
    Check {
        /// Input netlist (.json or .svir binary image)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print graph, operation, and value counts
    Stats {
        /// Input netlist (.json or .svir binary image)
        #[arg(short, long)]
        input: PathBuf,

        /// Output in JSON format (for programmatic access)
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), IrError> {
    match cli.command {
        Commands::Run {
            input,
            output,
            passes,
            json_mode,
            keep_going,
        } => cmd_run(&input, &output, &passes, &json_mode, keep_going, cli.verbose),
        Commands::Check { input } => cmd_check(&input),
        Commands::Stats { input, json } => cmd_stats(&input, json),
    }
}
