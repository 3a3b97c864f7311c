//! CLI command definitions for the `flowrun` binary.

pub mod printer;
pub mod run;
pub mod runs;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Execute visual-editor flow graphs.
#[derive(Parser)]
#[command(name = "flowrun", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a flow graph from a JSON file.
    Run(run::RunArgs),

    /// Inspect recorded runs.
    Runs {
        #[command(subcommand)]
        action: runs::RunsCommand,
    },

    /// Start the HTTP and WebSocket server.
    Serve {
        /// Port to listen on (defaults to `server.port` from config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` from config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Tracing filter for the given verbosity flags.
pub fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,flowrun_core=debug,flowrun_infra=debug,flowrun=debug",
        _ => "trace",
    }
}
