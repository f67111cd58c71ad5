//! CLI command definitions for the `pillars` binary.
//!
//! Uses clap derive macros for argument parsing. Draft maintenance lives
//! under `pillars draft`; `pillars fill` runs the interactive form session.

pub mod draft;
pub mod fill;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Keep self-assessment answers safe while they are being filled in.
#[derive(Parser)]
#[command(name = "pillars", version, about, long_about = None)]
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

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Owner of the drafts being worked on.
    #[arg(long, global = true, env = "PILLARS_OWNER", default_value = "local")]
    pub owner: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and manage assessment drafts.
    Draft {
        #[command(subcommand)]
        action: draft::DraftCommand,
    },

    /// Fill in an assessment interactively, with auto-save.
    Fill {
        /// Assessment key (one draft per owner and key).
        key: String,

        /// Assessment type recorded on the draft (defaults to the key).
        #[arg(long = "type")]
        assessment_type: Option<String>,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "7300")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
