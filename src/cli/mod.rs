//! Command-line interface
//!
//! Argument definitions live here; each subcommand has its handler under
//! [`handlers`].

pub mod handlers;
mod output;

pub use output::OutputFormatter;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ITSM helpdesk backend
#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "HELPDESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the database URL from the configuration
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    #[cfg(feature = "api")]
    Serve {
        /// Interface to bind, overriding the configuration
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overriding the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database and apply schema migrations
    InitDb,

    /// Close answered tickets whose SLA window has lapsed
    AutoClose {
        /// Override the SLA window in days
        #[arg(long)]
        days: Option<i64>,
    },

    /// Export tickets
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export tickets in this status
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
    Csv,
}
