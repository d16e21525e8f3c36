//! helpdesk - ITSM helpdesk backend
//!
//! Entry point for the `helpdesk` binary. Parses arguments, loads the layered
//! configuration and dispatches to the command handlers.

use anyhow::Context;
use clap::Parser;
use helpdesk::cli::{Cli, Commands, OutputFormatter, handlers};
use helpdesk::config::Config;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let formatter = OutputFormatter::new(cli.json, cli.no_color);
    init_tracing(cli.verbose);

    if let Err(e) = run(cli, &formatter).await {
        formatter.error(&format!("{e:#}"));
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `debug` with `--verbose` and `warn` without
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    match cli.command {
        #[cfg(feature = "api")]
        Commands::Serve { host, port } => {
            handlers::handle_serve_command(&config, host, port, formatter).await?;
        },
        Commands::InitDb => handlers::handle_init_db_command(&config, formatter).await?,
        Commands::AutoClose { days } => {
            handlers::handle_auto_close_command(&config, days, formatter).await?;
        },
        Commands::Export {
            format,
            output,
            status,
        } => {
            handlers::handle_export_command(&config, format, output, status.as_deref(), formatter)
                .await?;
        },
    }
    Ok(())
}
