mod commands;
mod providers;

use anyhow::Result;
use clap::Parser;
use commands::{Cli, Commands};
use legalrag::RagConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RagConfig::load(cli.config.as_deref())?;
    let backend = cli.backend;

    match cli.command {
        Commands::BuildIndex { input, metric } => {
            commands::handle_build_index(config, backend, input, metric).await?;
        }
        Commands::Ask { question, top_k, no_rag, json } => {
            commands::handle_ask(config, backend, &question, top_k, !no_rag, json).await?;
        }
        Commands::ValidateData { input } => {
            commands::handle_validate_data(&config, input)?;
        }
        Commands::Evaluate { k, output } => {
            commands::handle_evaluate(config, backend, k, output).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so `ask --json` output stays machine-readable.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
