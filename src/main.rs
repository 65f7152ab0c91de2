//! Exoplanet Classifier - Main Entry Point
//!
//! Runs the REST server or one of the CLI commands.

use clap::{CommandFactory, Parser};
use exoplanet_classifier::cli::{cmd_info, cmd_predict, cmd_serve, cmd_status, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exoplanet_classifier=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port, model }) => {
            cmd_serve(host, port, model).await?;
        }
        Some(Commands::Train { data, force, config, model }) => {
            cmd_train(&data, force, config.as_deref(), model)?;
        }
        Some(Commands::Status { model }) => {
            cmd_status(model)?;
        }
        Some(Commands::Info { model }) => {
            cmd_info(model)?;
        }
        Some(Commands::Predict { input, model }) => {
            cmd_predict(&input, model)?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
