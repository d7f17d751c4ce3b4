//! gigmatch CLI entry point.

use anyhow::Result;
use clap::Parser;
use gigmatch::cli::{commands, Cli, Commands};
use gigmatch::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("gigmatch={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    std::fs::create_dir_all(settings.data_dir())?;

    match cli.command {
        Commands::Load { recreate, domain } => {
            commands::run_load(recreate, domain, settings).await?;
        }

        Commands::Ask {
            query,
            stream,
            agent,
            model,
        } => {
            commands::run_ask(&query, stream, agent, model, settings).await?;
        }

        Commands::Search {
            domain,
            query,
            limit,
            min_score,
        } => {
            commands::run_search(domain, &query, limit, min_score, settings).await?;
        }

        Commands::Chat { agent } => {
            commands::run_chat(agent, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, config_path, settings)?;
        }
    }

    Ok(())
}
