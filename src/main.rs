//! Recast CLI entry point.

use anyhow::Result;
use clap::Parser;
use recast::cli::{commands, Cli, Commands};
use recast::config::Settings;
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
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("recast={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Generate {
            source,
            name,
            asr_engine,
            render_engine,
        } => {
            commands::run_generate(source, name.clone(), *asr_engine, *render_engine, settings)
                .await?;
        }

        Commands::Resume { id } => {
            commands::run_resume(*id, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Show { id } => {
            commands::run_show(*id, settings).await?;
        }

        Commands::Delete { id } => {
            commands::run_delete(*id, settings).await?;
        }

        Commands::Rerender { id, engine } => {
            commands::run_rerender(*id, *engine, settings).await?;
        }

        Commands::CloneVoice { sample, voice_id } => {
            commands::run_clone_voice(sample, voice_id, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
