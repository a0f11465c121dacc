use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use epg_sync::config::Config;
use epg_sync::feed::USER_AGENT;
use epg_sync::pipeline::{self, Outcome};

#[derive(Parser, Debug)]
#[command(name = "epg-sync", about = "Fetch, repair, and publish EPG guide data")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "epg-sync.toml")]
    config: PathBuf,

    /// Override the artifact output directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Skip the version-control publication handoff
    #[arg(long)]
    no_push: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if args.no_push {
        config.git.enabled = false;
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let started = Instant::now();
    tracing::info!("EPG sync starting");

    match pipeline::run(&config, &client).await {
        Ok(Outcome::Unchanged) => {
            tracing::info!(elapsed = ?started.elapsed(), "No update needed");
        }
        Ok(Outcome::Published) => {
            tracing::info!(elapsed = ?started.elapsed(), "Sync complete");
        }
        Err(e) => {
            tracing::error!(error = %e, elapsed = ?started.elapsed(), "Sync failed");
            return Err(e.into());
        }
    }

    Ok(())
}
