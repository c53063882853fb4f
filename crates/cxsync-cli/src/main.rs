use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cxsync_storage::MetricsStore;
use cxsync_sync::{run_sync_once_from_env, SyncConfig, SyncPipeline};

#[derive(Debug, Parser)]
#[command(name = "cxsync")]
#[command(about = "Intercom CX metrics sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one export-and-enrich pass over the lookback window.
    Sync {
        /// Days back from now the export window starts.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        days: Option<i64>,
        /// Skip the per-conversation enrichment pass.
        #[arg(long)]
        no_enrich: bool,
    },
    /// Create the metrics tables if they do not exist.
    Migrate,
    /// Run on the configured cron schedule until interrupted.
    Schedule,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync {
        days: None,
        no_enrich: false,
    }) {
        Commands::Sync { days, no_enrich } => {
            let enrich = if no_enrich { Some(false) } else { None };
            let summary = run_sync_once_from_env(days, enrich).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Migrate => {
            let database_url =
                std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
            let store = MetricsStore::connect(&database_url).await?;
            store.ensure_schema().await?;
            println!("schema ready");
        }
        Commands::Schedule => {
            let mut config = SyncConfig::from_env()?;
            config.scheduler_enabled = true;
            let pipeline = std::sync::Arc::new(SyncPipeline::from_config(config).await?);

            let Some(scheduler) = pipeline.maybe_build_scheduler().await? else {
                anyhow::bail!("scheduler could not be built");
            };
            scheduler.start().await.context("starting scheduler")?;
            info!("scheduler started, waiting for ctrl-c");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            info!("shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_days_must_be_positive() {
        assert!(Cli::try_parse_from(["cxsync", "sync", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["cxsync", "sync", "--days", "-3"]).is_err());

        let cli = Cli::try_parse_from(["cxsync", "sync", "--days", "3"]).unwrap();
        match cli.command {
            Some(Commands::Sync { days, .. }) => assert_eq!(days, Some(3)),
            other => panic!("parsed into {other:?}"),
        }
    }
}
