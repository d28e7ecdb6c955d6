//! dbsync - keep pairs of SQLite databases in sync from the command line

mod cli;
mod commands;
mod error;


use clap::Parser;
use dbsync_core::config::resolve_analytics_path;
use dbsync_core::util::{resolve_path, workspace_root};

use crate::cli::{Cli, Commands};
use crate::commands::common::load_config;
use crate::commands::events::{run_conflicts, run_events};
use crate::commands::sync::run_sync;
use crate::commands::watch::{run_watch, WatchArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dbsync=info")),
        )
        .init();

    let cli = Cli::parse();
    let root = workspace_root();
    let config = load_config(cli.config.as_deref())?;
    let analytics_db = resolve_analytics_path(cli.analytics_db.as_deref(), &config, &root);

    match cli.command {
        Commands::Sync {
            db_a,
            db_b,
            policy,
            json,
        } => {
            let db_a = resolve_path(&root, &db_a);
            let db_b = resolve_path(&root, &db_b);
            let policy = policy.map(Into::into).or(config.policy);
            run_sync(&db_a, &db_b, policy, json, &analytics_db).await?;
        }
        Commands::Watch {
            pairs,
            interval,
            policy,
        } => {
            let args = WatchArgs {
                pairs,
                interval,
                policy: policy.map(Into::into),
            };
            run_watch(args, &config, &root, &analytics_db).await?;
        }
        Commands::Events { limit, json } => run_events(limit, json, &analytics_db).await?,
        Commands::Conflicts { limit, json } => {
            run_conflicts(limit, json, &analytics_db).await?;
        }
    }

    Ok(())
}
