use std::path::{Path, PathBuf};
use std::time::Duration;

use dbsync_core::config::{SyncConfig, DEFAULT_INTERVAL};
use dbsync_core::{BuiltinPolicy, SyncManager, SyncOptions, SyncWatcher};
use tokio_util::sync::CancellationToken;

use crate::commands::common::parse_pair;
use crate::error::CliError;

pub struct WatchArgs {
    pub pairs: Vec<String>,
    pub interval: Option<f64>,
    pub policy: Option<BuiltinPolicy>,
}

/// Pairs from the command line, or the config file's pairs when none were given.
pub fn collect_pairs(
    args: &[String],
    config: &SyncConfig,
    root: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>, CliError> {
    let pairs = if args.is_empty() {
        config.resolved_pairs(root)
    } else {
        args.iter()
            .map(|pair| parse_pair(pair, root))
            .collect::<Result<Vec<_>, _>>()?
    };

    if pairs.is_empty() {
        return Err(CliError::NoPairs);
    }
    Ok(pairs)
}

pub fn resolve_interval(explicit: Option<f64>, config: &SyncConfig) -> Result<Duration, CliError> {
    match explicit {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                CliError::Config(format!("--interval must be a positive number, got {secs}"))
            }),
        None => Ok(config.interval().unwrap_or(DEFAULT_INTERVAL)),
    }
}

pub async fn run_watch(
    args: WatchArgs,
    config: &SyncConfig,
    root: &Path,
    analytics_db: &Path,
) -> Result<(), CliError> {
    let pairs = collect_pairs(&args.pairs, config, root)?;
    let interval = resolve_interval(args.interval, config)?;
    let policy = args.policy.or(config.policy).unwrap_or_default();

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping watchers");
                ctrl_c_token.cancel();
            }
            Err(error) => tracing::warn!("Cannot listen for Ctrl-C: {}", error),
        }
    });

    println!(
        "Watching {} pair(s) every {:?} with {policy}. Press Ctrl-C to stop.",
        pairs.len(),
        interval
    );
    SyncWatcher::new(SyncManager::new(analytics_db))
        .watch_pairs(pairs, interval, token, SyncOptions::builtin(policy))
        .await;
    Ok(())
}
