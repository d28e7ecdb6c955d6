//! Change-driven polling of database pairs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::manager::SyncManager;
use super::types::SyncOptions;

/// What the watcher compares between polls: modification time and length of
/// a database file and of its `-wal` sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    main: Option<(SystemTime, u64)>,
    wal: Option<(SystemTime, u64)>,
}

impl FileFingerprint {
    /// Fingerprint `path`. Missing files fingerprint as absent rather than
    /// failing, so a pair whose file appears later is picked up.
    pub fn of(path: &Path) -> Self {
        let mut wal_path = path.as_os_str().to_owned();
        wal_path.push("-wal");
        Self {
            main: stat(path),
            wal: stat(Path::new(&wal_path)),
        }
    }
}

fn stat(path: &Path) -> Option<(SystemTime, u64)> {
    let metadata = std::fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

impl SyncManager {
    /// Poll `db_a` and `db_b` every `interval` and run a pass whenever
    /// either file changed since the last successful pass.
    ///
    /// There is no baseline before the first pass, so a pass runs as soon
    /// as the loop starts and catches up on changes made while nothing was
    /// watching.
    ///
    /// Failures are logged and retried on the next poll. Returns once
    /// `token` is cancelled; cancellation is only observed between passes.
    pub async fn watch(
        &self,
        db_a: impl AsRef<Path>,
        db_b: impl AsRef<Path>,
        interval: Duration,
        token: &CancellationToken,
        options: &SyncOptions,
    ) {
        let db_a = db_a.as_ref();
        let db_b = db_b.as_ref();
        let mut last_seen: Option<(FileFingerprint, FileFingerprint)> = None;

        tracing::info!(
            "Watching {} <-> {} every {:?}",
            db_a.display(),
            db_b.display(),
            interval
        );

        while !token.is_cancelled() {
            let current = (FileFingerprint::of(db_a), FileFingerprint::of(db_b));
            if last_seen != Some(current) {
                match self.sync(db_a, db_b, options).await {
                    // Our own writes show up as one more change; that pass is a no-op.
                    Ok(_) => last_seen = Some(current),
                    Err(error) => tracing::warn!(
                        "Sync of {} <-> {} failed: {}",
                        db_a.display(),
                        db_b.display(),
                        error
                    ),
                }
            }

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Stopped watching {} <-> {}", db_a.display(), db_b.display());
    }
}

/// Free-function form of [`SyncManager::watch`]
pub async fn watch_and_sync(
    manager: &SyncManager,
    db_a: impl AsRef<Path>,
    db_b: impl AsRef<Path>,
    interval: Duration,
    token: &CancellationToken,
    options: &SyncOptions,
) {
    manager.watch(db_a, db_b, interval, token, options).await;
}

/// Watches many pairs at once, one task per pair, under one shared token.
#[derive(Debug, Clone)]
pub struct SyncWatcher {
    manager: Arc<SyncManager>,
}

impl SyncWatcher {
    pub fn new(manager: SyncManager) -> Self {
        Self::from_arc(Arc::new(manager))
    }

    pub const fn from_arc(manager: Arc<SyncManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &SyncManager {
        &self.manager
    }

    /// Watch every pair until `token` is cancelled, then wait for each
    /// pair's loop to finish its current pass.
    ///
    /// A pair that keeps failing never stops the others.
    pub async fn watch_pairs(
        &self,
        pairs: Vec<(PathBuf, PathBuf)>,
        interval: Duration,
        token: CancellationToken,
        options: SyncOptions,
    ) {
        let mut tasks = JoinSet::new();
        for (db_a, db_b) in pairs {
            let manager = Arc::clone(&self.manager);
            let token = token.clone();
            let options = options.clone();
            tasks.spawn(async move {
                manager.watch(&db_a, &db_b, interval, &token, &options).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                tracing::warn!("Watch task ended abnormally: {}", error);
            }
        }
    }
}
