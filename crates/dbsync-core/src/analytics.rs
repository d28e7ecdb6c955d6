//! Audit log of synchronization passes
//!
//! Every pass appends one row to `synchronization_events` and, on success,
//! one row per resolved conflict to `synchronization_conflicts`. Rows are
//! never updated or deleted; the log grows without bound.

use std::path::{Path, PathBuf};

use crate::db::{run_analytics_migrations, ConnectionOptions, Database};
use crate::error::Result;
use crate::models::{ConflictEntry, ConflictRecord, EventRecord, EventStatus, SyncAction};
use crate::schema::table_exists;
use crate::util::unix_timestamp_now;

/// Writer for the analytics database.
///
/// Holds only the path; each write opens and closes its own connection.
#[derive(Debug, Clone)]
pub struct AnalyticsLog {
    path: PathBuf,
    options: ConnectionOptions,
}

impl AnalyticsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: ConnectionOptions::default(),
        }
    }

    #[must_use]
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Record a committed pass and the conflicts it resolved.
    pub async fn record_success(
        &self,
        source: &Path,
        target: &Path,
        conflicts: &[ConflictRecord],
    ) -> Result<()> {
        self.record(source, target, SyncAction::Sync, conflicts)
            .await
    }

    /// Record a rolled-back pass. Conflicts of a failed pass are not kept.
    pub async fn record_failure(&self, source: &Path, target: &Path) -> Result<()> {
        self.record(source, target, SyncAction::SyncFailed, &[])
            .await
    }

    async fn record(
        &self,
        source: &Path,
        target: &Path,
        action: SyncAction,
        conflicts: &[ConflictRecord],
    ) -> Result<()> {
        let db = Database::open(&self.path, &self.options).await?;
        let conn = db.connection();
        run_analytics_migrations(conn).await?;

        let source = source.display().to_string();
        let target = target.display().to_string();

        db.begin().await?;
        let written = async {
            conn.execute(
                "INSERT INTO synchronization_events (source_db, target_db, action, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                libsql::params![
                    source.as_str(),
                    target.as_str(),
                    action.as_str(),
                    unix_timestamp_now()
                ],
            )
            .await?;

            for conflict in conflicts {
                conn.execute(
                    "INSERT INTO synchronization_conflicts
                     (source_db, target_db, table_name, row_id, decision, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    libsql::params![
                        source.as_str(),
                        target.as_str(),
                        conflict.table_name.as_str(),
                        conflict.row_id.as_str(),
                        conflict.decision.as_str(),
                        conflict.timestamp
                    ],
                )
                .await?;
            }
            Ok::<_, crate::Error>(())
        }
        .await;

        match written {
            Ok(()) => db.commit().await,
            Err(error) => {
                if let Err(rollback_error) = db.rollback().await {
                    tracing::warn!(
                        "Rollback of analytics write to {} failed: {}",
                        self.path.display(),
                        rollback_error
                    );
                }
                Err(error)
            }
        }
    }
}

/// Open an analytics database for reading, or `None` if the file or the
/// requested table does not exist yet.
async fn open_for_read(path: &Path, table: &str) -> Result<Option<Database>> {
    if !path.is_file() {
        return Ok(None);
    }
    let db = Database::open_existing(path, &ConnectionOptions::default().without_wal()).await?;
    if table_exists(db.connection(), table).await? {
        Ok(Some(db))
    } else {
        Ok(None)
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Most recent sync events, newest first.
///
/// Read-only; returns an empty list when the database or table is missing.
pub async fn list_events(analytics_db: impl AsRef<Path>, limit: usize) -> Result<Vec<EventRecord>> {
    let Some(db) = open_for_read(analytics_db.as_ref(), "synchronization_events").await? else {
        return Ok(Vec::new());
    };

    let mut rows = db
        .connection()
        .query(
            "SELECT id, source_db, target_db, action, timestamp
             FROM synchronization_events
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
            libsql::params![sql_limit(limit)],
        )
        .await?;

    let mut events = Vec::new();
    while let Some(row) = rows.next().await? {
        let action: String = row.get(3)?;
        events.push(EventRecord {
            id: row.get(0)?,
            source_db: row.get(1)?,
            target_db: row.get(2)?,
            status: EventStatus::from_action(&action),
            action,
            timestamp: row.get(4)?,
        });
    }
    Ok(events)
}

/// Most recent conflict records, newest first.
///
/// Read-only; returns an empty list when the database or table is missing.
pub async fn list_conflicts(
    analytics_db: impl AsRef<Path>,
    limit: usize,
) -> Result<Vec<ConflictEntry>> {
    let Some(db) = open_for_read(analytics_db.as_ref(), "synchronization_conflicts").await? else {
        return Ok(Vec::new());
    };

    let mut rows = db
        .connection()
        .query(
            "SELECT id, source_db, target_db, table_name, row_id, decision, timestamp
             FROM synchronization_conflicts
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
            libsql::params![sql_limit(limit)],
        )
        .await?;

    let mut conflicts = Vec::new();
    while let Some(row) = rows.next().await? {
        conflicts.push(ConflictEntry {
            id: row.get(0)?,
            source_db: row.get(1)?,
            target_db: row.get(2)?,
            table_name: row.get(3)?,
            row_id: row.get(4)?,
            decision: row.get(5)?,
            timestamp: row.get(6)?,
        });
    }
    Ok(conflicts)
}
