//! One bidirectional synchronization pass between two database files

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use libsql::Connection;

use crate::analytics::AnalyticsLog;
use crate::db::{ConnectionOptions, Database};
use crate::error::{Error, Result};
use crate::models::{ConflictRecord, Row, RowKey, SqlValue};
use crate::policy::{classify, ConflictPolicy};
use crate::schema::{list_tables, primary_key_column, SchemaMapper};
use crate::util::{quote_identifier, sanitize_table_name, unix_timestamp_now};

use super::types::{SyncOptions, SyncReport};

/// Synchronizes pairs of database files and records each outcome.
///
/// A pass either commits on both sides and logs a `sync` event with its
/// conflicts, or rolls back both sides, logs `sync_failed` and returns the
/// original error.
#[derive(Debug, Clone)]
pub struct SyncManager {
    mapper: SchemaMapper,
    analytics: AnalyticsLog,
    connection: ConnectionOptions,
}

impl SyncManager {
    /// Create a manager that logs to the analytics database at `analytics_db`
    pub fn new(analytics_db: impl Into<PathBuf>) -> Self {
        Self {
            mapper: SchemaMapper::new(),
            analytics: AnalyticsLog::new(analytics_db),
            connection: ConnectionOptions::default(),
        }
    }

    /// Pragmas for the synchronized files and the analytics database
    #[must_use]
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.analytics = self.analytics.with_connection_options(options.clone());
        self.connection = options;
        self
    }

    pub const fn analytics(&self) -> &AnalyticsLog {
        &self.analytics
    }

    /// Bidirectionally synchronize `db_a` and `db_b`.
    pub async fn sync(
        &self,
        db_a: impl AsRef<Path>,
        db_b: impl AsRef<Path>,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let db_a = db_a.as_ref();
        let db_b = db_b.as_ref();

        match self.run_pass(db_a, db_b, options).await {
            Ok(report) => {
                self.analytics
                    .record_success(db_a, db_b, &report.conflicts)
                    .await?;
                tracing::info!(
                    "Synced {} <-> {}: {} table(s), {} row(s) to A, {} row(s) to B, {} conflict(s)",
                    db_a.display(),
                    db_b.display(),
                    report.tables_synced.len(),
                    report.rows_to_a,
                    report.rows_to_b,
                    report.conflicts.len()
                );
                Ok(report)
            }
            Err(error) => {
                if let Err(log_error) = self.analytics.record_failure(db_a, db_b).await {
                    tracing::warn!(
                        "Failed to record sync failure for {} <-> {}: {}",
                        db_a.display(),
                        db_b.display(),
                        log_error
                    );
                }
                Err(error)
            }
        }
    }

    async fn run_pass(&self, path_a: &Path, path_b: &Path, options: &SyncOptions) -> Result<SyncReport> {
        let db_a = Database::open_existing(path_a, &self.connection).await?;
        let db_b = Database::open_existing(path_b, &self.connection).await?;
        if std::fs::canonicalize(path_a)? == std::fs::canonicalize(path_b)? {
            return Err(Error::InvalidInput(format!(
                "cannot synchronize {} with itself",
                path_a.display()
            )));
        }

        db_a.begin().await?;
        if let Err(error) = db_b.begin().await {
            rollback_quietly(&db_a).await;
            return Err(error);
        }

        let report = match self.reconcile(&db_a, &db_b, options).await {
            Ok(report) => report,
            Err(error) => {
                rollback_quietly(&db_a).await;
                rollback_quietly(&db_b).await;
                return Err(error);
            }
        };

        if let Err(error) = db_a.commit().await {
            rollback_quietly(&db_a).await;
            rollback_quietly(&db_b).await;
            return Err(error);
        }
        if let Err(error) = db_b.commit().await {
            tracing::warn!(
                "{} committed but {} failed to commit; the pair will be retried",
                path_a.display(),
                path_b.display()
            );
            rollback_quietly(&db_b).await;
            return Err(error);
        }

        Ok(report)
    }

    async fn reconcile(
        &self,
        db_a: &Database,
        db_b: &Database,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let conn_a = db_a.connection();
        let conn_b = db_b.connection();

        // Every name is checked before any statement can reference one.
        let tables_a = list_tables(conn_a).await?;
        let tables_b = list_tables(conn_b).await?;
        for table in tables_a.iter().chain(&tables_b) {
            sanitize_table_name(&table.name)?;
        }

        let mut report = SyncReport::default();
        report
            .tables_created
            .extend(self.mapper.map(conn_a, conn_b).await?);
        report
            .tables_created
            .extend(self.mapper.map(conn_b, conn_a).await?);

        let tables = tables_a
            .into_iter()
            .chain(tables_b)
            .map(|table| table.name)
            .collect::<BTreeSet<_>>();

        for table in tables {
            let Some(key_column) = primary_key_column(conn_a, &table).await? else {
                tracing::debug!("Skipping rows of {table}: no usable primary key");
                report.tables_skipped.push(table);
                continue;
            };

            sync_table(
                conn_a,
                conn_b,
                &table,
                &key_column,
                options.policy_for(&table),
                &mut report,
            )
            .await?;
            report.tables_synced.push(table);
        }

        Ok(report)
    }
}

async fn rollback_quietly(db: &Database) {
    if let Err(error) = db.rollback().await {
        tracing::warn!("Rollback of {} failed: {}", db.path().display(), error);
    }
}

async fn sync_table(
    conn_a: &Connection,
    conn_b: &Connection,
    table: &str,
    key_column: &str,
    policy: &dyn ConflictPolicy,
    report: &mut SyncReport,
) -> Result<()> {
    let rows_a = load_rows(conn_a, table, key_column).await?;
    let rows_b = load_rows(conn_b, table, key_column).await?;
    let keys = rows_a
        .keys()
        .chain(rows_b.keys())
        .collect::<BTreeSet<&RowKey>>();

    for key in keys {
        match (rows_a.get(key), rows_b.get(key)) {
            (Some(row), None) => {
                upsert(conn_b, table, row).await?;
                report.rows_to_b += 1;
            }
            (None, Some(row)) => {
                upsert(conn_a, table, row).await?;
                report.rows_to_a += 1;
            }
            (Some(row_a), Some(row_b)) if row_a != row_b => {
                let resolved = policy.resolve(table, row_a, row_b)?;
                let decision = classify(&resolved, row_a, row_b);
                upsert(conn_a, table, &resolved).await?;
                upsert(conn_b, table, &resolved).await?;
                tracing::debug!(
                    "Resolved conflict in {table} for {key_column}={key} with {}: {decision}",
                    policy.name()
                );
                report.conflicts.push(ConflictRecord {
                    table_name: table.to_string(),
                    row_id: key.to_string(),
                    decision,
                    timestamp: unix_timestamp_now(),
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// Load every row of `table`, indexed by its key column.
pub(crate) async fn load_rows(
    conn: &Connection,
    table: &str,
    key_column: &str,
) -> Result<BTreeMap<RowKey, Row>> {
    let table = sanitize_table_name(table)?;
    let mut rows = conn
        .query(&format!("SELECT * FROM {}", quote_identifier(table)), ())
        .await?;

    let column_count = rows.column_count();
    let columns = (0..column_count)
        .map(|idx| rows.column_name(idx).unwrap_or_default().to_string())
        .collect::<Vec<_>>();

    let mut indexed = BTreeMap::new();
    while let Some(row) = rows.next().await? {
        let mut record = Row::new();
        for (idx, column) in (0..column_count).zip(&columns) {
            record.set(column.as_str(), SqlValue::from(row.get_value(idx)?));
        }
        let key = record.get(key_column).map(RowKey::from).ok_or_else(|| {
            Error::Database(format!("column {key_column} missing from table {table}"))
        })?;
        indexed.insert(key, record);
    }
    Ok(indexed)
}

/// Insert or replace `row` by primary key: a whole-row overwrite.
async fn upsert(conn: &Connection, table: &str, row: &Row) -> Result<()> {
    let table = sanitize_table_name(table)?;
    let (columns, values) = row.clone().into_parts();
    let column_list = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute(
        &format!(
            "REPLACE INTO {} ({column_list}) VALUES ({placeholders})",
            quote_identifier(table)
        ),
        libsql::params_from_iter(values.into_iter().map(libsql::Value::from)),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{list_conflicts, list_events};
    use crate::models::{ConflictDecision, EventStatus};
    use crate::policy::{ConcatMergePolicy, CustomPolicy, ResolverRegistry, TimestampPolicy};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _tmp: TempDir,
        a: PathBuf,
        b: PathBuf,
        analytics: PathBuf,
    }

    impl Fixture {
        fn manager(&self) -> SyncManager {
            SyncManager::new(&self.analytics)
        }
    }

    async fn exec(path: &Path, statements: &[&str]) {
        let db = Database::open(path, &ConnectionOptions::default())
            .await
            .unwrap();
        // Forces the file header to be written even with no statements.
        db.connection()
            .execute("PRAGMA user_version = 1", ())
            .await
            .unwrap();
        for statement in statements {
            db.connection().execute(statement, ()).await.unwrap();
        }
    }

    async fn fixture(a_statements: &[&str], b_statements: &[&str]) -> Fixture {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.db");
        let b = tmp.path().join("b.db");
        let analytics = tmp.path().join("databases").join("analytics.db");
        exec(&a, a_statements).await;
        exec(&b, b_statements).await;
        Fixture {
            _tmp: tmp,
            a,
            b,
            analytics,
        }
    }

    async fn items(path: &Path) -> Vec<(i64, String, i64)> {
        let db = Database::open_existing(path, &ConnectionOptions::default())
            .await
            .unwrap();
        let mut rows = db
            .connection()
            .query("SELECT id, name, updated_at FROM items ORDER BY id", ())
            .await
            .unwrap();
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            out.push((
                row.get(0).unwrap(),
                row.get(1).unwrap(),
                row.get(2).unwrap(),
            ));
        }
        out
    }

    async fn all_rows(path: &Path, table: &str) -> Vec<Row> {
        let db = Database::open_existing(path, &ConnectionOptions::default())
            .await
            .unwrap();
        load_rows(db.connection(), table, "id")
            .await
            .unwrap()
            .into_values()
            .collect()
    }

    const ITEMS_DDL: &str =
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL, updated_at INTEGER)";

    fn expected(rows: &[(i64, &str, i64)]) -> Vec<(i64, String, i64)> {
        rows.iter()
            .map(|(id, name, ts)| (*id, (*name).to_string(), *ts))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_to_end_last_write_wins() {
        let fx = fixture(
            &[
                ITEMS_DDL,
                "INSERT INTO items VALUES (1, 'a', 1)",
                "INSERT INTO items VALUES (2, 'from_a', 2)",
            ],
            &[
                ITEMS_DDL,
                "INSERT INTO items VALUES (1, 'b', 3)",
                "INSERT INTO items VALUES (3, 'from_b', 3)",
            ],
        )
        .await;

        let report = fx
            .manager()
            .sync(&fx.a, &fx.b, &SyncOptions::builtin(crate::BuiltinPolicy::LastWriteWins))
            .await
            .unwrap();

        let want = expected(&[(1, "b", 3), (2, "from_a", 2), (3, "from_b", 3)]);
        assert_eq!(items(&fx.a).await, want);
        assert_eq!(items(&fx.b).await, want);
        assert_eq!(report.rows_to_a, 1);
        assert_eq!(report.rows_to_b, 1);

        let events = list_events(&fx.analytics, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "sync");
        assert_eq!(events[0].status, EventStatus::Success);

        let conflicts = list_conflicts(&fx.analytics, 10).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].table_name, "items");
        assert_eq!(conflicts[0].row_id, "1");
        assert_eq!(conflicts[0].decision, ConflictDecision::Target.as_str());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_pass_is_idempotent() {
        let fx = fixture(
            &[ITEMS_DDL, "INSERT INTO items VALUES (1, 'a', 1)"],
            &[ITEMS_DDL, "INSERT INTO items VALUES (1, 'b', 2)"],
        )
        .await;
        let manager = fx.manager();
        let options = SyncOptions::default();

        manager.sync(&fx.a, &fx.b, &options).await.unwrap();
        let after_first = items(&fx.a).await;
        let second = manager.sync(&fx.a, &fx.b, &options).await.unwrap();

        assert!(second.is_noop());
        assert_eq!(items(&fx.a).await, after_first);
        assert_eq!(items(&fx.b).await, after_first);
        assert_eq!(list_conflicts(&fx.analytics, 10).await.unwrap().len(), 1);
        assert_eq!(list_events(&fx.analytics, 10).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn equal_timestamps_keep_first_database_row() {
        let fx = fixture(
            &[ITEMS_DDL, "INSERT INTO items VALUES (1, 'from_a', 5)"],
            &[ITEMS_DDL, "INSERT INTO items VALUES (1, 'from_b', 5)"],
        )
        .await;

        fx.manager()
            .sync(&fx.a, &fx.b, &SyncOptions::default())
            .await
            .unwrap();

        let want = expected(&[(1, "from_a", 5)]);
        assert_eq!(items(&fx.a).await, want);
        assert_eq!(items(&fx.b).await, want);
        let conflicts = list_conflicts(&fx.analytics, 10).await.unwrap();
        assert_eq!(conflicts[0].decision, "source");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_is_mapped_in_both_directions() {
        let fx = fixture(
            &[ITEMS_DDL, "INSERT INTO items VALUES (1, 'a', 1)"],
            &[
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)",
                "INSERT INTO notes VALUES (7, 'hello')",
            ],
        )
        .await;

        let report = fx
            .manager()
            .sync(&fx.a, &fx.b, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(
            report.tables_created,
            vec!["items".to_string(), "notes".to_string()]
        );
        assert_eq!(items(&fx.b).await, expected(&[(1, "a", 1)]));
        assert_eq!(
            all_rows(&fx.a, "notes").await,
            vec![Row::new().with("id", 7).with("body", "hello")]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tables_without_primary_key_are_mapped_but_not_synced() {
        let fx = fixture(
            &[
                "CREATE TABLE log_lines (line TEXT)",
                "INSERT INTO log_lines VALUES ('only in a')",
            ],
            &[],
        )
        .await;

        let report = fx
            .manager()
            .sync(&fx.a, &fx.b, &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.tables_created, vec!["log_lines".to_string()]);
        assert_eq!(report.tables_skipped, vec!["log_lines".to_string()]);

        let db = Database::open_existing(&fx.b, &ConnectionOptions::default())
            .await
            .unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM log_lines", ())
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }

    async fn count_rows(path: &Path, table: &str) -> i64 {
        let db = Database::open_existing(path, &ConnectionOptions::default())
            .await
            .unwrap();
        let mut rows = db
            .connection()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undeclared_id_column_is_not_used_as_key() {
        let ddl = "CREATE TABLE items (id INTEGER, name TEXT, updated_at INTEGER)";
        let fx = fixture(
            &[ddl, "INSERT INTO items VALUES (1, 'a', 1)"],
            &[
                ddl,
                "INSERT INTO items VALUES (1, 'b', 2)",
                "INSERT INTO items VALUES (2, 'only_b', 2)",
            ],
        )
        .await;
        let manager = fx.manager();

        for _ in 0..2 {
            let report = manager
                .sync(&fx.a, &fx.b, &SyncOptions::default())
                .await
                .unwrap();
            assert_eq!(report.tables_skipped, vec!["items".to_string()]);
            assert!(report.tables_synced.is_empty());
            assert!(report.is_noop());
        }

        assert_eq!(count_rows(&fx.a, "items").await, 1);
        assert_eq!(count_rows(&fx.b, "items").await, 2);
        assert!(list_conflicts(&fx.analytics, 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_resolver_rolls_back_both_sides() {
        let fx = fixture(
            &[
                ITEMS_DDL,
                "INSERT INTO items VALUES (1, 'only_a', 1)",
                "INSERT INTO items VALUES (2, 'a', 1)",
            ],
            &[ITEMS_DDL, "INSERT INTO items VALUES (2, 'b', 2)"],
        )
        .await;
        let before_a = items(&fx.a).await;
        let before_b = items(&fx.b).await;

        let failing = CustomPolicy::new(|table: &str, _: &Row, _: &Row| {
            Err(Error::resolver(table, "refusing to pick"))
        });
        let result = fx
            .manager()
            .sync(&fx.a, &fx.b, &SyncOptions::new(Arc::new(failing)))
            .await;

        assert!(matches!(result, Err(Error::Resolver { table, .. }) if table == "items"));
        assert_eq!(items(&fx.a).await, before_a);
        assert_eq!(items(&fx.b).await, before_b);

        let events = list_events(&fx.analytics, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "sync_failed");
        assert_eq!(events[0].status, EventStatus::Failure);
        assert!(list_conflicts(&fx.analytics, 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsafe_table_name_aborts_whole_pass() {
        let fx = fixture(
            &[
                ITEMS_DDL,
                "INSERT INTO items VALUES (1, 'a', 1)",
                "CREATE TABLE \"x\"\"; DROP TABLE items; --\" (id INTEGER PRIMARY KEY)",
            ],
            &[ITEMS_DDL, "INSERT INTO items VALUES (2, 'b', 1)"],
        )
        .await;

        let result = fx
            .manager()
            .sync(&fx.a, &fx.b, &SyncOptions::default())
            .await;

        assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
        assert_eq!(items(&fx.a).await, expected(&[(1, "a", 1)]));
        assert_eq!(items(&fx.b).await, expected(&[(2, "b", 1)]));

        let db = Database::open_existing(&fx.b, &ConnectionOptions::default())
            .await
            .unwrap();
        let tables = list_tables(db.connection()).await.unwrap();
        assert_eq!(tables.len(), 1);

        let events = list_events(&fx.analytics, 10).await.unwrap();
        assert_eq!(events[0].action, "sync_failed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registry_overrides_default_policy_per_table() {
        let notes_ddl = "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, updated_at INTEGER)";
        let fx = fixture(
            &[
                ITEMS_DDL,
                notes_ddl,
                "INSERT INTO items VALUES (1, 'old', 1)",
                "INSERT INTO notes VALUES (1, 'left', 1)",
            ],
            &[
                ITEMS_DDL,
                notes_ddl,
                "INSERT INTO items VALUES (1, 'new', 2)",
                "INSERT INTO notes VALUES (1, 'right', 2)",
            ],
        )
        .await;

        let registry = ResolverRegistry::new().with("notes", ConcatMergePolicy::new(" / "));
        let options = SyncOptions::new(Arc::new(TimestampPolicy)).with_registry(registry);
        fx.manager().sync(&fx.a, &fx.b, &options).await.unwrap();

        assert_eq!(items(&fx.a).await, expected(&[(1, "new", 2)]));
        let notes = all_rows(&fx.b, "notes").await;
        assert_eq!(
            notes,
            vec![Row::new()
                .with("id", 1)
                .with("body", "left / right")
                .with("updated_at", 2)]
        );
        assert_eq!(all_rows(&fx.a, "notes").await, notes);

        let mut decisions = list_conflicts(&fx.analytics, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|conflict| (conflict.table_name, conflict.decision))
            .collect::<Vec<_>>();
        decisions.sort();
        assert_eq!(
            decisions,
            vec![
                ("items".to_string(), "target".to_string()),
                ("notes".to_string(), "merged".to_string()),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn text_primary_keys_and_blobs_round_trip() {
        let ddl = "CREATE TABLE files (path TEXT PRIMARY KEY, data BLOB, size REAL)";
        let fx = fixture(
            &[ddl, "INSERT INTO files VALUES ('a.txt', x'0102', 2.5)"],
            &[ddl, "INSERT INTO files VALUES ('b.txt', NULL, 0.0)"],
        )
        .await;

        fx.manager()
            .sync(&fx.a, &fx.b, &SyncOptions::default())
            .await
            .unwrap();

        let db = Database::open_existing(&fx.b, &ConnectionOptions::default())
            .await
            .unwrap();
        let rows = load_rows(db.connection(), "files", "path").await.unwrap();
        assert_eq!(
            rows.get(&RowKey::Text("a.txt".to_string())),
            Some(
                &Row::new()
                    .with("path", "a.txt")
                    .with("data", vec![1_u8, 2])
                    .with("size", 2.5)
            )
        );
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_database_fails_and_is_logged() {
        let fx = fixture(&[ITEMS_DDL], &[ITEMS_DDL]).await;
        let missing = fx.a.with_file_name("missing.db");

        let result = fx
            .manager()
            .sync(&missing, &fx.b, &SyncOptions::default())
            .await;

        assert!(matches!(result, Err(Error::NotFound(path)) if path == missing));
        assert!(!missing.exists());
        let events = list_events(&fx.analytics, 10).await.unwrap();
        assert_eq!(events[0].status, EventStatus::Failure);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn syncing_a_file_with_itself_is_rejected() {
        let fx = fixture(&[ITEMS_DDL], &[]).await;

        let result = fx
            .manager()
            .sync(&fx.a, &fx.a, &SyncOptions::default())
            .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
