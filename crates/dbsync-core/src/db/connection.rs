//! Database connection management

use std::path::{Path, PathBuf};
use std::time::Duration;

use libsql::{Builder, Connection, Database as LibSqlDatabase};

use crate::error::{Error, Result};

/// Default time a connection waits on a locked database before failing
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pragmas applied to every connection the engine opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Switch the file to WAL journal mode (best effort)
    pub wal: bool,
    /// `busy_timeout` for lock contention between concurrent passes
    pub busy_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            wal: true,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl ConnectionOptions {
    /// Leave the journal mode of the file untouched
    #[must_use]
    pub const fn without_wal(mut self) -> Self {
        self.wal = false;
        self
    }

    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// A scoped libSQL connection to one local database file.
///
/// The connection is closed when the value is dropped.
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    pub async fn open(path: impl AsRef<Path>, options: &ConnectionOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(path, options).await
    }

    /// Open an existing database file; a missing file is an error rather
    /// than an empty database.
    pub async fn open_existing(path: impl AsRef<Path>, options: &ConnectionOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Self::connect(path, options).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        Ok(Self {
            _db: db,
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    async fn connect(path: &Path, options: &ConnectionOptions) -> Result<Self> {
        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            _db: db,
            conn,
            path: path.to_path_buf(),
        };
        database.configure(options).await?;
        Ok(database)
    }

    async fn configure(&self, options: &ConnectionOptions) -> Result<()> {
        let busy_ms = options.busy_timeout.as_millis();
        run_pragma(&self.conn, &format!("PRAGMA busy_timeout = {busy_ms}")).await?;
        if options.wal {
            // Not every file can switch (e.g. read-only media); keep going.
            if let Err(error) = run_pragma(&self.conn, "PRAGMA journal_mode = WAL").await {
                tracing::debug!("WAL mode unavailable for {}: {}", self.path.display(), error);
            }
        }
        run_pragma(&self.conn, "PRAGMA synchronous = NORMAL").await.ok();
        Ok(())
    }

    /// Begin an explicit transaction, taking the write lock up front so that
    /// concurrent passes wait on `busy_timeout` instead of deadlocking.
    pub async fn begin(&self) -> Result<()> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.conn.execute("COMMIT", ()).await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.conn.execute("ROLLBACK", ()).await?;
        Ok(())
    }

    /// Path this database was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Run a PRAGMA (or any statement that may yield rows) and drain its output.
pub async fn run_pragma(conn: &Connection, sql: &str) -> Result<()> {
    let mut rows = conn.query(sql, ()).await?;
    while rows.next().await?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_creates_missing_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("analytics.db");
        let db = Database::open(&path, &ConnectionOptions::default())
            .await
            .unwrap();
        assert_eq!(db.path(), path.as_path());
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_existing_rejects_missing_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("missing.db");
        let result = Database::open_existing(&path, &ConnectionOptions::default()).await;
        assert!(matches!(result, Err(Error::NotFound(missing)) if missing == path));
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wal_mode_is_applied_when_requested() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("wal.db");
        let db = Database::open(&path, &ConnectionOptions::default())
            .await
            .unwrap();

        let mut rows = db
            .connection()
            .query("PRAGMA journal_mode", ())
            .await
            .unwrap();
        let mode: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rollback_discards_writes() {
        let db = Database::open_in_memory().await.unwrap();
        let conn = db.connection();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", ())
            .await
            .unwrap();

        db.begin().await.unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", ()).await.unwrap();
        db.rollback().await.unwrap();

        let mut rows = conn.query("SELECT COUNT(*) FROM t", ()).await.unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }
}
