//! Schema mapping between two databases
//!
//! [`SchemaMapper`] guarantees that every user table defined in one database
//! exists in the other by replaying the originating `CREATE TABLE` statement.
//! Existing tables are never altered, even when their definitions diverge.

use libsql::Connection;

use crate::error::Result;
use crate::util::{is_internal_table, quote_identifier, sanitize_table_name};

/// A table as recorded in `sqlite_master`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    /// Stored DDL; absent for some internal objects
    pub create_sql: Option<String>,
}

/// List user tables (everything except `sqlite_*`), ordered by name.
pub async fn list_tables(conn: &Connection) -> Result<Vec<TableDef>> {
    let mut rows = conn
        .query(
            "SELECT name, sql FROM sqlite_master WHERE type = 'table' ORDER BY name",
            (),
        )
        .await?;

    let mut tables = Vec::new();
    while let Some(row) = rows.next().await? {
        let name: String = row.get(0)?;
        if is_internal_table(&name) {
            continue;
        }
        let create_sql: Option<String> = row.get(1)?;
        tables.push(TableDef { name, create_sql });
    }
    Ok(tables)
}

/// Check whether a table called `name` exists
pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            libsql::params![name],
        )
        .await?;
    Ok(rows.next().await?.is_some())
}

/// Find the declared single-column primary key of `table`.
///
/// Upserts rely on the key constraint to overwrite, so an undeclared `id`
/// column does not count. Composite keys and key-less tables yield `None`.
pub async fn primary_key_column(conn: &Connection, table: &str) -> Result<Option<String>> {
    let table = sanitize_table_name(table)?;
    let mut rows = conn
        .query(&format!("PRAGMA table_info({})", quote_identifier(table)), ())
        .await?;

    let mut key_columns = Vec::new();
    while let Some(row) = rows.next().await? {
        let pk: i64 = row.get(5)?;
        if pk > 0 {
            key_columns.push(row.get::<String>(1)?);
        }
    }

    Ok(if key_columns.len() == 1 {
        key_columns.pop()
    } else {
        None
    })
}

/// Replays missing table definitions from one database onto another
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaMapper;

impl SchemaMapper {
    pub const fn new() -> Self {
        Self
    }

    /// Ensure every table of `source` exists in `target`.
    ///
    /// Every table name is validated before any DDL runs. Returns the names
    /// of the tables created on `target`; an empty list once both sides agree.
    pub async fn map(&self, source: &Connection, target: &Connection) -> Result<Vec<String>> {
        let tables = list_tables(source).await?;
        for table in &tables {
            sanitize_table_name(&table.name)?;
        }

        let mut created = Vec::new();
        for table in tables {
            if table_exists(target, &table.name).await? {
                continue;
            }
            let Some(create_sql) = table.create_sql else {
                continue;
            };
            target.execute(&create_sql, ()).await?;
            tracing::info!("Created table {} from mapped schema", table.name);
            created.push(table.name);
        }

        Ok(created)
    }
}
