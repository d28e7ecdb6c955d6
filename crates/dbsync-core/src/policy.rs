//! Conflict resolution policies
//!
//! A policy is consulted only when a primary key exists on both sides of a
//! pass with differing content. It must be a pure function of the table name
//! and the two rows so that repeated passes converge to the same state.
//!
//! Built-in variants:
//! - [`TimestampPolicy`]: last write wins by `updated_at`/`modified_at`.
//! - [`CustomPolicy`]: any closure with the `resolve` signature.
//! - [`RegistryPolicy`]: per-table policies with a fallback.
//! - [`ConcatMergePolicy`]: field-wise merge of both rows.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{ConflictDecision, Row, SqlValue};

/// Columns consulted, in order, for a row's version
pub const VERSION_COLUMNS: [&str; 2] = ["updated_at", "modified_at"];

/// Decides which version of a conflicting row survives a pass
pub trait ConflictPolicy: Send + Sync {
    /// Produce the row to store on both sides.
    fn resolve(&self, table: &str, row_a: &Row, row_b: &Row) -> Result<Row>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "custom"
    }
}

/// A row's version: the first non-null version column, else `0`.
pub fn row_version(row: &Row) -> SqlValue {
    VERSION_COLUMNS
        .iter()
        .filter_map(|column| row.get(column))
        .find(|value| !value.is_null())
        .cloned()
        .unwrap_or(SqlValue::Integer(0))
}

/// Classify a resolved row against the two inputs
pub fn classify(resolved: &Row, row_a: &Row, row_b: &Row) -> ConflictDecision {
    if resolved == row_a {
        ConflictDecision::Source
    } else if resolved == row_b {
        ConflictDecision::Target
    } else {
        ConflictDecision::Merged
    }
}

/// Last write wins, by row version. Equal versions keep `row_a`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampPolicy;

/// Alias kept for callers that name the strategy rather than the mechanism
pub type LastWriteWinsPolicy = TimestampPolicy;

impl TimestampPolicy {
    fn a_wins(row_a: &Row, row_b: &Row) -> bool {
        row_version(row_a).sql_cmp(&row_version(row_b)) != Ordering::Less
    }
}

impl ConflictPolicy for TimestampPolicy {
    fn resolve(&self, _table: &str, row_a: &Row, row_b: &Row) -> Result<Row> {
        if Self::a_wins(row_a, row_b) {
            Ok(row_a.clone())
        } else {
            Ok(row_b.clone())
        }
    }

    fn name(&self) -> &str {
        "last-write-wins"
    }
}

/// Wraps a closure as a policy
pub struct CustomPolicy<F> {
    name: String,
    resolver: F,
}

impl<F> CustomPolicy<F>
where
    F: Fn(&str, &Row, &Row) -> Result<Row> + Send + Sync,
{
    pub fn new(resolver: F) -> Self {
        Self::named("custom", resolver)
    }

    pub fn named(name: impl Into<String>, resolver: F) -> Self {
        Self {
            name: name.into(),
            resolver,
        }
    }
}

impl<F> ConflictPolicy for CustomPolicy<F>
where
    F: Fn(&str, &Row, &Row) -> Result<Row> + Send + Sync,
{
    fn resolve(&self, table: &str, row_a: &Row, row_b: &Row) -> Result<Row> {
        (self.resolver)(table, row_a, row_b)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for CustomPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPolicy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Field-wise merge of two rows.
///
/// Columns equal on both sides are kept. Differing text columns are joined
/// as `a{separator}b`. Every other differing column, including the version
/// columns, comes from the last-write-wins winner.
#[derive(Debug, Clone)]
pub struct ConcatMergePolicy {
    separator: String,
}

impl Default for ConcatMergePolicy {
    fn default() -> Self {
        Self::new(" | ")
    }
}

impl ConcatMergePolicy {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl ConflictPolicy for ConcatMergePolicy {
    fn resolve(&self, _table: &str, row_a: &Row, row_b: &Row) -> Result<Row> {
        let a_wins = TimestampPolicy::a_wins(row_a, row_b);

        let mut merged = Row::new();
        let columns = row_a
            .columns()
            .chain(row_b.columns().filter(|column| row_a.get(column).is_none()));
        for column in columns {
            let value = match (row_a.get(column), row_b.get(column)) {
                (Some(a), Some(b)) if a == b => a.clone(),
                (Some(SqlValue::Text(a)), Some(SqlValue::Text(b)))
                    if !VERSION_COLUMNS.contains(&column) =>
                {
                    SqlValue::Text(format!("{a}{}{b}", self.separator))
                }
                (Some(a), Some(b)) => {
                    if a_wins {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
                (Some(value), None) | (None, Some(value)) => value.clone(),
                (None, None) => SqlValue::Null,
            };
            merged.set(column, value);
        }
        Ok(merged)
    }

    fn name(&self) -> &str {
        "merge"
    }
}

/// Per-table policies consulted ahead of the pass-wide policy
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn ConflictPolicy>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` for `table`, replacing any previous entry.
    pub fn register(&mut self, table: impl Into<String>, policy: Arc<dyn ConflictPolicy>) {
        self.resolvers.insert(table.into(), policy);
    }

    /// Builder-style registration
    #[must_use]
    pub fn with(mut self, table: impl Into<String>, policy: impl ConflictPolicy + 'static) -> Self {
        self.register(table, Arc::new(policy));
        self
    }

    pub fn get(&self, table: &str) -> Option<&Arc<dyn ConflictPolicy>> {
        self.resolvers.get(table)
    }

    /// The registered policy for `table`, or `fallback`.
    pub fn policy_for<'a>(
        &'a self,
        table: &str,
        fallback: &'a dyn ConflictPolicy,
    ) -> &'a dyn ConflictPolicy {
        self.get(table).map_or(fallback, AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries = self
            .resolvers
            .iter()
            .map(|(table, policy)| (table.as_str(), policy.name()))
            .collect::<Vec<_>>();
        entries.sort_unstable();
        f.debug_map().entries(entries).finish()
    }
}

/// A registry plus a fallback, usable anywhere a single policy is expected
#[derive(Clone, Debug)]
pub struct RegistryPolicy {
    registry: ResolverRegistry,
    fallback: Arc<dyn ConflictPolicy>,
}

impl RegistryPolicy {
    pub fn new(registry: ResolverRegistry, fallback: Arc<dyn ConflictPolicy>) -> Self {
        Self { registry, fallback }
    }
}

impl ConflictPolicy for RegistryPolicy {
    fn resolve(&self, table: &str, row_a: &Row, row_b: &Row) -> Result<Row> {
        self.registry
            .policy_for(table, self.fallback.as_ref())
            .resolve(table, row_a, row_b)
    }

    fn name(&self) -> &str {
        "registry"
    }
}

impl fmt::Debug for dyn ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConflictPolicy({})", self.name())
    }
}

/// Policies selectable by name (CLI flag, config file)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuiltinPolicy {
    #[default]
    #[serde(rename = "last-write-wins", alias = "timestamp")]
    LastWriteWins,
    #[serde(rename = "merge")]
    Merge,
}

impl BuiltinPolicy {
    pub fn into_policy(self) -> Arc<dyn ConflictPolicy> {
        match self {
            Self::LastWriteWins => Arc::new(TimestampPolicy),
            Self::Merge => Arc::new(ConcatMergePolicy::default()),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastWriteWins => "last-write-wins",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for BuiltinPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "timestamp" => Ok(Self::LastWriteWins),
            "merge" => Ok(Self::Merge),
            other => Err(Error::InvalidInput(format!(
                "Unknown conflict policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for BuiltinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
