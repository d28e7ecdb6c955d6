//! dbsync-core - Core library for dbsync
//!
//! Bidirectional synchronization between pairs of `SQLite` database files:
//! schema mapping, per-row conflict resolution with pluggable policies,
//! change-driven watching, and an audit log of every pass kept in a separate
//! analytics database.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod policy;
pub mod schema;
pub mod sync;
pub mod util;

pub use analytics::{list_conflicts, list_events, AnalyticsLog};
pub use error::{Error, Result};
pub use models::{
    ConflictDecision, ConflictEntry, ConflictRecord, EventRecord, EventStatus, Row, RowKey, SqlValue,
    SyncAction,
};
pub use policy::{
    BuiltinPolicy, ConcatMergePolicy, ConflictPolicy, CustomPolicy, RegistryPolicy,
    ResolverRegistry, TimestampPolicy,
};
pub use schema::SchemaMapper;
pub use sync::{watch_and_sync, SyncManager, SyncOptions, SyncReport, SyncWatcher};
