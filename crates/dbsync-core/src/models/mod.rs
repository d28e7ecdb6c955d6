//! Data models for dbsync

mod conflict;
mod event;
mod row;
mod value;

pub use conflict::{ConflictDecision, ConflictEntry, ConflictRecord};
pub use event::{EventRecord, EventStatus, SyncAction};
pub use row::Row;
pub use value::{RowKey, SqlValue};
