//! Bidirectional synchronization passes and change-driven watchers

mod manager;
mod types;
mod watcher;

pub use manager::SyncManager;
pub use types::{SyncOptions, SyncReport};
pub use watcher::{watch_and_sync, FileFingerprint, SyncWatcher};
