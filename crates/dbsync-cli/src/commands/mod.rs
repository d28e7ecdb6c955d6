pub mod common;
pub mod events;
pub mod sync;
pub mod watch;
