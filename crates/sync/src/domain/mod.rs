//! Core domain types for the sync loop: errors and progress tracking.

pub mod errors;
pub mod progress;

pub use errors::{Hash, SyncError};
pub use progress::{SyncProgress, SyncStatus};
