//! Drives block headers and bodies from a provider or peer feed into
//! validated, committed chain state.
//!
//! - [`domain`] - errors and the [`domain::SyncProgress`] height tracker.
//! - [`ports`] - [`ports::BlockSource`] (where blocks come from) and
//!   [`ports::SyncStatusApi`] (what an RPC handler can ask the loop).
//! - [`adapters`] - [`adapters::HttpBlockSource`] for a JSON provider,
//!   [`adapters::ChannelBlockSource`] for a peer-fed queue.
//! - [`application::SyncLoop`] - fetches the next block, validates its
//!   header against the consensus crate's [`consensus::HeaderValidator`],
//!   applies its transactions through the EVM crate's batch executor, and
//!   checkpoints the resulting state into the trie every
//!   `checkpoint_interval` blocks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{ChannelBlockSource, HttpBlockSource};
pub use application::SyncLoop;
pub use config::SyncConfig;
pub use domain::{Hash, SyncError, SyncProgress, SyncStatus};
pub use ports::{BlockSource, SyncStatusApi};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
