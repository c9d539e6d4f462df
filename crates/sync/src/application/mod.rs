//! The sync loop itself, orchestrating the domain types and outbound ports.

pub mod sync_loop;

pub use sync_loop::SyncLoop;
