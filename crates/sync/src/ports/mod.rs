//! Ports: the inbound status API and the outbound block source.

pub mod inbound;
pub mod outbound;

pub use inbound::SyncStatusApi;
pub use outbound::BlockSource;
