//! Inbound API: what an RPC handler (or anything else embedding the loop)
//! can ask of it.

use crate::domain::SyncStatus;

/// Read-only view into sync progress, backing `eth_syncing`.
pub trait SyncStatusApi: Send + Sync {
    /// Current sync status.
    fn status(&self) -> SyncStatus;
}
