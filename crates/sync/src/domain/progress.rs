//! Sync height/progress tracking, exposed for `eth_syncing`-style queries.

use std::sync::atomic::{AtomicU64, Ordering};

/// Current height and the source's last-known tip, updated as the loop
/// makes progress. Shared behind an `Arc` so an RPC handler can read it
/// concurrently with the loop advancing it.
#[derive(Debug, Default)]
pub struct SyncProgress {
    current: AtomicU64,
    highest: AtomicU64,
}

/// A point-in-time snapshot of [`SyncProgress`], matching the shape
/// `eth_syncing` reports: `false` once caught up, otherwise the current and
/// highest known block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Caught up to the source's last-observed tip.
    UpToDate { height: u64 },
    /// Still behind.
    Syncing { current: u64, highest: u64 },
}

impl SyncProgress {
    #[must_use]
    pub fn new(starting_height: u64) -> Self {
        Self {
            current: AtomicU64::new(starting_height),
            highest: AtomicU64::new(starting_height),
        }
    }

    pub fn set_current(&self, height: u64) {
        self.current.store(height, Ordering::Relaxed);
    }

    pub fn observe_highest(&self, height: u64) {
        self.highest.fetch_max(height, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn highest(&self) -> u64 {
        self.highest.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let current = self.current();
        let highest = self.highest();
        if current >= highest {
            SyncStatus::UpToDate { height: current }
        } else {
            SyncStatus::Syncing { current, highest }
        }
    }
}
