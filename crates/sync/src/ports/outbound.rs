//! Outbound dependency: wherever the loop gets blocks from.

use async_trait::async_trait;
use consensus::EthBlock;

use crate::domain::SyncError;

/// Source of chain data the sync loop pulls from. One implementation talks
/// to a JSON provider endpoint (`sync` subcommand); another drains a
/// channel fed by the peer-wire network domain (`mana` subcommand).
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// The highest block height the source currently knows about.
    async fn chain_tip(&self) -> Result<u64, SyncError>;

    /// Fetch the full block (header + transactions + ommers) at `height`,
    /// or `None` if the source doesn't have it yet.
    async fn block_at(&self, height: u64) -> Result<Option<EthBlock>, SyncError>;
}
