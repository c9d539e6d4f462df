//! Peer-driven block source for the `mana` subcommand.
//!
//! The network domain (peer discovery, `eth/63` session handling) runs on
//! its own per-peer tasks and feeds validated blocks into one shared
//! bounded queue; this adapter is the consumer end of that queue. Real
//! peer handshake and multi-peer block selection live in the network
//! domain, out of scope here - this adapter only drains what it's handed.

use async_trait::async_trait;
use consensus::EthBlock;
use tokio::sync::{mpsc, Mutex};

use crate::domain::SyncError;
use crate::ports::outbound::BlockSource;

/// Wraps the receiving half of a bounded channel of inbound blocks,
/// buffering them by height so `block_at` can serve them out of order
/// relative to channel arrival (peers may deliver a later height first).
pub struct ChannelBlockSource {
    receiver: Mutex<mpsc::Receiver<EthBlock>>,
    buffered: Mutex<std::collections::BTreeMap<u64, EthBlock>>,
}

impl ChannelBlockSource {
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<EthBlock>) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            buffered: Mutex::new(std::collections::BTreeMap::new()),
        }
    }

    /// Drain any blocks currently sitting in the channel into the buffer
    /// without blocking further once the channel is empty.
    async fn drain_available(&self) {
        let mut receiver = self.receiver.lock().await;
        let mut buffered = self.buffered.lock().await;
        while let Ok(block) = receiver.try_recv() {
            buffered.insert(block.header.number, block);
        }
    }
}

#[async_trait]
impl BlockSource for ChannelBlockSource {
    async fn chain_tip(&self) -> Result<u64, SyncError> {
        self.drain_available().await;
        Ok(self.buffered.lock().await.keys().next_back().copied().unwrap_or(0))
    }

    async fn block_at(&self, height: u64) -> Result<Option<EthBlock>, SyncError> {
        self.drain_available().await;
        Ok(self.buffered.lock().await.get(&height).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus::EthHeader;

    fn header(number: u64) -> EthHeader {
        EthHeader {
            parent_hash: [0u8; 32],
            ommers_hash: [0u8; 32],
            beneficiary: [0u8; 20],
            state_root: [0u8; 32],
            transactions_root: [0u8; 32],
            receipts_root: [0u8; 32],
            logs_bloom: [0u8; 256],
            difficulty: primitive_types::U256::zero(),
            number,
            gas_limit: 0,
            gas_used: 0,
            timestamp: number,
            extra_data: vec![],
            mix_hash: [0u8; 32],
            nonce: [0u8; 8],
        }
    }

    #[tokio::test]
    async fn serves_buffered_blocks_by_height() {
        let (tx, rx) = mpsc::channel(8);
        let source = ChannelBlockSource::new(rx);

        tx.send(EthBlock { header: header(2), transactions: vec![], ommers: vec![] })
            .await
            .unwrap();
        tx.send(EthBlock { header: header(1), transactions: vec![], ommers: vec![] })
            .await
            .unwrap();

        assert_eq!(source.chain_tip().await.unwrap(), 2);
        assert!(source.block_at(1).await.unwrap().is_some());
        assert!(source.block_at(3).await.unwrap().is_none());
    }
}
