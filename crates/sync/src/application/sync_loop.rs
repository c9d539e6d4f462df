//! The provider-driven validate/checkpoint loop: fetches one block past the
//! last applied height, validates its header against its parent, applies
//! its transactions to the running account-layer state, and - every
//! `checkpoint_interval` blocks, and once more on shutdown - flushes that
//! state to the backing trie and checks the resulting root against the
//! header's declared `state_root`.
//!
//! Per-block execution already advances durable state: `AccountLayer`'s
//! cache is mutated (and thus visible to the next block) by every
//! transaction as it runs. `TrieBackedState::commit()` is the separate,
//! expensive operation of folding that cache into the Merkle trie and
//! producing a new root - that's the part this loop defers to checkpoint
//! boundaries, not transaction application itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use consensus::{DifficultyConfig, EthBlock, EthHeader, EthTransaction, HeaderValidator};
use evm::prelude::{
    Address, BatchExecutor, BlockContext, InMemoryAccessList, ServiceConfig, SignedTransaction,
    SmartContractService, TrieBackedState, VmConfig, U256 as EvmU256,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{Hash, SyncError, SyncProgress, SyncStatus};
use crate::ports::outbound::BlockSource;
use crate::ports::SyncStatusApi;

fn current_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn tx_hash(tx: &EthTransaction) -> Hash {
    use rlp::Encodable;
    shared_crypto::keccak256(&tx.rlp_bytes())
}

fn to_signed_transaction(tx: &EthTransaction, sender: [u8; 20]) -> SignedTransaction {
    SignedTransaction {
        from: Address::new(sender),
        to: tx.to.map(Address::new),
        value: tx.value,
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        data: evm::prelude::Bytes::from_vec(tx.data.clone()),
        hash: evm::prelude::Hash::new(tx_hash(tx)),
    }
}

/// Drives headers/blocks from a [`BlockSource`] into validated, committed
/// state. One instance follows one chain.
pub struct SyncLoop<B: BlockSource> {
    source: B,
    validator: HeaderValidator,
    state: Arc<TrieBackedState>,
    executor: SmartContractService<Arc<TrieBackedState>, InMemoryAccessList>,
    chain_id: u64,
    checkpoint_interval: u64,
    last_header: Mutex<EthHeader>,
    last_checkpointed_height: AtomicU64,
    progress: Arc<SyncProgress>,
}

impl<B: BlockSource> SyncLoop<B> {
    /// Build a loop starting from `genesis` (trusted, never itself run
    /// through the validator) over a fresh, empty state.
    #[must_use]
    pub fn new(source: B, genesis: EthHeader, chain_id: u64, checkpoint_interval: u64) -> Self {
        Self::with_state(source, genesis, chain_id, checkpoint_interval, Arc::new(TrieBackedState::new()))
    }

    /// Build a loop resuming from `genesis`'s successor over an
    /// already-populated state (e.g. one restored from a prior checkpoint).
    pub fn with_state(
        source: B,
        last_committed_header: EthHeader,
        chain_id: u64,
        checkpoint_interval: u64,
        state: Arc<TrieBackedState>,
    ) -> Self {
        let height = last_committed_header.number;
        let executor = SmartContractService::new(
            Arc::clone(&state),
            InMemoryAccessList::new(),
            ServiceConfig {
                vm_config: VmConfig::default(),
                ..ServiceConfig::default()
            },
        );
        Self {
            source,
            validator: HeaderValidator::new(DifficultyConfig::default()),
            state,
            executor,
            chain_id,
            checkpoint_interval: checkpoint_interval.max(1),
            last_header: Mutex::new(last_committed_header),
            last_checkpointed_height: AtomicU64::new(height),
            progress: Arc::new(SyncProgress::new(height)),
        }
    }

    /// A handle other components (an RPC server reporting `eth_syncing`)
    /// can poll independently of the loop.
    #[must_use]
    pub fn progress(&self) -> Arc<SyncProgress> {
        Arc::clone(&self.progress)
    }

    /// Attempt to advance by exactly one block. `Ok(false)` means the
    /// source has nothing new yet; `Ok(true)` means one block was
    /// validated and applied. Errors from header validation, state-root
    /// mismatch, or the backing store are never retried by this method -
    /// the caller decides whether to checkpoint and stop.
    pub async fn run_once(&self) -> Result<bool, SyncError> {
        let tip = self.source.chain_tip().await?;
        self.progress.observe_highest(tip);

        let next_height = self.progress.current() + 1;
        if next_height > tip {
            return Ok(false);
        }

        let Some(block) = self.source.block_at(next_height).await? else {
            return Ok(false);
        };

        let parent = self.last_header.lock().await.clone();
        self.validator
            .validate(&block.header, &parent, current_unix_time())
            .map_err(|source| SyncError::HeaderValidation { height: next_height, source })?;

        self.apply_block(&block).await?;

        *self.last_header.lock().await = block.header.clone();
        self.progress.set_current(next_height);

        if next_height % self.checkpoint_interval == 0 {
            self.checkpoint(next_height, block.header.state_root).await?;
        }

        Ok(true)
    }

    async fn apply_block(&self, block: &EthBlock) -> Result<(), SyncError> {
        let height = block.header.number;
        let mut signed = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            let sender = tx.recover_sender().map_err(|_| SyncError::SenderRecoveryFailed {
                height,
                tx_hash: tx_hash(tx),
            })?;
            signed.push(to_signed_transaction(tx, sender));
        }

        let block_context = BlockContext {
            number: height,
            timestamp: block.header.timestamp,
            coinbase: Address::new(block.header.beneficiary),
            difficulty: block.header.difficulty,
            gas_limit: block.header.gas_limit,
            base_fee: EvmU256::zero(),
            chain_id: self.chain_id,
        };

        self.executor.execute_batch(&signed, &block_context).await.map_err(|source| {
            let tx_hash = signed.first().map(|tx| *tx.hash().as_bytes()).unwrap_or([0u8; 32]);
            SyncError::InvalidTransaction { height, tx_hash, source }
        })?;

        Ok(())
    }

    /// Flush the account layer into the trie and check the resulting root
    /// against `expected_root`. Called every `checkpoint_interval` blocks
    /// and once more, unconditionally, on shutdown.
    async fn checkpoint(&self, height: u64, expected_root: Hash) -> Result<(), SyncError> {
        let root = self
            .state
            .commit()
            .await
            .map_err(|e| SyncError::BackingStoreIo(e.to_string()))?;

        if *root.as_bytes() != expected_root {
            return Err(SyncError::StateRootMismatch {
                height,
                expected: expected_root,
                got: *root.as_bytes(),
            });
        }

        self.last_checkpointed_height.store(height, Ordering::Relaxed);
        info!(height, root = %hex::encode(root.as_bytes()), "checkpointed state");
        Ok(())
    }

    /// Final, unconditional checkpoint run on clean shutdown. Unlike the
    /// per-interval checkpoint this doesn't check the root against a
    /// specific header - the last applied block may not land on a
    /// checkpoint boundary - it only persists whatever has been applied
    /// since the previous checkpoint.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let height = self.progress.current();
        if height == self.last_checkpointed_height.load(Ordering::Relaxed) {
            return Ok(());
        }
        let root = self
            .state
            .commit()
            .await
            .map_err(|e| SyncError::BackingStoreIo(e.to_string()))?;
        self.last_checkpointed_height.store(height, Ordering::Relaxed);
        info!(height, root = %hex::encode(root.as_bytes()), "final checkpoint on shutdown");
        Ok(())
    }

    /// Run until the source has nothing new, logging progress as it goes.
    /// On any error, logs it, performs one final checkpoint attempt, and
    /// propagates the original error - never retries silently.
    pub async fn catch_up(&self) -> Result<(), SyncError> {
        loop {
            match self.run_once().await {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "sync loop stopped on unrecoverable error");
                    if let Err(shutdown_err) = self.shutdown().await {
                        warn!(error = %shutdown_err, "final checkpoint after failure also failed");
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl<B: BlockSource> SyncStatusApi for SyncLoop<B> {
    fn status(&self) -> SyncStatus {
        self.progress.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::test_support::FixedBlockSource;

    fn genesis() -> EthHeader {
        EthHeader {
            parent_hash: [0u8; 32],
            ommers_hash: [0u8; 32],
            beneficiary: [0u8; 20],
            state_root: [0u8; 32],
            transactions_root: [0u8; 32],
            receipts_root: [0u8; 32],
            logs_bloom: [0u8; 256],
            difficulty: primitive_types::U256::from(131_072u64),
            number: 0,
            gas_limit: 200_000,
            gas_used: 0,
            timestamp: 0,
            extra_data: vec![],
            mix_hash: [0u8; 32],
            nonce: [0u8; 8],
        }
    }

    fn child(parent: &EthHeader) -> EthHeader {
        EthHeader {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            timestamp: parent.timestamp + 13,
            difficulty: parent.difficulty,
            gas_limit: parent.gas_limit,
            gas_used: 0,
            ..parent.clone()
        }
    }

    #[tokio::test]
    async fn advances_one_block_at_a_time_with_no_transactions() {
        let genesis = genesis();
        let b1 = child(&genesis);
        let source = FixedBlockSource::new(vec![EthBlock {
            header: b1.clone(),
            transactions: vec![],
            ommers: vec![],
        }]);

        let sync = SyncLoop::new(source, genesis, 1, 1000);
        assert!(sync.run_once().await.unwrap());
        assert_eq!(sync.progress().current(), 1);
        assert!(!sync.run_once().await.unwrap());
    }

    #[tokio::test]
    async fn rejects_a_header_whose_timestamp_does_not_advance() {
        let genesis = genesis();
        let mut bad = child(&genesis);
        bad.timestamp = genesis.timestamp;

        let source = FixedBlockSource::new(vec![EthBlock {
            header: bad,
            transactions: vec![],
            ommers: vec![],
        }]);
        let sync = SyncLoop::new(source, genesis, 1, 1000);

        assert!(matches!(
            sync.run_once().await,
            Err(SyncError::HeaderValidation { .. })
        ));
    }

    #[tokio::test]
    async fn status_reports_syncing_until_caught_up() {
        let genesis = genesis();
        let b1 = child(&genesis);
        let b2 = child(&b1);
        let source = FixedBlockSource::new(vec![
            EthBlock { header: b1, transactions: vec![], ommers: vec![] },
            EthBlock { header: b2, transactions: vec![], ommers: vec![] },
        ]);
        let sync = SyncLoop::new(source, genesis, 1, 1000);

        assert!(sync.catch_up().await.is_ok());
        assert_eq!(sync.progress().current(), 2);
        assert!(matches!(sync.status(), SyncStatus::UpToDate { height: 2 }));
    }
}
