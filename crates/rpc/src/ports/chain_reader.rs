//! [`ChainReader`]: the synchronous read surface the dispatcher needs to
//! answer §6's method contract, independent of whatever stores the chain
//! (trie backing store, block history, sync loop) on the other side.

use crate::domain::types::{Address, BlockId, Bytes, Hash, U256};
use sync::SyncStatus;
use thiserror::Error;

/// A block as handed back across the RPC boundary, with the transaction
/// list either full objects or just their hashes depending on the
/// caller's `full_transactions` flag - matching `eth_getBlockBy*`'s second
/// boolean parameter.
#[derive(Debug, Clone)]
pub struct BlockView {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub number: u64,
    pub state_root: Hash,
    pub transactions_root: Hash,
    pub receipts_root: Hash,
    pub logs_bloom: Bytes,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub miner: Address,
    pub ommer_hashes: Vec<Hash>,
    pub transactions: BlockTransactions,
}

/// Either transaction hashes or full transaction objects, mirroring the
/// two shapes `eth_getBlockByHash`/`eth_getBlockByNumber` can return.
#[derive(Debug, Clone)]
pub enum BlockTransactions {
    Hashes(Vec<Hash>),
    Full(Vec<TransactionView>),
}

/// A transaction as handed back by `eth_getTransactionByHash`, with its
/// containing-block coordinates alongside the signed fields.
#[derive(Debug, Clone)]
pub struct TransactionView {
    pub hash: Hash,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas: u64,
    pub gas_price: U256,
    pub input: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub block_hash: Hash,
    pub block_number: u64,
    pub transaction_index: u64,
}

/// A transaction's execution outcome, for `eth_getTransactionReceipt`.
#[derive(Debug, Clone)]
pub struct ReceiptView {
    pub transaction_hash: Hash,
    pub transaction_index: u64,
    pub block_hash: Hash,
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs_bloom: Bytes,
    pub status: bool,
}

/// Everything that can go wrong resolving a read against the chain.
#[derive(Debug, Error)]
pub enum ChainReaderError {
    #[error("block {0} not found")]
    BlockNotFound(String),
    #[error("account state unavailable: {0}")]
    StateUnavailable(String),
}

/// Synchronous reads against the canonical chain, backing the dispatcher's
/// `eth_*`/`net_*` handlers. A block argument of `BlockId::Tag(BlockTag::Latest)`
/// always resolves against the chain tip the implementor currently has
/// committed; implementors that keep only the latest state (no historical
/// account snapshots) may return [`ChainReaderError::StateUnavailable`] for
/// any other block.
pub trait ChainReader: Send + Sync {
    /// `eth_blockNumber`: height of the canonical chain tip.
    fn block_number(&self) -> Result<u64, ChainReaderError>;

    /// `eth_getBalance`.
    fn balance(&self, address: Address, block: BlockId) -> Result<U256, ChainReaderError>;

    /// `eth_getStorageAt`.
    fn storage_at(&self, address: Address, slot: Hash, block: BlockId) -> Result<Hash, ChainReaderError>;

    /// `eth_getTransactionCount`: the account's nonce.
    fn transaction_count(&self, address: Address, block: BlockId) -> Result<u64, ChainReaderError>;

    /// `eth_getCode`.
    fn code(&self, address: Address, block: BlockId) -> Result<Bytes, ChainReaderError>;

    /// `eth_getBlockByHash`.
    fn block_by_hash(&self, hash: Hash, full_transactions: bool) -> Result<Option<BlockView>, ChainReaderError>;

    /// `eth_getBlockByNumber`.
    fn block_by_number(&self, block: BlockId, full_transactions: bool) -> Result<Option<BlockView>, ChainReaderError>;

    /// `eth_getTransactionByHash`.
    fn transaction_by_hash(&self, hash: Hash) -> Result<Option<TransactionView>, ChainReaderError>;

    /// `eth_getTransactionReceipt`.
    fn transaction_receipt(&self, hash: Hash) -> Result<Option<ReceiptView>, ChainReaderError>;

    /// `eth_syncing`.
    fn sync_status(&self) -> SyncStatus;

    /// `net_peerCount`.
    fn peer_count(&self) -> u64;

    /// `net_listening`.
    fn is_listening(&self) -> bool;
}
