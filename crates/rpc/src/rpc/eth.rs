//! `eth_*` methods.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::types::{
    Address, BlockId, BlockTag, Bytes, Hash, SyncProgress as WireSyncProgress, SyncStatus as WireSyncStatus, U256,
};
use crate::ports::{BlockTransactions, BlockView, ChainReader, ReceiptView, TransactionView};
use serde_json::{json, Value};
use std::sync::Arc;
use sync::SyncStatus;

/// `eth_*` handlers, all backed by a single [`ChainReader`].
pub struct EthRpc {
    reader: Arc<dyn ChainReader>,
}

impl EthRpc {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// `eth_blockNumber`.
    pub fn block_number(&self) -> ApiResult<String> {
        let number = self.reader.block_number().map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(format!("0x{:x}", number))
    }

    /// `eth_getBalance`.
    pub fn get_balance(&self, address: Address, block: BlockId) -> ApiResult<U256> {
        self.reader.balance(address, block).map_err(|e| ApiError::internal(e.to_string()))
    }

    /// `eth_getStorageAt`.
    pub fn get_storage_at(&self, address: Address, slot: Hash, block: BlockId) -> ApiResult<Bytes> {
        let value = self.reader.storage_at(address, slot, block).map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(Bytes::from_slice(&value))
    }

    /// `eth_getTransactionCount`.
    pub fn get_transaction_count(&self, address: Address, block: BlockId) -> ApiResult<String> {
        let nonce =
            self.reader.transaction_count(address, block).map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(format!("0x{:x}", nonce))
    }

    /// `eth_getCode`.
    pub fn get_code(&self, address: Address, block: BlockId) -> ApiResult<Bytes> {
        self.reader.code(address, block).map_err(|e| ApiError::internal(e.to_string()))
    }

    /// `eth_getBlockByHash`.
    pub fn get_block_by_hash(&self, hash: Hash, full_transactions: bool) -> ApiResult<Option<Value>> {
        let block = self
            .reader
            .block_by_hash(hash, full_transactions)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(block.map(block_to_json))
    }

    /// `eth_getBlockByNumber`.
    pub fn get_block_by_number(&self, block: BlockId, full_transactions: bool) -> ApiResult<Option<Value>> {
        let block = self
            .reader
            .block_by_number(block, full_transactions)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(block.map(block_to_json))
    }

    /// `eth_getTransactionByHash`.
    pub fn get_transaction_by_hash(&self, hash: Hash) -> ApiResult<Option<Value>> {
        let tx =
            self.reader.transaction_by_hash(hash).map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(tx.map(transaction_to_json))
    }

    /// `eth_getTransactionReceipt`.
    pub fn get_transaction_receipt(&self, hash: Hash) -> ApiResult<Option<Value>> {
        let receipt =
            self.reader.transaction_receipt(hash).map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(receipt.map(receipt_to_json))
    }

    /// `eth_syncing`.
    pub fn syncing(&self) -> ApiResult<WireSyncStatus> {
        Ok(match self.reader.sync_status() {
            SyncStatus::UpToDate { .. } => WireSyncStatus::NotSyncing(false),
            SyncStatus::Syncing { current, highest } => WireSyncStatus::Syncing(WireSyncProgress {
                starting_block: U256::from(current),
                current_block: U256::from(current),
                highest_block: U256::from(highest),
            }),
        })
    }
}

fn block_to_json(block: BlockView) -> Value {
    let transactions = match block.transactions {
        BlockTransactions::Hashes(hashes) => {
            hashes.into_iter().map(|h| json!(Bytes::from_slice(&h))).collect::<Vec<_>>()
        }
        BlockTransactions::Full(txs) => txs.into_iter().map(transaction_to_json).collect(),
    };

    json!({
        "hash": Bytes::from_slice(&block.hash),
        "parentHash": Bytes::from_slice(&block.parent_hash),
        "number": format!("0x{:x}", block.number),
        "stateRoot": Bytes::from_slice(&block.state_root),
        "transactionsRoot": Bytes::from_slice(&block.transactions_root),
        "receiptsRoot": Bytes::from_slice(&block.receipts_root),
        "logsBloom": block.logs_bloom,
        "difficulty": block.difficulty,
        "gasLimit": format!("0x{:x}", block.gas_limit),
        "gasUsed": format!("0x{:x}", block.gas_used),
        "timestamp": format!("0x{:x}", block.timestamp),
        "extraData": block.extra_data,
        "miner": Bytes::from_slice(&block.miner),
        "uncles": block.ommer_hashes.iter().map(|h| Bytes::from_slice(h)).collect::<Vec<_>>(),
        "transactions": transactions,
    })
}

fn transaction_to_json(tx: TransactionView) -> Value {
    json!({
        "hash": Bytes::from_slice(&tx.hash),
        "nonce": format!("0x{:x}", tx.nonce),
        "from": Bytes::from_slice(&tx.from),
        "to": tx.to.map(|addr| Bytes::from_slice(&addr)),
        "value": tx.value,
        "gas": format!("0x{:x}", tx.gas),
        "gasPrice": tx.gas_price,
        "input": tx.input,
        "v": format!("0x{:x}", tx.v),
        "r": tx.r,
        "s": tx.s,
        "blockHash": Bytes::from_slice(&tx.block_hash),
        "blockNumber": format!("0x{:x}", tx.block_number),
        "transactionIndex": format!("0x{:x}", tx.transaction_index),
    })
}

fn receipt_to_json(receipt: ReceiptView) -> Value {
    json!({
        "transactionHash": Bytes::from_slice(&receipt.transaction_hash),
        "transactionIndex": format!("0x{:x}", receipt.transaction_index),
        "blockHash": Bytes::from_slice(&receipt.block_hash),
        "blockNumber": format!("0x{:x}", receipt.block_number),
        "from": Bytes::from_slice(&receipt.from),
        "to": receipt.to.map(|addr| Bytes::from_slice(&addr)),
        "cumulativeGasUsed": format!("0x{:x}", receipt.cumulative_gas_used),
        "gasUsed": format!("0x{:x}", receipt.gas_used),
        "contractAddress": receipt.contract_address.map(|addr| Bytes::from_slice(&addr)),
        "logsBloom": receipt.logs_bloom,
        "status": if receipt.status { "0x1" } else { "0x0" },
    })
}

/// Normalizes a [`BlockId`] to a concrete height, so handlers can resolve
/// `"latest"` without every one of them re-querying the tip.
pub(crate) fn resolve_block(reader: &dyn ChainReader, block: BlockId) -> ApiResult<u64> {
    match block {
        BlockId::Number(n) => Ok(n),
        BlockId::Tag(BlockTag::Latest) => reader.block_number().map_err(|e| ApiError::internal(e.to_string())),
        BlockId::Tag(tag) => {
            Err(ApiError::method_not_supported(&format!("block tag '{}' is not supported", tag.as_str())))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::ChainReaderError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A fixed, in-memory [`ChainReader`] for exercising handlers without a
    /// real trie or sync loop behind them.
    #[derive(Default)]
    pub(crate) struct FixtureChainReader {
        pub(crate) height: u64,
        pub(crate) balances: Mutex<HashMap<Address, U256>>,
    }

    impl ChainReader for FixtureChainReader {
        fn block_number(&self) -> Result<u64, ChainReaderError> {
            Ok(self.height)
        }

        fn balance(&self, address: Address, _block: BlockId) -> Result<U256, ChainReaderError> {
            Ok(self.balances.lock().unwrap().get(&address).copied().unwrap_or(U256::ZERO))
        }

        fn storage_at(&self, _address: Address, _slot: Hash, _block: BlockId) -> Result<Hash, ChainReaderError> {
            Ok([0u8; 32])
        }

        fn transaction_count(&self, _address: Address, _block: BlockId) -> Result<u64, ChainReaderError> {
            Ok(0)
        }

        fn code(&self, _address: Address, _block: BlockId) -> Result<Bytes, ChainReaderError> {
            Ok(Bytes::new())
        }

        fn block_by_hash(&self, _hash: Hash, _full: bool) -> Result<Option<BlockView>, ChainReaderError> {
            Ok(None)
        }

        fn block_by_number(&self, _block: BlockId, _full: bool) -> Result<Option<BlockView>, ChainReaderError> {
            Ok(None)
        }

        fn transaction_by_hash(&self, _hash: Hash) -> Result<Option<TransactionView>, ChainReaderError> {
            Ok(None)
        }

        fn transaction_receipt(&self, _hash: Hash) -> Result<Option<ReceiptView>, ChainReaderError> {
            Ok(None)
        }

        fn sync_status(&self) -> SyncStatus {
            SyncStatus::UpToDate { height: self.height }
        }

        fn peer_count(&self) -> u64 {
            0
        }

        fn is_listening(&self) -> bool {
            true
        }
    }

    #[test]
    fn block_number_reports_reader_height() {
        let reader = FixtureChainReader { height: 42, ..Default::default() };
        let eth = EthRpc::new(Arc::new(reader));
        assert_eq!(eth.block_number().unwrap(), "0x2a");
    }

    #[test]
    fn get_balance_defaults_to_zero_for_unknown_account() {
        let eth = EthRpc::new(Arc::new(FixtureChainReader::default()));
        let balance = eth.get_balance([0u8; 20], BlockId::default()).unwrap();
        assert_eq!(balance, U256::ZERO);
    }

    #[test]
    fn syncing_reports_false_when_caught_up() {
        let eth = EthRpc::new(Arc::new(FixtureChainReader { height: 10, ..Default::default() }));
        match eth.syncing().unwrap() {
            WireSyncStatus::NotSyncing(false) => {}
            other => panic!("expected NotSyncing(false), got {:?}", other),
        }
    }

    #[test]
    fn resolve_block_rejects_unsupported_tags() {
        let reader = FixtureChainReader::default();
        let err = resolve_block(&reader, BlockId::Tag(BlockTag::Pending)).unwrap_err();
        assert_eq!(err.code, crate::domain::error::codes::METHOD_NOT_SUPPORTED);
    }
}
