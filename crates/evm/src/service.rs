//! # Smart Contract Service
//!
//! Wires the interpreter to a concrete `StateAccess`/`AccessList` pair and
//! drives transaction application: gas debit/credit, nonce checks, value
//! transfer, and per-block batching (`BatchExecutor`).

use crate::adapters::{InMemoryAccessList, InMemoryState};
use crate::domain::entities::{AccountState, BlockContext, ExecutionContext, ExecutionResult, VmConfig};
use crate::domain::value_objects::{Address, Bytes, U256};
use crate::errors::VmError;
use crate::evm::transient::TransientStorage;
use crate::evm::Interpreter;
use crate::ports::inbound::{BatchExecutor, SignedTransaction, SmartContractApi, TransactionReceipt};
use crate::ports::outbound::{AccessList, StateAccess};

use async_trait::async_trait;
use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Smart Contract Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// VM configuration.
    pub vm_config: VmConfig,
    /// Execution timeout in milliseconds.
    pub execution_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            vm_config: VmConfig::default(),
            execution_timeout_ms: 5000,
        }
    }
}

/// The main Smart Contract Service: binds an interpreter to one `StateAccess`
/// and `AccessList` pair and exposes `SmartContractApi`/`BatchExecutor` over
/// it.
pub struct SmartContractService<S: StateAccess, A: AccessList> {
    config: ServiceConfig,
    state: Arc<S>,
    access_list: Arc<RwLock<A>>,
}

impl<S: StateAccess, A: AccessList> SmartContractService<S, A> {
    /// Create a new Smart Contract Service.
    pub fn new(state: S, access_list: A, config: ServiceConfig) -> Self {
        Self {
            config,
            state: Arc::new(state),
            access_list: Arc::new(RwLock::new(access_list)),
        }
    }

    /// Internal transaction execution: resolves the code to run (init code
    /// for a creation, deployed code otherwise) and builds the top-level
    /// `ExecutionContext`.
    async fn execute_transaction_internal(
        &self,
        tx: &SignedTransaction,
        block: &BlockContext,
    ) -> Result<ExecutionResult, VmError> {
        let is_creation = tx.to.is_none();

        let code = if is_creation {
            tx.data.clone()
        } else {
            let to_addr = tx.to.unwrap();
            self.state.get_code(to_addr).await.map_err(VmError::StateError)?
        };

        let context = ExecutionContext {
            origin: tx.sender(),
            caller: tx.sender(),
            address: tx.to.unwrap_or_else(|| {
                crate::domain::services::compute_contract_address(tx.sender(), tx.nonce)
            }),
            value: tx.value,
            data: tx.data.clone(),
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            block: block.clone(),
            depth: 0,
            is_static: false,
        };

        let timeout = Duration::from_millis(self.config.execution_timeout_ms);
        let result = tokio::time::timeout(timeout, self.execute_code(&context, &code.0))
            .await
            .map_err(|_| VmError::Timeout {
                elapsed_ms: self.config.execution_timeout_ms,
                max_ms: self.config.execution_timeout_ms,
            })??;

        Ok(result)
    }

    /// Execute contract code under `context`, pre-warming the caller/origin
    /// per EIP-2929 and giving the top-level frame a fresh, transaction-
    /// scoped `TransientStorage` (EIP-1153) that every nested CALL/CREATE
    /// frame shares and that is discarded when this call returns.
    async fn execute_code(
        &self,
        context: &ExecutionContext,
        code: &[u8],
    ) -> Result<ExecutionResult, VmError> {
        {
            let mut access_list = self.access_list.write().await;
            access_list.warm_account(context.origin);
            access_list.warm_account(context.address);
            if context.caller != context.origin {
                access_list.warm_account(context.caller);
            }
        }

        let mut access_list = self.access_list.write().await;
        let transient = RefCell::new(TransientStorage::new());
        let mut interpreter = Interpreter::with_config(
            context.clone(),
            code,
            &*self.state,
            &mut *access_list,
            &transient,
            self.config.vm_config.rules.clone(),
        );

        interpreter.execute().await
    }

    /// Apply one transaction against `self.state` with the gas/nonce/value
    /// bookkeeping that surrounds bytecode execution: debits the upfront gas
    /// cost and the nonce before running the code, transfers `tx.value`
    /// atomically with execution (rolled back together on failure), refunds
    /// unused gas to the sender, and pays the net fee to `block.coinbase`.
    async fn apply_transaction(
        &self,
        tx: &SignedTransaction,
        block: &BlockContext,
        cumulative_gas_used: u64,
    ) -> Result<TransactionReceipt, VmError> {
        let sender = tx.sender();

        let current_nonce = self.state.get_nonce(sender).await.map_err(VmError::StateError)?;
        if current_nonce != tx.nonce {
            return Err(VmError::NonceMismatch {
                expected: current_nonce,
                got: tx.nonce,
            });
        }

        let gas_price = tx.gas_price;
        let upfront_cost = gas_price.saturating_mul(U256::from(tx.gas_limit));
        let balance = self.state.get_balance(sender).await.map_err(VmError::StateError)?;
        let total_required = upfront_cost.saturating_add(tx.value);
        if balance < total_required {
            return Err(VmError::InsufficientBalance {
                required: total_required,
                available: balance,
            });
        }

        self.state
            .increment_nonce(sender)
            .await
            .map_err(VmError::StateError)?;
        self.debit_balance(sender, upfront_cost).await?;

        let contract_address = tx
            .to
            .is_none()
            .then(|| crate::domain::services::compute_contract_address(sender, tx.nonce));

        let snapshot = self.state.snapshot();
        if !tx.value.is_zero() {
            let recipient = tx
                .to
                .or(contract_address)
                .expect("contract creation always derives a recipient address");
            if let Err(e) = self.state.transfer(sender, recipient, tx.value).await {
                self.state.revert_to(snapshot);
                return Err(VmError::StateError(e));
            }
        }

        let outcome = self.execute_transaction_internal(tx, block).await;

        let (success, output, logs, revert_reason, gas_used, gas_refund, applied_contract_address) =
            match outcome {
                Ok(exec_result) if exec_result.success => (
                    true,
                    exec_result.output,
                    exec_result.logs,
                    None,
                    exec_result.gas_used,
                    exec_result.gas_refund,
                    contract_address,
                ),
                Ok(exec_result) => {
                    self.state.revert_to(snapshot);
                    (
                        false,
                        exec_result.output,
                        Vec::new(),
                        exec_result.revert_reason,
                        exec_result.gas_used,
                        0,
                        None,
                    )
                }
                Err(e) => {
                    self.state.revert_to(snapshot);
                    (false, Bytes::new(), Vec::new(), Some(e.to_string()), tx.gas_limit, 0, None)
                }
            };

        let net_gas = gas_used.saturating_sub(gas_refund);
        let unused_gas = tx.gas_limit.saturating_sub(net_gas);
        let refund_wei = gas_price.saturating_mul(U256::from(unused_gas));
        self.credit_balance(sender, refund_wei).await?;

        let fee = gas_price.saturating_mul(U256::from(net_gas));
        self.credit_balance(block.coinbase, fee).await?;

        if !success {
            debug!(tx_hash = ?tx.hash(), ?revert_reason, "transaction reverted");
        }

        Ok(TransactionReceipt {
            tx_hash: tx.hash(),
            success,
            gas_used: net_gas,
            cumulative_gas_used: cumulative_gas_used.saturating_add(net_gas),
            output,
            logs,
            contract_address: applied_contract_address,
        })
    }

    async fn debit_balance(&self, address: Address, amount: U256) -> Result<(), VmError> {
        let mut account = self
            .state
            .get_account(address)
            .await
            .map_err(VmError::StateError)?
            .unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or(VmError::InsufficientBalance {
                required: amount,
                available: account.balance,
            })?;
        self.state
            .set_account(address, account)
            .await
            .map_err(VmError::StateError)
    }

    async fn credit_balance(&self, address: Address, amount: U256) -> Result<(), VmError> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut account = self
            .state
            .get_account(address)
            .await
            .map_err(VmError::StateError)?
            .unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        account.balance = account.balance.saturating_add(amount);
        self.state
            .set_account(address, account)
            .await
            .map_err(VmError::StateError)
    }
}

#[async_trait]
impl<S: StateAccess + Send + Sync, A: AccessList + Send + Sync> BatchExecutor
    for SmartContractService<S, A>
{
    async fn execute_batch(
        &self,
        transactions: &[SignedTransaction],
        block: &BlockContext,
    ) -> Result<Vec<TransactionReceipt>, VmError> {
        let mut receipts = Vec::with_capacity(transactions.len());
        let mut cumulative_gas_used = 0u64;
        for tx in transactions {
            let receipt = self.apply_transaction(tx, block, cumulative_gas_used).await?;
            cumulative_gas_used = receipt.cumulative_gas_used;
            receipts.push(receipt);
        }
        Ok(receipts)
    }
}

/// Create a default service with in-memory adapters (for testing).
#[must_use]
pub fn create_test_service() -> SmartContractService<InMemoryState, InMemoryAccessList> {
    SmartContractService::new(
        InMemoryState::new(),
        InMemoryAccessList::new(),
        ServiceConfig::default(),
    )
}

#[async_trait]
impl<S: StateAccess + Send + Sync, A: AccessList + Send + Sync> SmartContractApi
    for SmartContractService<S, A>
{
    async fn execute(
        &self,
        context: ExecutionContext,
        code: &[u8],
    ) -> Result<ExecutionResult, VmError> {
        self.execute_code(&context, code).await
    }

    async fn execute_transaction(
        &self,
        tx: &SignedTransaction,
        block: &BlockContext,
    ) -> Result<ExecutionResult, VmError> {
        self.execute_transaction_internal(tx, block).await
    }

    async fn estimate_gas(&self, context: ExecutionContext, code: &[u8]) -> Result<u64, VmError> {
        let mut ctx = context;
        ctx.gas_limit = self.config.vm_config.max_gas_limit();

        let result = self.execute_code(&ctx, code).await?;

        // Add 10% buffer for safety
        let estimated = result.gas_used + (result.gas_used / 10);
        Ok(estimated)
    }

    async fn call(&self, context: ExecutionContext, code: &[u8]) -> Result<Bytes, VmError> {
        let mut ctx = context;
        ctx.is_static = true;

        let result = self.execute_code(&ctx, code).await?;

        if result.success {
            Ok(result.output)
        } else {
            Err(VmError::Revert(
                result
                    .revert_reason
                    .unwrap_or_else(|| "execution reverted".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::BlockContext;
    use crate::domain::value_objects::{Address, Bytes, Hash, U256};

    fn create_test_tx() -> SignedTransaction {
        SignedTransaction {
            from: Address::ZERO,
            to: None,
            value: U256::zero(),
            nonce: 0,
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: 21000,
            data: Bytes::new(),
            hash: Hash::ZERO,
        }
    }

    #[tokio::test]
    async fn test_create_service() {
        let service = create_test_service();
        service.state.set_balance(Address::ZERO, U256::from(10_000_000_000_000u64));
        let tx = create_test_tx();
        let block = BlockContext::default();

        let receipts = service.execute_batch(&[tx], &block).await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert!(receipts[0].success);
    }

    #[tokio::test]
    async fn transaction_with_wrong_nonce_is_rejected() {
        let service = create_test_service();
        service.state.set_balance(Address::ZERO, U256::from(10_000_000_000_000u64));
        let mut tx = create_test_tx();
        tx.nonce = 5;
        let block = BlockContext::default();

        let err = service.apply_transaction(&tx, &block, 0).await.unwrap_err();
        assert!(matches!(err, VmError::NonceMismatch { .. }));
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_transaction() {
        let service = create_test_service();
        let tx = create_test_tx();
        let block = BlockContext::default();

        let err = service.apply_transaction(&tx, &block, 0).await.unwrap_err();
        assert!(matches!(err, VmError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn batch_accumulates_cumulative_gas_used() {
        let service = create_test_service();
        service.state.set_balance(Address::ZERO, U256::from(10_000_000_000_000u64));
        let tx1 = create_test_tx();
        let mut tx2 = create_test_tx();
        tx2.nonce = 1;
        let block = BlockContext::default();

        let receipts = service.execute_batch(&[tx1, tx2], &block).await.unwrap();
        assert_eq!(receipts.len(), 2);
        assert!(receipts[1].cumulative_gas_used >= receipts[0].cumulative_gas_used);
    }
}
