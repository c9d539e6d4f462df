//! # Driven ports (outbound)
//!
//! Interfaces that contract execution depends on but does not implement
//! itself: state access and signature verification. Adapters implement
//! these traits; dependencies point inward from the adapter toward this
//! crate's domain.

use crate::domain::entities::AccountState;
use crate::domain::value_objects::{
    Address, Bytes, EcdsaSignature, Hash, StorageKey, StorageValue, U256,
};
use crate::errors::StateError;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// STATE ACCESS
// =============================================================================

/// Interface for accessing blockchain state.
#[async_trait]
pub trait StateAccess: Send + Sync {
    /// Get account state.
    ///
    /// # Arguments
    ///
    /// * `address` - Account address to query
    ///
    /// # Returns
    ///
    /// * `Some(AccountState)` - If account exists
    /// * `None` - If account does not exist (never interacted with)
    async fn get_account(&self, address: Address) -> Result<Option<AccountState>, StateError>;

    /// Get storage value.
    ///
    /// # Arguments
    ///
    /// * `address` - Contract address
    /// * `key` - Storage slot key
    ///
    /// # Returns
    ///
    /// * `StorageValue` - Value at slot (zero if never written)
    async fn get_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError>;

    /// Set storage value.
    ///
    /// Note: This queues the write. Actual application happens on commit.
    ///
    /// # Arguments
    ///
    /// * `address` - Contract address
    /// * `key` - Storage slot key
    /// * `value` - New value to store
    async fn set_storage(
        &self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError>;

    /// Get contract code.
    ///
    /// # Arguments
    ///
    /// * `address` - Contract address
    ///
    /// # Returns
    ///
    /// * `Bytes` - Contract bytecode (empty for EOA)
    async fn get_code(&self, address: Address) -> Result<Bytes, StateError>;

    /// Check if account exists.
    ///
    /// An account exists if it has non-zero balance, non-zero nonce,
    /// or non-empty code.
    async fn account_exists(&self, address: Address) -> Result<bool, StateError>;

    /// Get account balance.
    ///
    /// Convenience method that extracts balance from account state.
    async fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        match self.get_account(address).await? {
            Some(account) => Ok(account.balance),
            None => Ok(U256::zero()),
        }
    }

    /// Get account nonce.
    ///
    /// Convenience method that extracts nonce from account state.
    async fn get_nonce(&self, address: Address) -> Result<u64, StateError> {
        match self.get_account(address).await? {
            Some(account) => Ok(account.nonce),
            None => Ok(0),
        }
    }

    /// Get code hash for an address.
    ///
    /// Returns the keccak256 hash of the code, or the empty code hash for EOAs.
    async fn get_code_hash(&self, address: Address) -> Result<Hash, StateError> {
        match self.get_account(address).await? {
            Some(account) => Ok(account.code_hash),
            None => Ok(AccountState::EMPTY_CODE_HASH),
        }
    }

    /// Get code size.
    async fn get_code_size(&self, address: Address) -> Result<usize, StateError> {
        let code = self.get_code(address).await?;
        Ok(code.len())
    }

    /// Overwrite an account record wholesale.
    ///
    /// Used by CREATE (new contract account) and by balance/nonce mutations
    /// that can't be expressed through the convenience methods below.
    async fn set_account(&self, address: Address, account: AccountState) -> Result<(), StateError>;

    /// Deposit `code` at `address`, updating its `code_hash` to
    /// `Keccak(code)`. Used by CREATE/CREATE2 once init code returns
    /// successfully.
    async fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Get the value of a storage slot as of the start of the current
    /// transaction (pre-transaction value), used by SSTORE's EIP-1283/2200
    /// net-metered gas and refund calculation. Defaults to the current
    /// value for adapters that don't track per-transaction history.
    async fn get_initial_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        self.get_storage(address, key).await
    }

    /// Move `value` wei from `from` to `to`.
    ///
    /// Returns `InsufficientBalance` without mutating either account if
    /// `from` cannot afford it.
    async fn transfer(&self, from: Address, to: Address, value: U256) -> Result<(), StateError> {
        if value.is_zero() {
            return Ok(());
        }
        let from_account = self
            .get_account(from)
            .await?
            .ok_or(StateError::NotFound(from))?;
        if from_account.balance < value {
            return Err(StateError::InsufficientBalance {
                required: value,
                available: from_account.balance,
            });
        }
        let mut updated_from = from_account;
        updated_from.balance -= value;
        self.set_account(from, updated_from).await?;

        let mut updated_to = self
            .get_account(to)
            .await?
            .unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        updated_to.balance = updated_to.balance.saturating_add(value);
        self.set_account(to, updated_to).await
    }

    /// Increment an account's nonce. Fails with `NonceOverflow` at 2^64-1.
    async fn increment_nonce(&self, address: Address) -> Result<(), StateError> {
        let mut account = self
            .get_account(address)
            .await?
            .unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        account.nonce = account
            .nonce
            .checked_add(1)
            .ok_or(StateError::NonceOverflow(address))?;
        self.set_account(address, account).await
    }

    /// Destroy `address`, moving its balance to `beneficiary`.
    async fn self_destruct(&self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        let account = self
            .get_account(address)
            .await?
            .unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        if !account.balance.is_zero() && address != beneficiary {
            self.transfer(address, beneficiary, account.balance).await?;
        }
        self.set_account(address, AccountState::new_eoa(U256::zero(), 0))
            .await
    }

    /// Take a snapshot token. Every mutation after this call can be undone
    /// with a matching `revert_to`, down to transaction granularity.
    fn snapshot(&self) -> usize {
        0
    }

    /// Discard every mutation recorded since `snapshot` was taken.
    ///
    /// Adapters that don't support journaled rollback (e.g. a
    /// fully-committed backing store used only for read-only simulation)
    /// may leave this a no-op, but any adapter backing live CALL/CREATE
    /// frame execution must implement real undo.
    fn revert_to(&self, _snapshot: usize) {}

    /// Flush any buffered mutations to the backing trie and return the new
    /// state root. Adapters with no deferred-write buffering may return the
    /// current root unchanged.
    async fn commit(&self) -> Result<Hash, StateError> {
        Ok(Hash::ZERO)
    }
}

/// Lets an `Arc<T>` stand in for `T` as a `StateAccess` backend, so the same
/// underlying store can be shared between a `SmartContractService` and
/// whatever else (a sync loop's checkpointing, an RPC read path) needs a
/// handle to it.
#[async_trait]
impl<T: StateAccess> StateAccess for Arc<T> {
    async fn get_account(&self, address: Address) -> Result<Option<AccountState>, StateError> {
        (**self).get_account(address).await
    }

    async fn get_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        (**self).get_storage(address, key).await
    }

    async fn set_storage(
        &self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        (**self).set_storage(address, key, value).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        (**self).get_code(address).await
    }

    async fn account_exists(&self, address: Address) -> Result<bool, StateError> {
        (**self).account_exists(address).await
    }

    async fn set_account(&self, address: Address, account: AccountState) -> Result<(), StateError> {
        (**self).set_account(address, account).await
    }

    async fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        (**self).set_code(address, code).await
    }

    async fn get_initial_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        (**self).get_initial_storage(address, key).await
    }

    async fn transfer(&self, from: Address, to: Address, value: U256) -> Result<(), StateError> {
        (**self).transfer(from, to, value).await
    }

    async fn increment_nonce(&self, address: Address) -> Result<(), StateError> {
        (**self).increment_nonce(address).await
    }

    async fn self_destruct(&self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        (**self).self_destruct(address, beneficiary).await
    }

    fn snapshot(&self) -> usize {
        (**self).snapshot()
    }

    fn revert_to(&self, snapshot: usize) {
        (**self).revert_to(snapshot);
    }

    async fn commit(&self) -> Result<Hash, StateError> {
        (**self).commit().await
    }
}

// =============================================================================
// SIGNATURE VERIFIER (ecrecover precompile)
// =============================================================================

/// Interface for ECDSA signature verification.
pub trait SignatureVerifier: Send + Sync {
    /// Recover signer address from ECDSA signature.
    ///
    /// This is used by the ecrecover precompile.
    ///
    /// # Arguments
    ///
    /// * `hash` - 32-byte message hash
    /// * `signature` - ECDSA signature (r, s, v)
    ///
    /// # Returns
    ///
    /// * `Some(Address)` - Recovered signer address
    /// * `None` - If signature is invalid
    fn ecrecover(&self, hash: &Hash, signature: &EcdsaSignature) -> Option<Address>;
}

// =============================================================================
// BLOCK HASH ORACLE (For BLOCKHASH opcode)
// =============================================================================

/// Interface for querying historical block hashes.
///
/// Used by the BLOCKHASH opcode which can access the last 256 block hashes.
#[async_trait]
pub trait BlockHashOracle: Send + Sync {
    /// Get block hash for a given block number.
    ///
    /// # Arguments
    ///
    /// * `number` - Block number to query
    /// * `current_number` - Current block number (for range validation)
    ///
    /// # Returns
    ///
    /// * `Some(Hash)` - Block hash if within valid range (last 256 blocks)
    /// * `None` - If block is too old or doesn't exist
    async fn get_block_hash(&self, number: u64, current_number: u64) -> Option<Hash>;
}

// =============================================================================
// ACCESS LIST (EIP-2929/2930)
// =============================================================================

/// Access status for storage/accounts (EIP-2929).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessStatus {
    /// First access in this transaction (cold).
    Cold,
    /// Already accessed in this transaction (warm).
    Warm,
}

/// Interface for tracking warm/cold access status.
///
/// Per EIP-2929, first access to an account or storage slot costs more gas.
pub trait AccessList: Send + Sync {
    /// Check and mark account as accessed.
    ///
    /// Returns the previous access status.
    fn touch_account(&mut self, address: Address) -> AccessStatus;

    /// Check and mark storage slot as accessed.
    ///
    /// Returns the previous access status.
    fn touch_storage(&mut self, address: Address, key: StorageKey) -> AccessStatus;

    /// Check if account is warm.
    fn is_account_warm(&self, address: Address) -> bool;

    /// Check if storage slot is warm.
    fn is_storage_warm(&self, address: Address, key: StorageKey) -> bool;

    /// Pre-warm an account (make it warm without returning status).
    fn warm_account(&mut self, address: Address) {
        let _ = self.touch_account(address);
    }

    /// Pre-warm a storage slot (make it warm without returning status).
    fn warm_storage(&mut self, address: Address, key: StorageKey) {
        let _ = self.touch_storage(address, key);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_status() {
        assert_eq!(AccessStatus::Cold, AccessStatus::Cold);
        assert_ne!(AccessStatus::Cold, AccessStatus::Warm);
    }

    // Mock implementation for testing
    struct MockStateAccess;

    #[async_trait]
    impl StateAccess for MockStateAccess {
        async fn get_account(&self, _address: Address) -> Result<Option<AccountState>, StateError> {
            Ok(Some(AccountState::new_eoa(U256::from(1000), 5)))
        }

        async fn get_storage(
            &self,
            _address: Address,
            _key: StorageKey,
        ) -> Result<StorageValue, StateError> {
            Ok(StorageValue::ZERO)
        }

        async fn set_storage(
            &self,
            _address: Address,
            _key: StorageKey,
            _value: StorageValue,
        ) -> Result<(), StateError> {
            Ok(())
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, StateError> {
            Ok(Bytes::new())
        }

        async fn account_exists(&self, _address: Address) -> Result<bool, StateError> {
            Ok(true)
        }

        async fn set_account(
            &self,
            _address: Address,
            _account: AccountState,
        ) -> Result<(), StateError> {
            Ok(())
        }

        async fn set_code(&self, _address: Address, _code: Bytes) -> Result<(), StateError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mock_state_access() {
        let state = MockStateAccess;
        let addr = Address::new([1u8; 20]);

        let balance = state.get_balance(addr).await.unwrap();
        assert_eq!(balance, U256::from(1000));

        let nonce = state.get_nonce(addr).await.unwrap();
        assert_eq!(nonce, 5);
    }
}
