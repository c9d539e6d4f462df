//! # State Adapter
//!
//! In-memory state access implementation used by the interpreter's own unit
//! tests and `create_test_service`. Real execution runs against
//! `TrieBackedState` (see `account_layer_adapter.rs`), which shares its store
//! with the committed state trie; this adapter never talks to it.

use crate::domain::entities::AccountState;
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::errors::StateError;
use crate::ports::outbound::StateAccess;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// One entry in the undo journal, recorded before a mutation is applied.
#[derive(Debug)]
enum JournalEntry {
    Account {
        address: Address,
        prior: Option<AccountState>,
    },
    Storage {
        key: (Address, StorageKey),
        prior: Option<StorageValue>,
    },
    Code {
        address: Address,
        prior: Option<Bytes>,
    },
}

/// In-memory state for testing, with journaled snapshot/revert support so
/// it can stand in for a real trie-backed adapter during CALL/CREATE frame
/// execution.
#[derive(Debug, Default)]
pub struct InMemoryState {
    /// Account states.
    accounts: RwLock<HashMap<Address, AccountState>>,
    /// Contract code.
    code: RwLock<HashMap<Address, Bytes>>,
    /// Storage.
    storage: RwLock<HashMap<(Address, StorageKey), StorageValue>>,
    /// Undo journal; `snapshot()` returns its length, `revert_to` replays
    /// backwards from the current length down to the token.
    journal: RwLock<Vec<JournalEntry>>,
}

impl InMemoryState {
    /// Create a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set account state.
    pub fn set_account(&self, address: Address, state: AccountState) {
        self.accounts.write().unwrap().insert(address, state);
    }

    /// Set balance for an address.
    pub fn set_balance(&self, address: Address, balance: U256) {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(address)
            .or_insert_with(|| AccountState::new_eoa(U256::zero(), 0));
        account.balance = balance;
    }

    /// Set code for a contract.
    pub fn set_code(&self, address: Address, code: Bytes) {
        // Update code hash
        let code_hash = if code.is_empty() {
            AccountState::EMPTY_CODE_HASH
        } else {
            crate::domain::services::keccak256(code.as_slice())
        };

        // Update account
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(address)
            .or_insert_with(|| AccountState::new_eoa(U256::zero(), 0));
        account.code_hash = code_hash;

        // Store code
        self.code.write().unwrap().insert(address, code);
    }

    /// Set storage value.
    pub fn set_storage_value(&self, address: Address, key: StorageKey, value: StorageValue) {
        self.storage.write().unwrap().insert((address, key), value);
    }
}

#[async_trait]
impl StateAccess for InMemoryState {
    async fn get_account(&self, address: Address) -> Result<Option<AccountState>, StateError> {
        Ok(self.accounts.read().unwrap().get(&address).cloned())
    }

    async fn get_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        Ok(self
            .storage
            .read()
            .unwrap()
            .get(&(address, key))
            .copied()
            .unwrap_or(StorageValue::ZERO))
    }

    async fn set_storage(
        &self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        let slot_key = (address, key);
        let prior = self.storage.read().unwrap().get(&slot_key).copied();
        self.journal
            .write()
            .unwrap()
            .push(JournalEntry::Storage { key: slot_key, prior });
        self.storage.write().unwrap().insert(slot_key, value);
        Ok(())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        Ok(self
            .code
            .read()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn account_exists(&self, address: Address) -> Result<bool, StateError> {
        Ok(self.accounts.read().unwrap().contains_key(&address))
    }

    async fn set_account(&self, address: Address, account: AccountState) -> Result<(), StateError> {
        let prior = self.accounts.read().unwrap().get(&address).cloned();
        self.journal
            .write()
            .unwrap()
            .push(JournalEntry::Account { address, prior });
        self.accounts.write().unwrap().insert(address, account);
        Ok(())
    }

    async fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        let code_hash = if code.is_empty() {
            AccountState::EMPTY_CODE_HASH
        } else {
            crate::domain::services::keccak256(code.as_slice())
        };

        let prior_account = self.accounts.read().unwrap().get(&address).cloned();
        self.journal.write().unwrap().push(JournalEntry::Account {
            address,
            prior: prior_account.clone(),
        });
        let mut account = prior_account.unwrap_or_else(|| AccountState::new_eoa(U256::zero(), 0));
        account.code_hash = code_hash;
        self.accounts.write().unwrap().insert(address, account);

        let prior_code = self.code.read().unwrap().get(&address).cloned();
        self.journal
            .write()
            .unwrap()
            .push(JournalEntry::Code { address, prior: prior_code });
        self.code.write().unwrap().insert(address, code);
        Ok(())
    }

    async fn get_initial_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        // No per-transaction history is tracked by this adapter; the
        // current value is returned, matching pre-EIP-1283 semantics.
        self.get_storage(address, key).await
    }

    fn snapshot(&self) -> usize {
        self.journal.read().unwrap().len()
    }

    fn revert_to(&self, snapshot: usize) {
        let mut journal = self.journal.write().unwrap();
        while journal.len() > snapshot {
            match journal.pop().unwrap() {
                JournalEntry::Account { address, prior } => {
                    let mut accounts = self.accounts.write().unwrap();
                    match prior {
                        Some(account) => {
                            accounts.insert(address, account);
                        }
                        None => {
                            accounts.remove(&address);
                        }
                    }
                }
                JournalEntry::Storage { key, prior } => {
                    let mut storage = self.storage.write().unwrap();
                    match prior {
                        Some(value) => {
                            storage.insert(key, value);
                        }
                        None => {
                            storage.remove(&key);
                        }
                    }
                }
                JournalEntry::Code { address, prior } => {
                    let mut code = self.code.write().unwrap();
                    match prior {
                        Some(bytes) => {
                            code.insert(address, bytes);
                        }
                        None => {
                            code.remove(&address);
                        }
                    }
                }
            }
        }
    }

    async fn commit(&self) -> Result<Hash, StateError> {
        self.journal.write().unwrap().clear();
        Ok(Hash::ZERO)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_balance() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);

        // Initially no account
        let account = state.get_account(addr).await.unwrap();
        assert!(account.is_none());

        // Set balance
        state.set_balance(addr, U256::from(1000));

        let balance = state.get_balance(addr).await.unwrap();
        assert_eq!(balance, U256::from(1000));
    }

    #[tokio::test]
    async fn test_get_set_storage() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);
        let key = StorageKey::new([0u8; 32]);

        // Initially zero
        let value = state.get_storage(addr, key).await.unwrap();
        assert!(value.is_zero());

        // Set value
        let new_value = StorageValue::from_u256(U256::from(42));
        state.set_storage(addr, key, new_value).await.unwrap();

        let value = state.get_storage(addr, key).await.unwrap();
        assert_eq!(value.to_u256(), U256::from(42));
    }

    #[tokio::test]
    async fn test_get_set_code() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);
        let code = Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0xF3]); // PUSH0 PUSH0 RETURN

        state.set_code(addr, code.clone());

        let retrieved = state.get_code(addr).await.unwrap();
        assert_eq!(retrieved.as_slice(), code.as_slice());

        // Code hash should be updated
        let account = state.get_account(addr).await.unwrap().unwrap();
        assert_ne!(account.code_hash, AccountState::EMPTY_CODE_HASH);
    }

    #[tokio::test]
    async fn test_account_exists() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);

        assert!(!state.account_exists(addr).await.unwrap());

        state.set_balance(addr, U256::from(1));
        assert!(state.account_exists(addr).await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let state = InMemoryState::new();
        let alice = Address::new([1u8; 20]);
        let bob = Address::new([2u8; 20]);
        state.set_balance(alice, U256::from(100));

        StateAccess::transfer(&state, alice, bob, U256::from(40))
            .await
            .unwrap();

        assert_eq!(state.get_balance(alice).await.unwrap(), U256::from(60));
        assert_eq!(state.get_balance(bob).await.unwrap(), U256::from(40));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_balance() {
        let state = InMemoryState::new();
        let alice = Address::new([1u8; 20]);
        let bob = Address::new([2u8; 20]);
        state.set_balance(alice, U256::from(10));

        let err = StateAccess::transfer(&state, alice, bob, U256::from(11))
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_revert_undoes_mutations() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);
        state.set_balance(addr, U256::from(100));

        let snap = state.snapshot();
        StateAccess::increment_nonce(&state, addr).await.unwrap();
        assert_eq!(state.get_nonce(addr).await.unwrap(), 1);

        state.revert_to(snap);

        assert_eq!(state.get_nonce(addr).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_self_destruct_moves_balance_to_beneficiary() {
        let state = InMemoryState::new();
        let addr = Address::new([1u8; 20]);
        let beneficiary = Address::new([2u8; 20]);
        state.set_balance(addr, U256::from(500));

        StateAccess::self_destruct(&state, addr, beneficiary)
            .await
            .unwrap();

        assert_eq!(state.get_balance(addr).await.unwrap(), U256::zero());
        assert_eq!(
            state.get_balance(beneficiary).await.unwrap(),
            U256::from(500)
        );
    }
}
