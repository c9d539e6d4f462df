//! State adapter backed by the account state layer (Component D), wired in
//! as the interpreter's real execution state instead of the in-memory test
//! double. `AccountLayer`'s own methods take `&mut self` and are
//! synchronous; `StateAccess` requires `&self` so that CALL/CREATE frames
//! can share one reference across nested `Interpreter`s, so this adapter
//! wraps it behind a mutex. `AccountLayer::Snapshot`'s inner index is
//! private to its crate, so snapshots are tracked here as a stack and
//! handed out as plain indices into it.

use crate::domain::entities::AccountState;
use crate::domain::value_objects::{Address, Bytes, Hash, StorageKey, StorageValue, U256};
use crate::errors::StateError;
use crate::ports::outbound::StateAccess;
use async_trait::async_trait;
use state::{AccountLayer, PatriciaMerkleTrie, Snapshot as LayerSnapshot};
use std::sync::Mutex;

fn map_err(err: state::StateError) -> StateError {
    match err {
        state::StateError::AccountNotFound { address } => StateError::NotFound(Address::new(address)),
        state::StateError::InsufficientBalance { required, available } => {
            StateError::InsufficientBalance { required, available }
        }
        state::StateError::NonceOverflow { address } => StateError::NonceOverflow(Address::new(address)),
        state::StateError::Corrupt { .. } => StateError::Corrupted,
        other => StateError::Other(other.to_string()),
    }
}

fn to_account(account: state::AccountState) -> AccountState {
    AccountState {
        balance: account.balance,
        nonce: account.nonce,
        code_hash: Hash::new(account.code_hash),
        storage_root: Hash::new(account.storage_root),
    }
}

fn from_account(account: AccountState) -> state::AccountState {
    state::AccountState {
        balance: account.balance,
        nonce: account.nonce,
        code_hash: *account.code_hash.as_bytes(),
        storage_root: *account.storage_root.as_bytes(),
    }
}

/// Execution-time state backend: `AccountLayer`'s three-level cache over a
/// `PatriciaMerkleTrie`, exposed through `StateAccess` for the interpreter.
pub struct TrieBackedState {
    layer: Mutex<AccountLayer>,
    snapshots: Mutex<Vec<LayerSnapshot>>,
}

impl TrieBackedState {
    /// Build a fresh, empty state (genesis trie, no accounts).
    #[must_use]
    pub fn new() -> Self {
        Self::from_trie(PatriciaMerkleTrie::new())
    }

    /// Wrap an existing trie (e.g. one loaded from the backing store by the
    /// sync loop).
    #[must_use]
    pub fn from_trie(trie: PatriciaMerkleTrie) -> Self {
        Self {
            layer: Mutex::new(AccountLayer::new(trie)),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    /// Current trie root. Reflects only committed mutations.
    #[must_use]
    pub fn root_hash(&self) -> Hash {
        Hash::new(self.layer.lock().unwrap().root_hash())
    }
}

impl Default for TrieBackedState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateAccess for TrieBackedState {
    async fn get_account(&self, address: Address) -> Result<Option<AccountState>, StateError> {
        let account = self
            .layer
            .lock()
            .unwrap()
            .account(*address.as_bytes())
            .map_err(map_err)?;
        Ok(Some(to_account(account)))
    }

    async fn get_storage(&self, address: Address, key: StorageKey) -> Result<StorageValue, StateError> {
        let value = self
            .layer
            .lock()
            .unwrap()
            .storage(*address.as_bytes(), *key.as_bytes())
            .map_err(map_err)?;
        Ok(StorageValue::new(value.unwrap_or([0u8; 32])))
    }

    async fn set_storage(
        &self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        let mut layer = self.layer.lock().unwrap();
        if value.to_u256().is_zero() {
            layer
                .remove_storage(*address.as_bytes(), *key.as_bytes())
                .map_err(map_err)
        } else {
            layer
                .put_storage(*address.as_bytes(), *key.as_bytes(), *value.as_bytes())
                .map_err(map_err)
        }
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        let code = self
            .layer
            .lock()
            .unwrap()
            .code(*address.as_bytes())
            .map_err(map_err)?;
        Ok(Bytes::from_vec(code))
    }

    async fn account_exists(&self, address: Address) -> Result<bool, StateError> {
        let account = self
            .layer
            .lock()
            .unwrap()
            .account(*address.as_bytes())
            .map_err(map_err)?;
        Ok(!to_account(account).is_empty())
    }

    async fn set_account(&self, address: Address, account: AccountState) -> Result<(), StateError> {
        self.layer
            .lock()
            .unwrap()
            .put_account(*address.as_bytes(), from_account(account))
            .map_err(map_err)
    }

    async fn set_code(&self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.layer
            .lock()
            .unwrap()
            .put_code(*address.as_bytes(), code.into_vec())
            .map_err(map_err)
    }

    async fn get_initial_storage(&self, address: Address, key: StorageKey) -> Result<StorageValue, StateError> {
        let value = self
            .layer
            .lock()
            .unwrap()
            .initial_storage(*address.as_bytes(), *key.as_bytes())
            .map_err(map_err)?;
        Ok(StorageValue::new(value.unwrap_or([0u8; 32])))
    }

    async fn transfer(&self, from: Address, to: Address, value: U256) -> Result<(), StateError> {
        self.layer
            .lock()
            .unwrap()
            .transfer(*from.as_bytes(), *to.as_bytes(), value)
            .map_err(map_err)
    }

    async fn increment_nonce(&self, address: Address) -> Result<(), StateError> {
        self.layer
            .lock()
            .unwrap()
            .increment_nonce(*address.as_bytes())
            .map_err(map_err)
    }

    async fn self_destruct(&self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        self.layer
            .lock()
            .unwrap()
            .self_destruct(*address.as_bytes(), *beneficiary.as_bytes())
            .map_err(map_err)
    }

    fn snapshot(&self) -> usize {
        let token = self.layer.lock().unwrap().snapshot();
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.push(token);
        snapshots.len() - 1
    }

    fn revert_to(&self, snapshot: usize) {
        let mut snapshots = self.snapshots.lock().unwrap();
        let Some(token) = snapshots.get(snapshot).copied() else {
            return;
        };
        self.layer.lock().unwrap().revert_to(token);
        snapshots.truncate(snapshot);
    }

    async fn commit(&self) -> Result<Hash, StateError> {
        let root = self.layer.lock().unwrap().commit().map_err(map_err)?;
        self.snapshots.lock().unwrap().clear();
        Ok(Hash::new(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deposits_code_and_reads_it_back() {
        let state = TrieBackedState::new();
        let addr = Address::new([0x11; 20]);
        let code = Bytes::from_slice(&[0x60, 0x00, 0x60, 0x00, 0xf3]);

        state.set_code(addr, code.clone()).await.unwrap();
        let read = state.get_code(addr).await.unwrap();
        assert_eq!(read.as_slice(), code.as_slice());
    }

    #[tokio::test]
    async fn snapshot_revert_undoes_a_transfer() {
        let state = TrieBackedState::new();
        let alice = Address::new([0x01; 20]);
        let bob = Address::new([0x02; 20]);
        state
            .set_account(alice, AccountState::new_eoa(U256::from(100), 0))
            .await
            .unwrap();

        let snap = state.snapshot();
        state.transfer(alice, bob, U256::from(40)).await.unwrap();
        assert_eq!(state.get_balance(bob).await.unwrap(), U256::from(40));

        state.revert_to(snap);
        assert_eq!(state.get_balance(bob).await.unwrap(), U256::zero());
        assert_eq!(state.get_balance(alice).await.unwrap(), U256::from(100));
    }

    #[tokio::test]
    async fn commit_persists_storage_across_a_fresh_snapshot_stack() {
        let state = TrieBackedState::new();
        let addr = Address::new([0x03; 20]);
        let key = StorageKey::new([0u8; 32]);
        state
            .set_storage(addr, key, StorageValue::from_u256(U256::from(7)))
            .await
            .unwrap();

        state.commit().await.unwrap();

        let value = state.get_storage(addr, key).await.unwrap();
        assert_eq!(value.to_u256(), U256::from(7));
    }
}
