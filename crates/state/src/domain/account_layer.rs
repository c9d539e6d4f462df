//! # Account state layer (spec S4.D)
//!
//! A layered write-through cache in front of the Patricia Merkle Trie:
//!
//! 1. `storage_cache`: `address -> slot_key -> {current, initial}`
//! 2. `accounts_cache`: `address -> {clean|dirty, account, code}`
//! 3. the persistent trie (`PatriciaMerkleTrie`) itself.
//!
//! `commit()` only writes dirty entries back to the trie — this is the
//! "open question" the spec resolves explicitly: marking everything dirty
//! is still correct but writes far more trie nodes than necessary.
//!
//! Snapshots are cheap `usize` tokens into an append-only journal of inverse
//! operations; `revert_to` replays the journal backwards from `len()` down
//! to the token, `commit` simply drops the journal (nothing to undo).

use super::{AccountState, Address, Hash, StateError, StorageKey, StorageValue};
use crate::domain::trie::PatriciaMerkleTrie;
use primitive_types::U256;
use std::collections::HashMap;

/// Clean/dirty marker the spec fixes on cache entries so that `commit()`
/// can skip clean entries and avoid writing redundant trie nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dirty {
    Clean,
    Dirty,
}

#[derive(Clone, Debug)]
struct AccountEntry {
    account: AccountState,
    state: Dirty,
    code: Option<Vec<u8>>,
    code_dirty: Dirty,
}

#[derive(Clone, Debug)]
struct SlotEntry {
    /// Value as of the start of the current transaction (drives EIP-1283/2200).
    initial: Option<StorageValue>,
    /// Current value; `None` represents deletion (a zero value is absent).
    current: Option<StorageValue>,
    dirty: Dirty,
}

/// One entry in the undo journal, recorded before a mutation is applied.
enum JournalEntry {
    Account {
        address: Address,
        prior: Option<AccountEntry>,
    },
    Storage {
        address: Address,
        key: StorageKey,
        prior: Option<SlotEntry>,
    },
    SelfDestruct {
        address: Address,
    },
}

/// Opaque snapshot token: a journal length. `revert_to` undoes every entry
/// appended since the token was taken, in reverse (LIFO) order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot(usize);

/// The account state layer: §4.D's three-level cache over the trie.
pub struct AccountLayer {
    trie: PatriciaMerkleTrie,
    accounts_cache: HashMap<Address, AccountEntry>,
    storage_cache: HashMap<(Address, StorageKey), SlotEntry>,
    self_destructed: Vec<Address>,
    journal: Vec<JournalEntry>,
}

impl AccountLayer {
    /// Wrap an existing trie (e.g. loaded from the backing store).
    pub fn new(trie: PatriciaMerkleTrie) -> Self {
        Self {
            trie,
            accounts_cache: HashMap::new(),
            storage_cache: HashMap::new(),
            self_destructed: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Current state root of the underlying (committed) trie. Uncommitted
    /// cache mutations are not reflected until `commit()` is called.
    pub fn root_hash(&self) -> Hash {
        self.trie.root_hash()
    }

    fn load_account(&mut self, address: Address) -> Result<AccountEntry, StateError> {
        if let Some(entry) = self.accounts_cache.get(&address) {
            return Ok(entry.clone());
        }
        let account = self.trie.get_account(address)?.unwrap_or_default();
        Ok(AccountEntry {
            account,
            state: Dirty::Clean,
            code: None,
            code_dirty: Dirty::Clean,
        })
    }

    /// Read account state (balance, nonce, code_hash, storage_root).
    pub fn account(&mut self, address: Address) -> Result<AccountState, StateError> {
        let entry = self.load_account(address)?;
        self.accounts_cache.entry(address).or_insert(entry.clone());
        Ok(entry.account)
    }

    /// Read contract code. Returns empty bytes for EOAs or unknown code.
    pub fn code(&mut self, address: Address) -> Result<Vec<u8>, StateError> {
        let entry = self.load_account(address)?;
        Ok(entry.code.clone().unwrap_or_default())
    }

    /// Read the current (this-transaction) value of a storage slot.
    /// Absence represents a zero value per spec S3.
    pub fn storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<Option<StorageValue>, StateError> {
        if let Some(slot) = self.storage_cache.get(&(address, key)) {
            return Ok(slot.current);
        }
        let value = self.trie.get_storage(address, key)?;
        self.storage_cache.insert(
            (address, key),
            SlotEntry {
                initial: value,
                current: value,
                dirty: Dirty::Clean,
            },
        );
        Ok(value)
    }

    /// Read the value of a storage slot as of the start of the current
    /// transaction. First read of a slot within a tx populates `initial`;
    /// this drives EIP-1283/2200 net-metered refunds.
    pub fn initial_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<Option<StorageValue>, StateError> {
        if let Some(slot) = self.storage_cache.get(&(address, key)) {
            return Ok(slot.initial);
        }
        // Populate the cache (and thus `initial`) via a normal read.
        self.storage(address, key)?;
        Ok(self.storage_cache[&(address, key)].initial)
    }

    /// Overwrite an account record wholesale (used by CREATE/contract
    /// deployment and by the validator when applying a receipt).
    pub fn put_account(&mut self, address: Address, account: AccountState) -> Result<(), StateError> {
        let prior = self.accounts_cache.get(&address).cloned();
        self.journal.push(JournalEntry::Account { address, prior });
        let mut entry = self.load_account(address)?;
        entry.account = account;
        entry.state = Dirty::Dirty;
        self.accounts_cache.insert(address, entry);
        Ok(())
    }

    /// Deploy contract code, updating `code_hash` to `Keccak(code)`.
    pub fn put_code(&mut self, address: Address, code: Vec<u8>) -> Result<(), StateError> {
        use sha3::{Digest, Keccak256};
        let prior = self.accounts_cache.get(&address).cloned();
        self.journal.push(JournalEntry::Account { address, prior });
        let mut entry = self.load_account(address)?;
        let hash: [u8; 32] = Keccak256::digest(&code).into();
        entry.account.code_hash = hash;
        entry.code = Some(code);
        entry.state = Dirty::Dirty;
        entry.code_dirty = Dirty::Dirty;
        self.accounts_cache.insert(address, entry);
        Ok(())
    }

    /// Write a storage slot (non-zero value).
    pub fn put_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        self.storage(address, key)?; // ensure `initial` is populated
        let prior = self.storage_cache.get(&(address, key)).cloned();
        self.journal.push(JournalEntry::Storage { address, key, prior });
        let slot = self.storage_cache.get_mut(&(address, key)).unwrap();
        slot.current = Some(value);
        slot.dirty = Dirty::Dirty;
        Ok(())
    }

    /// Clear a storage slot (zero value is represented by absence).
    pub fn remove_storage(&mut self, address: Address, key: StorageKey) -> Result<(), StateError> {
        self.storage(address, key)?;
        let prior = self.storage_cache.get(&(address, key)).cloned();
        self.journal.push(JournalEntry::Storage { address, key, prior });
        let slot = self.storage_cache.get_mut(&(address, key)).unwrap();
        slot.current = None;
        slot.dirty = Dirty::Dirty;
        Ok(())
    }

    /// Move `value` wei from `from` to `to`. Fails with `InsufficientBalance`
    /// without mutating either account if `from` cannot afford it.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), StateError> {
        if value.is_zero() {
            return Ok(());
        }
        let from_account = self.account(from)?;
        if from_account.balance < value {
            return Err(StateError::InsufficientBalance {
                required: value,
                available: from_account.balance,
            });
        }
        let mut updated_from = from_account;
        updated_from.balance -= value;
        self.put_account(from, updated_from)?;

        let to_account = self.account(to)?;
        let mut updated_to = to_account;
        updated_to.balance = updated_to.balance.saturating_add(value);
        self.put_account(to, updated_to)?;
        Ok(())
    }

    /// Increment an account's nonce. Fails with `NonceOverflow` at 2^64-1.
    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let mut account = self.account(address)?;
        account.nonce = account
            .nonce
            .checked_add(1)
            .ok_or(StateError::NonceOverflow { address })?;
        self.put_account(address, account)
    }

    /// Mark `address` for destruction at the end of the transaction, moving
    /// its balance to `beneficiary`. The account itself is zeroed on commit.
    pub fn self_destruct(&mut self, address: Address, beneficiary: Address) -> Result<(), StateError> {
        let account = self.account(address)?;
        if !account.balance.is_zero() && address != beneficiary {
            self.transfer(address, beneficiary, account.balance)?;
        }
        self.journal.push(JournalEntry::SelfDestruct { address });
        self.self_destructed.push(address);
        self.put_account(address, AccountState::default())
    }

    /// Take a cheap, LIFO-revertible snapshot token.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    /// Discard every cache mutation recorded since `snapshot` was taken.
    pub fn revert_to(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            match self.journal.pop().unwrap() {
                JournalEntry::Account { address, prior } => match prior {
                    Some(entry) => {
                        self.accounts_cache.insert(address, entry);
                    }
                    None => {
                        self.accounts_cache.remove(&address);
                    }
                },
                JournalEntry::Storage { address, key, prior } => match prior {
                    Some(slot) => {
                        self.storage_cache.insert((address, key), slot);
                    }
                    None => {
                        self.storage_cache.remove(&(address, key));
                    }
                },
                JournalEntry::SelfDestruct { address } => {
                    if let Some(pos) = self.self_destructed.iter().rposition(|a| *a == address) {
                        self.self_destructed.remove(pos);
                    }
                }
            }
        }
    }

    /// Flush dirty cache entries to the trie in two phases: storage first
    /// (producing new per-account `storage_root`s), then accounts. Clean
    /// entries are skipped so unrelated reads don't churn trie nodes.
    pub fn commit(&mut self) -> Result<Hash, StateError> {
        // Phase 1: storage, grouped by address so storage_root is computed once.
        let mut touched_contracts: Vec<Address> = Vec::new();
        for ((address, key), slot) in self.storage_cache.iter_mut() {
            if slot.dirty == Dirty::Clean {
                continue;
            }
            match slot.current {
                Some(value) => self.trie.set_storage(*address, *key, value)?,
                None => self.trie.delete_storage(*address, *key)?,
            }
            slot.dirty = Dirty::Clean;
            slot.initial = slot.current;
            if !touched_contracts.contains(address) {
                touched_contracts.push(*address);
            }
        }

        // Phase 2: accounts. Self-destructed accounts are fully cleared.
        for address in self.self_destructed.drain(..) {
            self.trie.insert_account(address, &AccountState::default())?;
            self.accounts_cache.remove(&address);
        }

        for (address, entry) in self.accounts_cache.iter_mut() {
            if entry.state == Dirty::Clean && entry.code_dirty == Dirty::Clean {
                continue;
            }
            // Pull the freshly-committed storage_root for any contract
            // whose storage changed this commit.
            let mut account = entry.account;
            if touched_contracts.contains(address) {
                if let Some(trie_account) = self.trie.get_account(*address)? {
                    account.storage_root = trie_account.storage_root;
                }
            }
            self.trie.insert_account(*address, &account)?;
            entry.account = account;
            entry.state = Dirty::Clean;
            entry.code_dirty = Dirty::Clean;
        }

        self.journal.clear();
        Ok(self.trie.root_hash())
    }
}
