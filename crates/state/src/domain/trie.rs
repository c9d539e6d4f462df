//! # Patricia Merkle Trie Implementation
//!
//! A production-grade Modified Merkle Patricia Trie (MPT) implementation
//! per Ethereum Yellow Paper Appendix D.
//!
//! ## Architecture
//!
//! Nodes are content-addressed: each is RLP-encoded, and referenced either
//! by its Keccak256 hash (`nodes: HashMap<Hash, Vec<u8>>`) or, when the
//! encoding is under 32 bytes, inlined directly into its parent (`NodeRef`).
//! The node store is append-only — a `put`/`delete` never removes an
//! existing blob, so any historical root handed back by a prior `put`/
//! `delete` call remains fully walkable afterward.
//!
//! ## Node Types
//!
//! - **Empty**: Represents null/missing data
//! - **Leaf**: Terminal node with remaining path + value
//! - **Extension**: Shared prefix optimization node
//! - **Branch**: 16-way branch + optional value
//!
//! ## Invariants
//!
//! - INVARIANT-1: Balance non-negativity (enforced at AccountState level)
//! - INVARIANT-2: Nonce monotonicity (enforced during apply)
//! - INVARIANT-3: Deterministic root (same inputs = same root)
//! - INVARIANT-4: Historical roots remain retrievable after later writes
//! - INVARIANT-5: Atomic transitions (all-or-nothing)
//!
//! ## References
//!
//! - SPEC-04 Section 2.2: Patricia Merkle Trie Structure
//! - Ethereum Yellow Paper Appendix D

use super::{AccountState, Address, Hash, StateConfig, StateError, StorageKey, StorageValue, EMPTY_TRIE_ROOT};
use primitive_types::U256;
use rlp::{Decodable, Encodable, RlpItem};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;

// =============================================================================
// NIBBLES: Half-byte path representation
// =============================================================================

/// Nibble path for trie traversal.
///
/// Addresses and keys are converted to nibbles (half-bytes, 0-15) for
/// traversal through the trie. A 20-byte address becomes 40 nibbles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nibbles(pub Vec<u8>);

impl Nibbles {
    /// Create nibbles from a 20-byte address.
    pub fn from_address(addr: &Address) -> Self {
        Self::from_bytes(addr)
    }

    /// Create nibbles from a 32-byte storage key.
    pub fn from_key(key: &StorageKey) -> Self {
        Self::from_bytes(key)
    }

    /// Create nibbles from arbitrary bytes (used for hashed keys).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        for byte in bytes {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }
        Nibbles(nibbles)
    }

    /// Get a slice of nibbles starting at offset.
    pub fn slice(&self, start: usize) -> Self {
        Nibbles(self.0[start..].to_vec())
    }

    /// Get a range slice of nibbles.
    pub fn slice_range(&self, start: usize, end: usize) -> Self {
        Nibbles(self.0[start..end].to_vec())
    }

    /// Find common prefix length with another nibbles path.
    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get nibble at index.
    pub fn at(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Encode nibbles with hex-prefix for RLP encoding.
    ///
    /// Per Ethereum Yellow Paper:
    /// - First nibble encodes flags: 0=extension even, 1=extension odd, 2=leaf even, 3=leaf odd
    /// - If odd number of nibbles, first nibble is part of path
    pub fn encode_hex_prefix(&self, is_leaf: bool) -> Vec<u8> {
        let odd = self.len() % 2 == 1;
        let prefix = if is_leaf { 2 } else { 0 } + if odd { 1 } else { 0 };

        let mut result = Vec::with_capacity((self.len() + 2) / 2);

        if odd {
            result.push((prefix << 4) | self.0[0]);
            for chunk in self.0[1..].chunks(2) {
                result.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        } else {
            result.push(prefix << 4);
            for chunk in self.0.chunks(2) {
                result.push((chunk[0] << 4) | chunk.get(1).copied().unwrap_or(0));
            }
        }

        result
    }

    /// Decode hex-prefix encoded bytes back to nibbles.
    pub fn decode_hex_prefix(encoded: &[u8]) -> (Self, bool) {
        if encoded.is_empty() {
            return (Nibbles(vec![]), false);
        }

        let prefix = encoded[0] >> 4;
        let is_leaf = prefix >= 2;
        let odd = prefix % 2 == 1;

        let mut nibbles = Vec::new();

        if odd {
            nibbles.push(encoded[0] & 0x0F);
        }

        for &byte in &encoded[1..] {
            nibbles.push(byte >> 4);
            nibbles.push(byte & 0x0F);
        }

        (Nibbles(nibbles), is_leaf)
    }
}

// =============================================================================
// TRIE NODE: The four node types in MPT
// =============================================================================

/// A reference to a child node: inlined raw RLP if its encoding is under 32
/// bytes, otherwise the Keccak256 hash of that encoding. Per the Yellow
/// Paper's `c()` function — this is what lets child_ref embed small subtrees
/// directly instead of forcing a store round-trip for every node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Hash(Hash),
    Inline(Box<TrieNode>),
}

impl NodeRef {
    fn rlp_item(&self) -> RlpItem {
        match self {
            NodeRef::Hash(h) => RlpItem::Bytes(h.to_vec()),
            NodeRef::Inline(node) => node.rlp_item(),
        }
    }
}

/// Node types in the Patricia Merkle Trie.
///
/// Per Ethereum Yellow Paper Appendix D, there are four node types:
/// - Empty (null reference)
/// - Leaf (remaining path + value)
/// - Extension (shared prefix + single child)
/// - Branch (16 children + optional value)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Empty node (null reference, hash = EMPTY_TRIE_ROOT).
    Empty,

    /// Leaf node: stores remaining key path and the value.
    /// RLP: [hex_prefix_encode(path, true), value]
    Leaf {
        /// Remaining path from current position to this leaf.
        path: Nibbles,
        /// RLP-encoded value (account state or storage value).
        value: Vec<u8>,
    },

    /// Extension node: shared prefix optimization.
    /// RLP: [hex_prefix_encode(path, false), child_ref]
    Extension {
        /// Shared prefix path.
        path: Nibbles,
        /// Reference to the single child (inlined or by hash).
        child: NodeRef,
    },

    /// Branch node: 16-way branch for each nibble value.
    /// RLP: [child_ref[0], ..., child_ref[15], value]
    Branch {
        /// 16 child node references (None = empty).
        children: Box<[Option<NodeRef>; 16]>,
        /// Optional value if a key terminates at this branch.
        value: Option<Vec<u8>>,
    },
}

impl TrieNode {
    /// Build this node's RLP item tree. Children embed their own item tree
    /// when inlined, rather than always resolving to a 32-byte hash string.
    fn rlp_item(&self) -> RlpItem {
        match self {
            TrieNode::Empty => RlpItem::Bytes(vec![]),

            TrieNode::Leaf { path, value } => RlpItem::List(vec![
                RlpItem::Bytes(path.encode_hex_prefix(true)),
                RlpItem::Bytes(value.clone()),
            ]),

            TrieNode::Extension { path, child } => RlpItem::List(vec![
                RlpItem::Bytes(path.encode_hex_prefix(false)),
                child.rlp_item(),
            ]),

            TrieNode::Branch { children, value } => {
                let mut items: Vec<RlpItem> = children
                    .iter()
                    .map(|c| match c {
                        Some(r) => r.rlp_item(),
                        None => RlpItem::Bytes(vec![]),
                    })
                    .collect();
                items.push(match value {
                    Some(v) => RlpItem::Bytes(v.clone()),
                    None => RlpItem::Bytes(vec![]),
                });
                RlpItem::List(items)
            }
        }
    }

    /// RLP-encode this node for hashing.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(&self.rlp_item())
    }

    /// Compute Keccak256 hash of RLP-encoded node.
    ///
    /// This is always a plain hash regardless of encoded size: the Yellow
    /// Paper's `TRIE(J) = KEC(c(J,0))` forces hashing at the top even though
    /// `c()` would otherwise inline a small encoding. Only child references
    /// one level down (see `NodeRef`) apply the size-based inlining rule.
    pub fn hash(&self) -> Hash {
        if matches!(self, TrieNode::Empty) {
            return EMPTY_TRIE_ROOT;
        }
        keccak256(&self.rlp_encode())
    }

    fn decode(bytes: &[u8]) -> Result<TrieNode, StateError> {
        let item = rlp::decode(bytes).map_err(|_| StateError::Corrupt { hash: keccak256(bytes) })?;
        Self::from_item(&item, bytes)
    }

    fn from_item(item: &RlpItem, source: &[u8]) -> Result<TrieNode, StateError> {
        let corrupt = || StateError::Corrupt { hash: keccak256(source) };
        match item {
            RlpItem::Bytes(b) if b.is_empty() => Ok(TrieNode::Empty),
            RlpItem::Bytes(_) => Err(corrupt()),
            RlpItem::List(items) => match items.len() {
                2 => {
                    let path_bytes = items[0].as_bytes().ok_or_else(corrupt)?;
                    let (path, is_leaf) = Nibbles::decode_hex_prefix(path_bytes);
                    if is_leaf {
                        let value = items[1].as_bytes().ok_or_else(corrupt)?.to_vec();
                        Ok(TrieNode::Leaf { path, value })
                    } else {
                        let child = Self::item_to_ref(&items[1], source)?;
                        Ok(TrieNode::Extension { path, child })
                    }
                }
                17 => {
                    let mut children: [Option<NodeRef>; 16] = std::array::from_fn(|_| None);
                    for (i, slot) in children.iter_mut().enumerate() {
                        *slot = match &items[i] {
                            RlpItem::Bytes(b) if b.is_empty() => None,
                            other => Some(Self::item_to_ref(other, source)?),
                        };
                    }
                    let value = match &items[16] {
                        RlpItem::Bytes(b) if b.is_empty() => None,
                        RlpItem::Bytes(b) => Some(b.clone()),
                        RlpItem::List(_) => return Err(corrupt()),
                    };
                    Ok(TrieNode::Branch { children: Box::new(children), value })
                }
                _ => Err(corrupt()),
            },
        }
    }

    fn item_to_ref(item: &RlpItem, source: &[u8]) -> Result<NodeRef, StateError> {
        match item {
            RlpItem::Bytes(b) if b.len() == 32 => {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(b);
                Ok(NodeRef::Hash(hash))
            }
            RlpItem::List(_) => Ok(NodeRef::Inline(Box::new(Self::from_item(item, source)?))),
            _ => Err(StateError::Corrupt { hash: keccak256(source) }),
        }
    }
}

/// Compute Keccak256 hash.
fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// =============================================================================
// PATRICIA MERKLE TRIE
// =============================================================================

/// Patricia Merkle Trie for blockchain state management.
///
/// ## Structure
///
/// - `nodes`: content-addressed store of RLP-encoded node bytes, keyed by
///   Keccak256 hash. Append-only — a `put`/`delete` call leaves every node
///   reachable from a prior root in place, so that root stays walkable.
/// - `root`: the current (most recently written) root hash.
///
/// Each account's storage is its own nested trie, rooted at
/// `AccountState.storage_root`, sharing the same node store.
pub struct PatriciaMerkleTrie {
    /// All trie nodes, by their content hash.
    nodes: HashMap<Hash, Vec<u8>>,
    /// Current root hash.
    root: Hash,
    /// Configuration.
    config: StateConfig,
}

impl PatriciaMerkleTrie {
    /// Create a new empty trie.
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    /// Create a new trie with custom configuration.
    pub fn with_config(config: StateConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            root: EMPTY_TRIE_ROOT,
            config,
        }
    }

    /// Get the current root hash.
    pub fn root_hash(&self) -> Hash {
        self.root
    }

    // =========================================================================
    // GENERIC TRIE CONTRACT: get / put / delete over nibble keys
    // =========================================================================

    /// Look up `key` under `root`. Works against any previously returned
    /// root, not just the current one.
    pub fn get(&self, root: Hash, key: &Nibbles) -> Result<Option<Vec<u8>>, StateError> {
        if root == EMPTY_TRIE_ROOT {
            return Ok(None);
        }
        let node = self.load(root)?;
        self.get_at(&node, key, 0)
    }

    /// Write `key -> value` under `root`, returning the new root. `root`
    /// and every node reachable from it remain retrievable afterward.
    pub fn put(&mut self, root: Hash, key: &Nibbles, value: Vec<u8>) -> Result<Hash, StateError> {
        let node = if root == EMPTY_TRIE_ROOT {
            TrieNode::Empty
        } else {
            self.load(root)?
        };
        let new_node = self.put_at(node, key, 0, value)?;
        Ok(self.store_root(new_node))
    }

    /// Remove `key` under `root`, returning the new root. A no-op (returns
    /// `root` unchanged) if the key is absent.
    pub fn delete(&mut self, root: Hash, key: &Nibbles) -> Result<Hash, StateError> {
        if root == EMPTY_TRIE_ROOT || self.get(root, key)?.is_none() {
            return Ok(root);
        }
        let node = self.load(root)?;
        match self.delete_at(node, key, 0)? {
            Some(new_node) => Ok(self.store_root(new_node)),
            None => Ok(EMPTY_TRIE_ROOT),
        }
    }

    fn load(&self, hash: Hash) -> Result<TrieNode, StateError> {
        let bytes = self.nodes.get(&hash).ok_or(StateError::Corrupt { hash })?;
        TrieNode::decode(bytes)
    }

    fn resolve(&self, r: &NodeRef) -> Result<TrieNode, StateError> {
        match r {
            NodeRef::Inline(node) => Ok((**node).clone()),
            NodeRef::Hash(h) => self.load(*h),
        }
    }

    /// Hash and store a root node unconditionally, regardless of encoded
    /// size — the top level is always hash-addressed (see `TrieNode::hash`).
    fn store_root(&mut self, node: TrieNode) -> Hash {
        if matches!(node, TrieNode::Empty) {
            return EMPTY_TRIE_ROOT;
        }
        let encoded = node.rlp_encode();
        let hash = keccak256(&encoded);
        self.nodes.insert(hash, encoded);
        hash
    }

    /// Turn a freshly built child node into a `NodeRef`, inlining it when
    /// its encoding is under 32 bytes and otherwise hashing and storing it.
    fn make_ref(&mut self, node: TrieNode) -> NodeRef {
        let encoded = node.rlp_encode();
        if encoded.len() < 32 {
            NodeRef::Inline(Box::new(node))
        } else {
            let hash = keccak256(&encoded);
            self.nodes.insert(hash, encoded);
            NodeRef::Hash(hash)
        }
    }

    fn get_at(&self, node: &TrieNode, key: &Nibbles, depth: usize) -> Result<Option<Vec<u8>>, StateError> {
        match node {
            TrieNode::Empty => Ok(None),

            TrieNode::Leaf { path, value } => {
                if key.slice(depth).0 == path.0 {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }

            TrieNode::Extension { path, child } => {
                let remaining = key.slice(depth);
                if remaining.0.starts_with(&path.0) {
                    let child_node = self.resolve(child)?;
                    self.get_at(&child_node, key, depth + path.len())
                } else {
                    Ok(None)
                }
            }

            TrieNode::Branch { children, value } => {
                if depth == key.len() {
                    return Ok(value.clone());
                }
                let nibble = key.at(depth) as usize;
                match &children[nibble] {
                    Some(r) => {
                        let child_node = self.resolve(r)?;
                        self.get_at(&child_node, key, depth + 1)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn put_at(
        &mut self,
        node: TrieNode,
        key: &Nibbles,
        depth: usize,
        value: Vec<u8>,
    ) -> Result<TrieNode, StateError> {
        let remaining = key.slice(depth);

        match node {
            TrieNode::Empty => Ok(TrieNode::Leaf { path: remaining, value }),

            TrieNode::Leaf { path, value: old_value } => {
                if path.0 == remaining.0 {
                    return Ok(TrieNode::Leaf { path, value });
                }
                let common = path.common_prefix_len(&remaining);
                let mut children: [Option<NodeRef>; 16] = std::array::from_fn(|_| None);
                let mut branch_value = None;

                if common == path.len() {
                    branch_value = Some(old_value);
                } else {
                    let old_nibble = path.at(common);
                    let old_leaf = TrieNode::Leaf { path: path.slice(common + 1), value: old_value };
                    children[old_nibble as usize] = Some(self.make_ref(old_leaf));
                }

                if common == remaining.len() {
                    branch_value = Some(value);
                } else {
                    let new_nibble = remaining.at(common);
                    let new_leaf = TrieNode::Leaf { path: remaining.slice(common + 1), value };
                    children[new_nibble as usize] = Some(self.make_ref(new_leaf));
                }

                let branch = TrieNode::Branch { children: Box::new(children), value: branch_value };
                if common == 0 {
                    Ok(branch)
                } else {
                    let branch_ref = self.make_ref(branch);
                    Ok(TrieNode::Extension { path: remaining.slice_range(0, common), child: branch_ref })
                }
            }

            TrieNode::Extension { path, child } => {
                if remaining.0.starts_with(&path.0) {
                    let child_node = self.resolve(&child)?;
                    let new_child = self.put_at(child_node, key, depth + path.len(), value)?;
                    let new_ref = self.make_ref(new_child);
                    return Ok(TrieNode::Extension { path, child: new_ref });
                }

                let common = path.common_prefix_len(&remaining);
                let mut children: [Option<NodeRef>; 16] = std::array::from_fn(|_| None);
                let mut branch_value = None;

                let old_nibble = path.at(common);
                let old_rest = path.slice(common + 1);
                let old_ref = if old_rest.is_empty() {
                    child
                } else {
                    self.make_ref(TrieNode::Extension { path: old_rest, child })
                };
                children[old_nibble as usize] = Some(old_ref);

                if common == remaining.len() {
                    branch_value = Some(value);
                } else {
                    let new_nibble = remaining.at(common);
                    let new_leaf = TrieNode::Leaf { path: remaining.slice(common + 1), value };
                    children[new_nibble as usize] = Some(self.make_ref(new_leaf));
                }

                let branch = TrieNode::Branch { children: Box::new(children), value: branch_value };
                if common == 0 {
                    Ok(branch)
                } else {
                    let branch_ref = self.make_ref(branch);
                    Ok(TrieNode::Extension { path: path.slice_range(0, common), child: branch_ref })
                }
            }

            TrieNode::Branch { mut children, value: old_value } => {
                if remaining.is_empty() {
                    Ok(TrieNode::Branch { children, value: Some(value) })
                } else {
                    let nibble = remaining.at(0) as usize;
                    let child_node = match &children[nibble] {
                        Some(r) => self.resolve(r)?,
                        None => TrieNode::Empty,
                    };
                    let new_child = self.put_at(child_node, key, depth + 1, value)?;
                    children[nibble] = Some(self.make_ref(new_child));
                    Ok(TrieNode::Branch { children, value: old_value })
                }
            }
        }
    }

    fn delete_at(&mut self, node: TrieNode, key: &Nibbles, depth: usize) -> Result<Option<TrieNode>, StateError> {
        let remaining = key.slice(depth);

        match node {
            TrieNode::Empty => Ok(None),

            TrieNode::Leaf { .. } => Ok(None),

            TrieNode::Extension { path, child } => {
                let child_node = self.resolve(&child)?;
                let new_child = self.delete_at(child_node, key, depth + path.len())?;
                match new_child {
                    None => Ok(None),
                    Some(TrieNode::Leaf { path: child_path, value }) => {
                        let mut combined = path.0.clone();
                        combined.extend_from_slice(&child_path.0);
                        Ok(Some(TrieNode::Leaf { path: Nibbles(combined), value }))
                    }
                    Some(TrieNode::Extension { path: child_path, child: grandchild }) => {
                        let mut combined = path.0.clone();
                        combined.extend_from_slice(&child_path.0);
                        Ok(Some(TrieNode::Extension { path: Nibbles(combined), child: grandchild }))
                    }
                    Some(other) => {
                        let new_ref = self.make_ref(other);
                        Ok(Some(TrieNode::Extension { path, child: new_ref }))
                    }
                }
            }

            TrieNode::Branch { mut children, value } => {
                if remaining.is_empty() {
                    self.collapse_branch(children, None)
                } else {
                    let nibble = remaining.at(0) as usize;
                    let child_node = match &children[nibble] {
                        Some(r) => self.resolve(r)?,
                        None => return self.collapse_branch(children, value),
                    };
                    let new_child = self.delete_at(child_node, key, depth + 1)?;
                    children[nibble] = match new_child {
                        None => None,
                        Some(n) => Some(self.make_ref(n)),
                    };
                    self.collapse_branch(children, value)
                }
            }
        }
    }

    /// Collapse a branch after one of its slots changed: drop it to a leaf
    /// if it now holds only a value, merge it with its sole remaining child
    /// (extension+extension / extension+leaf) if exactly one slot survives
    /// and there is no branch value, or leave it as a branch otherwise.
    fn collapse_branch(
        &mut self,
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    ) -> Result<Option<TrieNode>, StateError> {
        let remaining: Vec<usize> = (0..16).filter(|&i| children[i].is_some()).collect();

        match (remaining.len(), value) {
            (0, None) => Ok(None),
            (0, Some(v)) => Ok(Some(TrieNode::Leaf { path: Nibbles(vec![]), value: v })),
            (1, None) => {
                let idx = remaining[0];
                let child_ref = children[idx].clone().expect("checked Some above");
                let child_node = self.resolve(&child_ref)?;
                match child_node {
                    TrieNode::Leaf { path: child_path, value } => {
                        let mut combined = vec![idx as u8];
                        combined.extend_from_slice(&child_path.0);
                        Ok(Some(TrieNode::Leaf { path: Nibbles(combined), value }))
                    }
                    TrieNode::Extension { path: child_path, child: grandchild } => {
                        let mut combined = vec![idx as u8];
                        combined.extend_from_slice(&child_path.0);
                        Ok(Some(TrieNode::Extension { path: Nibbles(combined), child: grandchild }))
                    }
                    branch @ TrieNode::Branch { .. } => {
                        let new_ref = self.make_ref(branch);
                        Ok(Some(TrieNode::Extension { path: Nibbles(vec![idx as u8]), child: new_ref }))
                    }
                    TrieNode::Empty => unreachable!("a stored child is never Empty"),
                }
            }
            (_, value) => Ok(Some(TrieNode::Branch { children, value })),
        }
    }

    // =========================================================================
    // ACCOUNT OPERATIONS
    // =========================================================================

    /// Insert or update an account.
    pub fn insert_account(&mut self, address: Address, state: &AccountState) -> Result<(), StateError> {
        let key = Nibbles::from_bytes(&keccak256(&address));
        self.root = self.put(self.root, &key, state.rlp_encode())?;
        Ok(())
    }

    /// Get account state.
    pub fn get_account(&self, address: Address) -> Result<Option<AccountState>, StateError> {
        let key = Nibbles::from_bytes(&keccak256(&address));
        match self.get(self.root, &key)? {
            Some(bytes) => Ok(Some(AccountState::rlp_decode(&bytes).map_err(|_| StateError::Corrupt {
                hash: keccak256(&bytes),
            })?)),
            None => Ok(None),
        }
    }

    /// Set account balance.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), StateError> {
        let mut state = self.get_account(address)?.unwrap_or_default();
        state.balance = balance;
        self.insert_account(address, &state)
    }

    /// Get account balance.
    pub fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        Ok(self.get_account(address)?.map(|s| s.balance).unwrap_or(U256::zero()))
    }

    /// Get account nonce.
    pub fn get_nonce(&self, address: Address) -> Result<u64, StateError> {
        Ok(self.get_account(address)?.map(|s| s.nonce).unwrap_or(0))
    }

    /// Increment account nonce. Fails with `NonceOverflow` at 2^64-1 per spec S4.D.
    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let mut state = self.get_account(address)?.unwrap_or_default();
        state.nonce = state.nonce.checked_add(1).ok_or(StateError::NonceOverflow { address })?;
        self.insert_account(address, &state)
    }

    /// Apply a balance credit/debit with INVARIANT-1 enforcement.
    ///
    /// `credit` selects direction: `true` adds `amount`, `false` subtracts it.
    /// Returns `InsufficientBalance` if a debit would underflow.
    pub fn apply_balance_change(&mut self, address: Address, amount: U256, credit: bool) -> Result<(), StateError> {
        let current = self.get_balance(address)?;

        let new_balance = if credit {
            current.saturating_add(amount)
        } else {
            current
                .checked_sub(amount)
                .ok_or(StateError::InsufficientBalance { required: amount, available: current })?
        };

        self.set_balance(address, new_balance)
    }

    // =========================================================================
    // STORAGE OPERATIONS
    // =========================================================================
    //
    // Each account's storage is its own Patricia Merkle Trie, rooted at
    // `AccountState.storage_root` and sharing this trie's node store. Slots
    // are keyed by `Keccak(word_key)` and values are RLP-encoded as a
    // minimal-length big-endian integer; a zero value is represented by
    // absence from the trie rather than a stored zero.

    /// Set a storage value. Setting the zero value deletes the slot.
    pub fn set_storage(&mut self, contract: Address, key: StorageKey, value: StorageValue) -> Result<(), StateError> {
        let value_u256 = U256::from_big_endian(&value);
        if value_u256.is_zero() {
            return self.delete_storage(contract, key);
        }

        let mut account = self.get_account(contract)?.unwrap_or_default();
        let storage_key = Nibbles::from_bytes(&keccak256(&key));
        let encoded = rlp::encode(&value_u256.rlp_append());
        account.storage_root = self.put(account.storage_root, &storage_key, encoded)?;
        self.insert_account(contract, &account)
    }

    /// Get a storage value. Absence from the trie reads back as zero.
    pub fn get_storage(&self, contract: Address, key: StorageKey) -> Result<Option<StorageValue>, StateError> {
        let account = match self.get_account(contract)? {
            Some(account) => account,
            None => return Ok(None),
        };
        let storage_key = Nibbles::from_bytes(&keccak256(&key));
        match self.get(account.storage_root, &storage_key)? {
            Some(bytes) => {
                let item = rlp::decode(&bytes).map_err(|_| StateError::Corrupt { hash: keccak256(&bytes) })?;
                let value = U256::rlp_parse(&item).map_err(|_| StateError::Corrupt { hash: keccak256(&bytes) })?;
                let mut out = [0u8; 32];
                value.to_big_endian(&mut out);
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }

    /// Delete a storage value.
    pub fn delete_storage(&mut self, contract: Address, key: StorageKey) -> Result<(), StateError> {
        let mut account = match self.get_account(contract)? {
            Some(account) => account,
            None => return Ok(()),
        };
        let storage_key = Nibbles::from_bytes(&keccak256(&key));
        account.storage_root = self.delete(account.storage_root, &storage_key)?;
        self.insert_account(contract, &account)
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Serialize the full node store for persistence. Because the store is
    /// append-only, this captures every historical root still reachable
    /// from a node still present, not just the current one.
    pub fn serialize(&self) -> Result<Vec<u8>, StateError> {
        let mut data = Vec::new();

        data.push(4u8); // Version 4: content-addressed node store
        data.extend_from_slice(&self.root);

        let node_count = self.nodes.len() as u32;
        data.extend_from_slice(&node_count.to_le_bytes());

        for (hash, bytes) in &self.nodes {
            data.extend_from_slice(hash);
            data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            data.extend_from_slice(bytes);
        }

        Ok(data)
    }

    /// Deserialize trie state from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self, StateError> {
        if data.is_empty() {
            return Ok(Self::new());
        }

        let mut cursor = 0;

        let version = data[cursor];
        if version != 4 {
            return Err(StateError::DatabaseError(format!("Unsupported trie version: {version}")));
        }
        cursor += 1;

        let mut root = [0u8; 32];
        root.copy_from_slice(&data[cursor..cursor + 32]);
        cursor += 32;

        let node_count = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()) as usize;
        cursor += 4;

        let mut nodes = HashMap::with_capacity(node_count);
        for _ in 0..node_count {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&data[cursor..cursor + 32]);
            cursor += 32;

            let len = u32::from_le_bytes(data[cursor..cursor + 4].try_into().unwrap()) as usize;
            cursor += 4;

            let bytes = data[cursor..cursor + len].to_vec();
            cursor += len;

            nodes.insert(hash, bytes);
        }

        Ok(Self { nodes, root, config: StateConfig::default() })
    }

    /// Save state to a TrieDatabase.
    pub fn save_to_db<D: crate::ports::TrieDatabase>(&self, db: &D) -> Result<(), StateError> {
        let data = self.serialize()?;
        let state_key = [0xFFu8; 32];
        db.put_node(state_key, data)
    }

    /// Load state from a TrieDatabase.
    pub fn load_from_db<D: crate::ports::TrieDatabase>(db: &D) -> Result<Self, StateError> {
        let state_key = [0xFFu8; 32];
        match db.get_node(&state_key)? {
            Some(data) => Self::deserialize(&data),
            None => Ok(Self::new()),
        }
    }
}

impl Default for PatriciaMerkleTrie {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibbles_from_address() {
        let addr = [
            0xAB, 0xCD, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0xFF,
        ];
        let nibbles = Nibbles::from_address(&addr);
        assert_eq!(nibbles.len(), 40);
        assert_eq!(nibbles.at(0), 0x0A);
        assert_eq!(nibbles.at(1), 0x0B);
        assert_eq!(nibbles.at(2), 0x0C);
        assert_eq!(nibbles.at(3), 0x0D);
        assert_eq!(nibbles.at(38), 0x0F);
        assert_eq!(nibbles.at(39), 0x0F);
    }

    #[test]
    fn test_hex_prefix_encoding() {
        // Even length leaf
        let nibbles = Nibbles(vec![1, 2, 3, 4]);
        let encoded = nibbles.encode_hex_prefix(true);
        assert_eq!(encoded[0] >> 4, 2); // Leaf flag, even

        // Odd length leaf
        let nibbles = Nibbles(vec![1, 2, 3]);
        let encoded = nibbles.encode_hex_prefix(true);
        assert_eq!(encoded[0] >> 4, 3); // Leaf flag, odd

        // Even length extension
        let nibbles = Nibbles(vec![1, 2, 3, 4]);
        let encoded = nibbles.encode_hex_prefix(false);
        assert_eq!(encoded[0] >> 4, 0); // Extension flag, even
    }

    #[test]
    fn test_hex_prefix_roundtrip() {
        let original = Nibbles(vec![1, 2, 3, 4, 5]);
        let encoded = original.encode_hex_prefix(true);
        let (decoded, is_leaf) = Nibbles::decode_hex_prefix(&encoded);
        assert!(is_leaf);
        assert_eq!(decoded.0, original.0);
    }

    #[test]
    fn test_insert_and_get_account() {
        let mut trie = PatriciaMerkleTrie::new();
        let address = [0xAB; 20];

        let account = AccountState {
            balance: U256::from(1_000_000),
            nonce: 42,
            code_hash: [0; 32],
            storage_root: EMPTY_TRIE_ROOT,
        };

        trie.insert_account(address, &account).unwrap();
        let retrieved = trie.get_account(address).unwrap();

        assert_eq!(retrieved, Some(account));
    }

    #[test]
    fn test_deterministic_root() {
        let mut trie1 = PatriciaMerkleTrie::new();
        let mut trie2 = PatriciaMerkleTrie::new();

        let transitions = vec![
            ([1u8; 20], U256::from(100)),
            ([2u8; 20], U256::from(200)),
            ([3u8; 20], U256::from(300)),
        ];

        for (addr, balance) in &transitions {
            trie1.set_balance(*addr, *balance).unwrap();
            trie2.set_balance(*addr, *balance).unwrap();
        }

        // INVARIANT-3: Same inputs = same root
        assert_eq!(trie1.root_hash(), trie2.root_hash());
    }

    #[test]
    fn test_different_order_same_root() {
        let mut trie1 = PatriciaMerkleTrie::new();
        let mut trie2 = PatriciaMerkleTrie::new();

        // Insert in different order
        trie1.set_balance([1u8; 20], U256::from(100)).unwrap();
        trie1.set_balance([2u8; 20], U256::from(200)).unwrap();
        trie1.set_balance([3u8; 20], U256::from(300)).unwrap();

        trie2.set_balance([3u8; 20], U256::from(300)).unwrap();
        trie2.set_balance([1u8; 20], U256::from(100)).unwrap();
        trie2.set_balance([2u8; 20], U256::from(200)).unwrap();

        // INVARIANT-3: Order doesn't matter, same result
        assert_eq!(trie1.root_hash(), trie2.root_hash());
    }

    #[test]
    fn test_balance_underflow_protection() {
        let mut trie = PatriciaMerkleTrie::new();
        let address = [0xAB; 20];

        trie.set_balance(address, U256::from(100)).unwrap();

        // INVARIANT-1: Cannot go negative
        let result = trie.apply_balance_change(address, U256::from(101), false);
        assert!(matches!(result, Err(StateError::InsufficientBalance { .. })));
    }

    #[test]
    fn test_nonce_monotonicity() {
        let mut trie = PatriciaMerkleTrie::new();
        let address = [0xAB; 20];

        trie.insert_account(address, &AccountState::new(U256::from(1000)).with_nonce(5))
            .unwrap();

        let result = trie.increment_nonce(address);
        assert!(result.is_ok());
        assert_eq!(trie.get_nonce(address).unwrap(), 6);
    }

    #[test]
    fn test_nonce_overflow() {
        let mut trie = PatriciaMerkleTrie::new();
        let address = [0xAB; 20];
        trie.insert_account(address, &AccountState::new(U256::zero()).with_nonce(u64::MAX))
            .unwrap();

        let result = trie.increment_nonce(address);
        assert!(matches!(result, Err(StateError::NonceOverflow { .. })));
    }

    #[test]
    fn test_trie_node_hashing() {
        let leaf = TrieNode::Leaf {
            path: Nibbles(vec![1, 2, 3, 4]),
            value: vec![0xAB, 0xCD],
        };

        let hash1 = leaf.hash();
        let hash2 = leaf.hash();

        // Same node should produce same hash
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_empty_trie_root() {
        let trie = PatriciaMerkleTrie::new();
        assert_eq!(trie.root_hash(), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut trie = PatriciaMerkleTrie::new();
        trie.set_balance([0x01; 20], U256::from(1000)).unwrap();
        trie.set_balance([0x02; 20], U256::from(2000)).unwrap();
        trie.set_storage([0x01; 20], [0xAA; 32], [0xBB; 32]).unwrap();

        let original_root = trie.root_hash();
        let serialized = trie.serialize().unwrap();
        let restored = PatriciaMerkleTrie::deserialize(&serialized).unwrap();

        assert_eq!(restored.root_hash(), original_root);
        assert_eq!(restored.get_balance([0x01; 20]).unwrap(), U256::from(1000));
        assert_eq!(restored.get_balance([0x02; 20]).unwrap(), U256::from(2000));
        assert_eq!(
            restored.get_storage([0x01; 20], [0xAA; 32]).unwrap(),
            Some([0xBB; 32])
        );
    }

    #[test]
    fn test_account_rlp_encoding() {
        let account = AccountState {
            balance: U256::from(1000),
            nonce: 5,
            code_hash: [0; 32],
            storage_root: EMPTY_TRIE_ROOT,
        };

        let encoded = account.rlp_encode();
        assert!(!encoded.is_empty());
        // First byte should be list marker
        assert!(encoded[0] >= 0xc0);
    }

    #[test]
    fn test_account_rlp_roundtrip() {
        let account = AccountState {
            balance: U256::from(123_456_789u64),
            nonce: 7,
            code_hash: [0x11; 32],
            storage_root: [0x22; 32],
        };

        let encoded = account.rlp_encode();
        let decoded = AccountState::rlp_decode(&encoded).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_multiple_accounts_different_roots() {
        let mut trie1 = PatriciaMerkleTrie::new();
        let mut trie2 = PatriciaMerkleTrie::new();

        trie1.set_balance([0x01; 20], U256::from(100)).unwrap();
        trie2.set_balance([0x01; 20], U256::from(200)).unwrap(); // Different balance

        // Different state = different root
        assert_ne!(trie1.root_hash(), trie2.root_hash());
    }

    #[test]
    fn test_storage_trie_is_independent_of_flat_hash_of_concatenation() {
        // A real per-account storage trie changes root when the *set* of
        // keys changes, not just when the concatenated bytes change; two
        // accounts with storage inserted in different orders must match.
        let mut trie1 = PatriciaMerkleTrie::new();
        let mut trie2 = PatriciaMerkleTrie::new();

        trie1.set_storage([0x01; 20], [0x01; 32], [0x0A; 32]).unwrap();
        trie1.set_storage([0x01; 20], [0x02; 32], [0x0B; 32]).unwrap();

        trie2.set_storage([0x01; 20], [0x02; 32], [0x0B; 32]).unwrap();
        trie2.set_storage([0x01; 20], [0x01; 32], [0x0A; 32]).unwrap();

        assert_eq!(trie1.root_hash(), trie2.root_hash());

        let account = trie1.get_account([0x01; 20]).unwrap().unwrap();
        assert_ne!(account.storage_root, EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_zero_value_storage_is_absent() {
        let mut trie = PatriciaMerkleTrie::new();
        let contract = [0x01; 20];
        trie.set_storage(contract, [0x01; 32], [0xFF; 32]).unwrap();
        assert!(trie.get_storage(contract, [0x01; 32]).unwrap().is_some());

        trie.set_storage(contract, [0x01; 32], [0u8; 32]).unwrap();
        assert_eq!(trie.get_storage(contract, [0x01; 32]).unwrap(), None);

        let account = trie.get_account(contract).unwrap().unwrap();
        assert_eq!(account.storage_root, EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_delete_storage_restores_empty_root() {
        let mut trie = PatriciaMerkleTrie::new();
        let contract = [0x01; 20];
        trie.set_storage(contract, [0x01; 32], [0xFF; 32]).unwrap();
        trie.delete_storage(contract, [0x01; 32]).unwrap();

        assert_eq!(trie.get_storage(contract, [0x01; 32]).unwrap(), None);
        let account = trie.get_account(contract).unwrap().unwrap();
        assert_eq!(account.storage_root, EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_historical_root_remains_retrievable_after_later_writes() {
        let mut trie = PatriciaMerkleTrie::new();
        trie.set_balance([0x01; 20], U256::from(100)).unwrap();
        let root_after_first = trie.root_hash();

        trie.set_balance([0x02; 20], U256::from(200)).unwrap();
        trie.set_balance([0x01; 20], U256::from(999)).unwrap();

        // The old root is untouched by later writes and still walkable.
        let key = Nibbles::from_bytes(&keccak256(&[0x01; 20]));
        let value = trie.get(root_after_first, &key).unwrap().unwrap();
        let account = AccountState::rlp_decode(&value).unwrap();
        assert_eq!(account.balance, U256::from(100));

        // The current root reflects the later write.
        assert_eq!(trie.get_balance([0x01; 20]).unwrap(), U256::from(999));
    }

    #[test]
    fn test_delete_account_key_then_reinsert_matches_fresh_trie() {
        let mut built = PatriciaMerkleTrie::new();
        built.set_balance([0x01; 20], U256::from(10)).unwrap();
        built.set_balance([0x02; 20], U256::from(20)).unwrap();
        let key = Nibbles::from_bytes(&keccak256(&[0x02; 20]));
        built.root = built.delete(built.root, &key).unwrap();

        let mut fresh = PatriciaMerkleTrie::new();
        fresh.set_balance([0x01; 20], U256::from(10)).unwrap();

        assert_eq!(built.root_hash(), fresh.root_hash());
    }

    #[test]
    fn test_branch_and_extension_children_inline_when_small() {
        // Two leaves sharing only their first nibble encode well under 32
        // bytes; the branch above them must inline rather than hash.
        let mut trie = PatriciaMerkleTrie::new();
        let key_a = Nibbles(vec![0, 1]);
        let key_b = Nibbles(vec![0, 2]);
        trie.root = trie.put(EMPTY_TRIE_ROOT, &key_a, vec![0x01]).unwrap();
        trie.root = trie.put(trie.root, &key_b, vec![0x02]).unwrap();

        let root_node = trie.load(trie.root).unwrap();
        match root_node {
            TrieNode::Branch { children, .. } => {
                assert!(children[1].is_some());
                assert!(matches!(children[1], Some(NodeRef::Inline(_))));
            }
            other => panic!("expected branch root, got {other:?}"),
        }
    }
}
