//! # Domain Entities for State Management
//!
//! Core data structures per SPEC-04 Section 2.1.
//!
//! ## References
//!
//! - SPEC-04 Section 2.1: Core Entities
//! - Architecture.md Section 2.1: DDD principles

use primitive_types::U256;
use rlp::Decodable;
use serde::{Deserialize, Serialize};

pub type Hash = [u8; 32];
pub type Address = [u8; 20];
pub type StorageKey = [u8; 32];
pub type StorageValue = [u8; 32];

/// Empty code hash for externally owned accounts (EOAs).
/// Contracts have non-zero code_hash after deployment.
/// Value: keccak256("") = 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
pub const EMPTY_CODE_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Keccak256 hash of an empty RLP-encoded trie.
/// This is the canonical empty trie root per Ethereum specification.
/// Value: keccak256(RLP("")) = 0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421
pub const EMPTY_TRIE_ROOT: Hash = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// Account state stored in the Patricia Merkle Trie.
///
/// Each account in the blockchain has this state structure. The account
/// is identified by its 20-byte address (derived from public key).
///
/// ## Fields
///
/// - `balance`: Token balance in base units (wei equivalent)
/// - `nonce`: Transaction count, prevents replay attacks (INVARIANT-2)
/// - `code_hash`: Hash of contract bytecode (EMPTY_CODE_HASH for EOAs)
/// - `storage_root`: Root of account's storage trie (EMPTY_TRIE_ROOT if empty)
///
/// ## Serialization
///
/// RLP-encoded as: [nonce, balance, storage_root, code_hash]
/// This ordering matches Ethereum's account encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account balance in base units (wei), modular over 2^256.
    #[serde(with = "u256_serde")]
    pub balance: U256,
    /// Transaction nonce. Increments by exactly 1 per processed transaction.
    pub nonce: u64,
    /// Keccak256 hash of contract code. EMPTY_CODE_HASH for non-contract accounts.
    pub code_hash: Hash,
    /// Root hash of the account's storage Patricia Merkle Trie.
    pub storage_root: Hash,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: U256::zero(),
            nonce: 0,
            code_hash: EMPTY_CODE_HASH,
            storage_root: EMPTY_TRIE_ROOT,
        }
    }
}

impl AccountState {
    /// Create a new account with the specified balance.
    pub fn new(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Builder method to set nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// A "simple" account per spec S3: nonce 0, empty code, empty storage.
    pub fn is_simple(&self) -> bool {
        self.nonce == 0 && self.code_hash == EMPTY_CODE_HASH && self.storage_root == EMPTY_TRIE_ROOT
    }

    /// A "dead" account post-EIP-161: zero balance, zero nonce, no code.
    pub fn is_dead(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code_hash == EMPTY_CODE_HASH
    }

    /// RLP-encode this account state for hashing.
    ///
    /// Encoding order: [nonce, balance, storage_root, code_hash]
    /// This matches Ethereum's account RLP encoding.
    pub fn rlp_encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(128);

        // Encode nonce (variable length integer)
        rlp_encode_u64(&mut encoded, self.nonce);

        // Encode balance (variable length integer, up to 32 bytes)
        rlp_encode_u256(&mut encoded, self.balance);

        // Encode storage_root (32 bytes)
        rlp_encode_bytes(&mut encoded, &self.storage_root);

        // Encode code_hash (32 bytes)
        rlp_encode_bytes(&mut encoded, &self.code_hash);

        // Wrap in list
        rlp_encode_list(encoded)
    }

    /// Decode an account state from its RLP encoding.
    ///
    /// Expects `[nonce, balance, storage_root, code_hash]`, matching `rlp_encode`.
    pub fn rlp_decode(data: &[u8]) -> Result<Self, rlp::RlpError> {
        let item = rlp::decode(data)?;
        let items = match &item {
            rlp::RlpItem::List(items) if items.len() == 4 => items,
            _ => return Err(rlp::RlpError::UnexpectedString),
        };

        let nonce = u64::rlp_parse(&items[0]).map_err(|_| rlp::RlpError::UnexpectedList)?;
        let balance = U256::rlp_parse(&items[1]).map_err(|_| rlp::RlpError::UnexpectedList)?;
        let storage_root = decode_hash32(&items[2])?;
        let code_hash = decode_hash32(&items[3])?;

        Ok(Self { balance, nonce, code_hash, storage_root })
    }
}

fn decode_hash32(item: &rlp::RlpItem) -> Result<Hash, rlp::RlpError> {
    match item {
        rlp::RlpItem::Bytes(b) if b.len() == 32 => {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(b);
            Ok(hash)
        }
        _ => Err(rlp::RlpError::UnexpectedList),
    }
}

/// `serde` helper so `U256` (which does not implement `Serialize`/`Deserialize`
/// in a fixed-width form) round-trips as a big-endian byte array.
mod u256_serde {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        bytes.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let bytes = <[u8; 32]>::deserialize(d)?;
        Ok(U256::from_big_endian(&bytes))
    }
}

/// RLP-encode a u64 value.
fn rlp_encode_u64(out: &mut Vec<u8>, value: u64) {
    if value == 0 {
        out.push(0x80); // Empty string
    } else if value < 128 {
        out.push(value as u8);
    } else {
        let bytes = value.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(8);
        let len = 8 - start;
        out.push(0x80 + len as u8);
        out.extend_from_slice(&bytes[start..]);
    }
}

/// RLP-encode a U256 value (minimal-length big-endian, per spec S4.A).
fn rlp_encode_u256(out: &mut Vec<u8>, value: U256) {
    if value.is_zero() {
        out.push(0x80);
        return;
    }
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(32);
    let trimmed = &bytes[start..];
    if trimmed.len() == 1 && trimmed[0] < 0x80 {
        out.push(trimmed[0]);
    } else {
        out.push(0x80 + trimmed.len() as u8);
        out.extend_from_slice(trimmed);
    }
}

/// RLP-encode a byte slice.
fn rlp_encode_bytes(out: &mut Vec<u8>, data: &[u8]) {
    if data.len() == 1 && data[0] < 128 {
        out.push(data[0]);
    } else if data.len() < 56 {
        out.push(0x80 + data.len() as u8);
        out.extend_from_slice(data);
    } else {
        let len_bytes = data.len().to_be_bytes();
        let len_start = len_bytes.iter().position(|&b| b != 0).unwrap_or(8);
        let len_len = 8 - len_start;
        out.push(0xb7 + len_len as u8);
        out.extend_from_slice(&len_bytes[len_start..]);
        out.extend_from_slice(data);
    }
}

/// Wrap encoded items in an RLP list.
fn rlp_encode_list(items: Vec<u8>) -> Vec<u8> {
    let mut result = Vec::with_capacity(items.len() + 9);
    if items.len() < 56 {
        result.push(0xc0 + items.len() as u8);
    } else {
        let len_bytes = items.len().to_be_bytes();
        let len_start = len_bytes.iter().position(|&b| b != 0).unwrap_or(8);
        let len_len = 8 - len_start;
        result.push(0xf7 + len_len as u8);
        result.extend_from_slice(&len_bytes[len_start..]);
    }
    result.extend(items);
    result
}

/// Configuration for the Patricia Merkle Trie.
///
/// Controls memory usage, caching behavior, and DoS protection limits.
#[derive(Clone, Debug)]
pub struct StateConfig {
    /// Maximum trie depth. Limits path length to prevent DoS.
    /// 64 is sufficient for 256-bit keys (64 nibbles).
    pub max_depth: usize,
    /// Size of in-memory node cache in megabytes.
    pub cache_size_mb: usize,
    /// Enable periodic state snapshots for fast sync.
    pub enable_snapshots: bool,
    /// Create snapshot every N blocks.
    pub snapshot_interval: u64,
    /// Keep state for last N blocks (older states pruned).
    pub pruning_depth: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            cache_size_mb: 512,
            enable_snapshots: true,
            snapshot_interval: 128,
            pruning_depth: 1000,
        }
    }
}

// =============================================================================
// TESTS (TDD)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_state_default() {
        let state = AccountState::default();
        assert_eq!(state.balance, U256::zero());
        assert_eq!(state.nonce, 0);
        assert_eq!(state.code_hash, EMPTY_CODE_HASH);
        assert_eq!(state.storage_root, EMPTY_TRIE_ROOT);
    }
}
