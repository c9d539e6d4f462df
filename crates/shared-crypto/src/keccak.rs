//! # Keccak Hashing
//!
//! The original (pre-NIST-standardization) Keccak-256/512 sponge, as used
//! throughout the protocol for header hashes, trie node addressing, address
//! derivation, and the RLPx MAC construction. This is distinct from the
//! later SHA-3 standard (different padding) - `sha3::Keccak256`/`Keccak512`
//! implement the original construction, not `sha3::Sha3_256`.

use sha3::{Digest, Keccak256, Keccak512};

/// 256-bit Keccak output.
pub type Hash256 = [u8; 32];

/// 512-bit Keccak output.
pub type Hash512 = [u8; 64];

/// Hash data with Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash the concatenation of several byte slices with Keccak-256, without
/// allocating an intermediate buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hash data with Keccak-512 (one-shot).
pub fn keccak512(data: &[u8]) -> Hash512 {
    let mut hasher = Keccak512::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Stateful Keccak-256 hasher, for incremental/running digests such as the
/// RLPx frame MAC (which is never reset mid-session and is repeatedly
/// updated and re-finalized).
#[derive(Clone)]
pub struct Keccak256State {
    inner: Keccak256,
}

impl Keccak256State {
    /// Create a new, empty running hash.
    pub fn new() -> Self {
        Self {
            inner: Keccak256::new(),
        }
    }

    /// Absorb more bytes.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize to a digest *without* consuming the running state, so the
    /// same state can keep absorbing input afterwards (used by the RLPx MAC,
    /// which finalizes once per frame but keeps accumulating).
    pub fn digest(&self) -> Hash256 {
        self.inner.clone().finalize().into()
    }
}

impl Default for Keccak256State {
    fn default() -> Self {
        Self::new()
    }
}

/// keccak256(RLP("")) - the canonical empty Merkle-Patricia trie root.
pub const EMPTY_TRIE_ROOT: Hash256 = [
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8, 0x6e,
    0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63, 0xb4, 0x21,
];

/// keccak256("") - the code hash of an externally-owned account.
pub const EMPTY_CODE_HASH: Hash256 = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trie_root_matches_keccak_of_rlp_empty_string() {
        // RLP("") == 0x80
        assert_eq!(keccak256(&[0x80]), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn empty_code_hash_matches_keccak_of_empty_bytes() {
        assert_eq!(keccak256(&[]), EMPTY_CODE_HASH);
    }

    #[test]
    fn running_state_matches_one_shot() {
        let mut running = Keccak256State::new();
        running.update(b"hello").update(b" world");
        assert_eq!(running.digest(), keccak256(b"hello world"));
    }

    #[test]
    fn keccak256_concat_matches_manual_concat() {
        let a = b"foo";
        let b = b"bar";
        let mut combined = Vec::new();
        combined.extend_from_slice(a);
        combined.extend_from_slice(b);
        assert_eq!(keccak256_concat(&[a, b]), keccak256(&combined));
    }
}
