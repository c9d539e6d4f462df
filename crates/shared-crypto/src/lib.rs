//! # Shared Crypto - Hash & Signature Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `keccak` | Keccak-256/512 | Hashing, RLP node addressing, MAC state |
//! | `ecdsa` | secp256k1 ECDSA + ECDH | Transaction sender recovery, RLPx handshake |
//! | `aes_modes` | AES-CTR/CBC/ECB | RLPx frame cipher, ECIES body cipher |
//! | `kdf` | HMAC-SHA-256, NIST-SP-800-56 concat-KDF | ECIES key derivation |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aes_modes;
pub mod ecdsa;
pub mod errors;
pub mod kdf;
pub mod keccak;

// Re-exports
pub use aes_modes::{
    aes128_ctr_xor, aes256_cbc_decrypt, aes256_cbc_encrypt, aes256_ctr_xor,
    aes256_ecb_encrypt_block,
};
pub use ecdsa::{
    Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1RecoverableSignature, Secp256k1Signature,
};
pub use errors::CryptoError;
pub use kdf::{concat_kdf, hmac_sha256, hmac_sha256_verify};
pub use keccak::{
    keccak256, keccak256_concat, keccak512, Hash256, Hash512, Keccak256State, EMPTY_CODE_HASH,
    EMPTY_TRIE_ROOT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
