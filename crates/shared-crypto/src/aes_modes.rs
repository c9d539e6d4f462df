//! # AES stream/block modes for the peer-wire transport
//!
//! The ECIES handshake and the RLPx frame codec both need raw AES-128/256
//! under CTR (stream encryption of auth/ack bodies and frame payloads), ECB
//! (the single-block header-MAC mixing step), and CBC (not used on the wire
//! but kept alongside for symmetry with the other block modes the transport
//! layer is built from). These are thin wrappers - no padding, no AEAD - the
//! caller supplies exactly the key/IV/block sizes the protocol specifies.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes256};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut};

use crate::CryptoError;

type Aes128Ctr = ctr::Ctr64BE<Aes128>;
type Aes256Ctr = ctr::Ctr64BE<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt/decrypt (symmetric) in AES-256-CTR. `iv` is the 16-byte initial
/// counter block. Operates in place.
pub fn aes256_ctr_xor(key: &[u8; 32], iv: &[u8; 16], data: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(data);
}

/// Encrypt/decrypt (symmetric) in AES-128-CTR.
pub fn aes128_ctr_xor(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    let mut cipher = Aes128Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(data);
}

/// Single-block AES-256-ECB encryption (no padding), used by the RLPx
/// header-MAC mixing step: `hmac = digest[:16] XOR AES_ECB(mac_secret, digest[:16])`.
pub fn aes256_ecb_encrypt_block(key: &[u8; 32], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut buf = *block;
    let ga = GenericArray::from_mut_slice(&mut buf);
    cipher.encrypt_block(ga);
    buf
}

/// AES-256-CBC encryption with PKCS7 padding.
pub fn aes256_cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(plaintext)
}

/// AES-256-CBC decryption with PKCS7 padding.
pub fn aes256_cbc_decrypt(
    key: &[u8; 32],
    iv: &[u8; 16],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("bad CBC padding".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctr_roundtrips() {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 16];
        let mut data = b"the quick brown fox".to_vec();
        let original = data.clone();

        aes256_ctr_xor(&key, &iv, &mut data);
        assert_ne!(data, original);

        aes256_ctr_xor(&key, &iv, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn ecb_single_block_is_deterministic() {
        let key = [0x33u8; 32];
        let block = [0x44u8; 16];
        assert_eq!(
            aes256_ecb_encrypt_block(&key, &block),
            aes256_ecb_encrypt_block(&key, &block)
        );
        assert_ne!(aes256_ecb_encrypt_block(&key, &block), block);
    }

    #[test]
    fn cbc_roundtrips() {
        let key = [0x55u8; 32];
        let iv = [0x66u8; 16];
        let plaintext = b"RLPx frame payload example data";

        let ciphertext = aes256_cbc_encrypt(&key, &iv, plaintext);
        let decrypted = aes256_cbc_decrypt(&key, &iv, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }
}
