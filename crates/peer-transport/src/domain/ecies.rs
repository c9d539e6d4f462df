//! ECIES (Elliptic Curve Integrated Encryption Scheme) over secp256k1.
//!
//! Used to encrypt the auth/ack handshake messages to the recipient's
//! static public key before any session secrets exist. The session key
//! material comes from the NIST SP 800-56 concat-KDF over an ephemeral-key
//! ECDH shared secret, split into an AES-128-CTR key, an HMAC-SHA-256 key,
//! and the CTR initial counter block.

use k256::ecdh::diffie_hellman;
use k256::{PublicKey, SecretKey};
use shared_crypto::aes_modes::aes128_ctr_xor;
use shared_crypto::kdf::{concat_kdf, hmac_sha256, hmac_sha256_verify};
use thiserror::Error;

const EPHEMERAL_PUB_LEN: usize = 65;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const AES_KEY_LEN: usize = 16;
const MAC_KEY_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EciesError {
    #[error("ciphertext shorter than the fixed ephemeral-key/IV/MAC overhead")]
    Truncated,
    #[error("ephemeral public key is not a valid secp256k1 point")]
    InvalidEphemeralKey,
    #[error("MAC does not authenticate the ciphertext")]
    MacMismatch,
}

/// Encrypt `plaintext` to `recipient_pub`, authenticating `shared_info`
/// (the 2-byte big-endian message-size prefix the caller transmits
/// alongside this ciphertext) as associated data in the HMAC.
pub fn ecies_encrypt(
    recipient_pub: &PublicKey,
    plaintext: &[u8],
    shared_info: &[u8],
) -> Vec<u8> {
    let ephemeral_secret = SecretKey::random(&mut rand::thread_rng());
    let ephemeral_pub = ephemeral_secret.public_key();

    let shared_point = diffie_hellman(
        ephemeral_secret.to_nonzero_scalar(),
        recipient_pub.as_affine(),
    );
    let shared_x = shared_point.raw_secret_bytes();

    let key_material = concat_kdf(shared_x.as_slice(), &[], AES_KEY_LEN + MAC_KEY_LEN + IV_LEN);
    let aes_key: [u8; AES_KEY_LEN] = key_material[..AES_KEY_LEN].try_into().unwrap();
    let mac_key: [u8; MAC_KEY_LEN] = key_material[AES_KEY_LEN..AES_KEY_LEN + MAC_KEY_LEN]
        .try_into()
        .unwrap();
    let iv: [u8; IV_LEN] = key_material[AES_KEY_LEN + MAC_KEY_LEN..].try_into().unwrap();

    let mut body = plaintext.to_vec();
    aes128_ctr_xor(&aes_key, &iv, &mut body);

    let mac = hmac_sha256(&mac_key, &[&iv, &body, shared_info]);

    let mut out = Vec::with_capacity(EPHEMERAL_PUB_LEN + IV_LEN + body.len() + MAC_LEN);
    out.extend_from_slice(&ephemeral_pub.to_encoded_point(false).as_bytes());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    out.extend_from_slice(&mac);
    out
}

/// Decrypt a message produced by [`ecies_encrypt`] under the matching
/// recipient secret key.
pub fn ecies_decrypt(
    recipient_secret: &SecretKey,
    data: &[u8],
    shared_info: &[u8],
) -> Result<Vec<u8>, EciesError> {
    if data.len() < EPHEMERAL_PUB_LEN + IV_LEN + MAC_LEN {
        return Err(EciesError::Truncated);
    }

    let (ephemeral_pub_bytes, rest) = data.split_at(EPHEMERAL_PUB_LEN);
    let (iv, rest) = rest.split_at(IV_LEN);
    let (body, mac) = rest.split_at(rest.len() - MAC_LEN);

    let ephemeral_pub =
        PublicKey::from_sec1_bytes(ephemeral_pub_bytes).map_err(|_| EciesError::InvalidEphemeralKey)?;

    let shared_point = diffie_hellman(recipient_secret.to_nonzero_scalar(), ephemeral_pub.as_affine());
    let shared_x = shared_point.raw_secret_bytes();

    let key_material = concat_kdf(shared_x.as_slice(), &[], AES_KEY_LEN + MAC_KEY_LEN + IV_LEN);
    let aes_key: [u8; AES_KEY_LEN] = key_material[..AES_KEY_LEN].try_into().unwrap();
    let mac_key: [u8; MAC_KEY_LEN] = key_material[AES_KEY_LEN..AES_KEY_LEN + MAC_KEY_LEN]
        .try_into()
        .unwrap();

    if !hmac_sha256_verify(&mac_key, &[iv, body, shared_info], mac) {
        return Err(EciesError::MacMismatch);
    }

    let iv: [u8; IV_LEN] = iv.try_into().unwrap();
    let mut plaintext = body.to_vec();
    aes128_ctr_xor(&aes_key, &iv, &mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_matching_shared_info() {
        let recipient_secret = SecretKey::random(&mut rand::thread_rng());
        let recipient_pub = recipient_secret.public_key();

        let plaintext = b"auth message body";
        let shared_info = 200u16.to_be_bytes();

        let ciphertext = ecies_encrypt(&recipient_pub, plaintext, &shared_info);
        let decrypted = ecies_decrypt(&recipient_secret, &ciphertext, &shared_info).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_shared_info_fails_mac() {
        let recipient_secret = SecretKey::random(&mut rand::thread_rng());
        let recipient_pub = recipient_secret.public_key();

        let ciphertext = ecies_encrypt(&recipient_pub, b"hello", &100u16.to_be_bytes());
        let result = ecies_decrypt(&recipient_secret, &ciphertext, &999u16.to_be_bytes());

        assert_eq!(result, Err(EciesError::MacMismatch));
    }

    #[test]
    fn tampered_ciphertext_fails_mac() {
        let recipient_secret = SecretKey::random(&mut rand::thread_rng());
        let recipient_pub = recipient_secret.public_key();

        let mut ciphertext = ecies_encrypt(&recipient_pub, b"hello world", &[]);
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;

        assert_eq!(
            ecies_decrypt(&recipient_secret, &ciphertext, &[]),
            Err(EciesError::MacMismatch)
        );
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let recipient_secret = SecretKey::random(&mut rand::thread_rng());
        assert_eq!(
            ecies_decrypt(&recipient_secret, &[0u8; 10], &[]),
            Err(EciesError::Truncated)
        );
    }
}
