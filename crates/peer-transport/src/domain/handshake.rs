//! The ECIES auth/ack handshake and session-secret derivation.
//!
//! One round trip: the initiator sends an `auth` message encrypted to the
//! recipient's static public key; the recipient replies with `ack`
//! encrypted to the initiator's. Both sides then derive identical AES and
//! MAC secrets from the two ephemeral keys' ECDH shared point and the two
//! nonces, without either secret ever crossing the wire.

use k256::ecdh::diffie_hellman;
use k256::{PublicKey, SecretKey};
use shared_crypto::ecdsa::{recover_public_key, Secp256k1RecoverableSignature};
use shared_crypto::keccak::{keccak256, keccak256_concat, Keccak256State};
use thiserror::Error;

use super::ecies::{ecies_decrypt, ecies_encrypt, EciesError};

const VERSION: u8 = 4;
const AUTH_BODY_LEN: usize = 65 + 32 + 64 + 32 + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error(transparent)]
    Ecies(#[from] EciesError),
    #[error("auth/ack body has the wrong length")]
    MalformedBody,
    #[error("could not recover the initiator's ephemeral public key from the auth signature")]
    RecoveryFailed,
    #[error("static or ephemeral public key bytes are not a valid secp256k1 point")]
    InvalidKey,
}

/// The plaintext `auth` body: `sign(e_priv, s xor n_i) || Keccak(e_pub) ||
/// static_pub_i || n_i || version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthBody {
    pub signature: Secp256k1RecoverableSignature,
    pub ephemeral_pub_hash: [u8; 32],
    pub static_pub: [u8; 64],
    pub nonce: [u8; 32],
    pub version: u8,
}

impl AuthBody {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(AUTH_BODY_LEN);
        out.extend_from_slice(&self.signature.to_bytes());
        out.extend_from_slice(&self.ephemeral_pub_hash);
        out.extend_from_slice(&self.static_pub);
        out.extend_from_slice(&self.nonce);
        out.push(self.version);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandshakeError> {
        if bytes.len() != AUTH_BODY_LEN {
            return Err(HandshakeError::MalformedBody);
        }
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&bytes[..64]);
        let recovery_id = bytes[64];
        let signature = Secp256k1RecoverableSignature::from_parts(rs, recovery_id)
            .map_err(|_| HandshakeError::MalformedBody)?;

        let mut ephemeral_pub_hash = [0u8; 32];
        ephemeral_pub_hash.copy_from_slice(&bytes[65..97]);
        let mut static_pub = [0u8; 64];
        static_pub.copy_from_slice(&bytes[97..161]);
        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&bytes[161..193]);
        let version = bytes[193];

        Ok(AuthBody {
            signature,
            ephemeral_pub_hash,
            static_pub,
            nonce,
            version,
        })
    }
}

/// The plaintext `ack` body: `e_pub_r || n_r || version`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckBody {
    pub ephemeral_pub: [u8; 64],
    pub nonce: [u8; 32],
    pub version: u8,
}

const ACK_BODY_LEN: usize = 64 + 32 + 1;

impl AckBody {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ACK_BODY_LEN);
        out.extend_from_slice(&self.ephemeral_pub);
        out.extend_from_slice(&self.nonce);
        out.push(self.version);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HandshakeError> {
        if bytes.len() != ACK_BODY_LEN {
            return Err(HandshakeError::MalformedBody);
        }
        let mut ephemeral_pub = [0u8; 64];
        ephemeral_pub.copy_from_slice(&bytes[..64]);
        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&bytes[64..96]);
        Ok(AckBody {
            ephemeral_pub,
            nonce,
            version: bytes[96],
        })
    }
}

fn uncompressed_coordinates(pub_key: &PublicKey) -> [u8; 64] {
    let encoded = pub_key.to_encoded_point(false);
    let mut out = [0u8; 64];
    out.copy_from_slice(&encoded.as_bytes()[1..]);
    out
}

fn static_shared_secret(local_secret: &SecretKey, remote_pub: &PublicKey) -> [u8; 32] {
    let point = diffie_hellman(local_secret.to_nonzero_scalar(), remote_pub.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(point.raw_secret_bytes().as_slice());
    out
}

fn xor32(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// Build and ECIES-encrypt the initiator's `auth` message.
pub fn build_auth(
    static_secret: &SecretKey,
    recipient_static_pub: &PublicKey,
    ephemeral_secret: &SecretKey,
    nonce_initiator: &[u8; 32],
) -> Vec<u8> {
    let s = static_shared_secret(static_secret, recipient_static_pub);
    let digest = xor32(&s, nonce_initiator);

    let ephemeral_pub = ephemeral_secret.public_key();
    let ephemeral_coords = uncompressed_coordinates(&ephemeral_pub);
    let ephemeral_pub_hash = keccak256(&ephemeral_coords);

    let signing_key = shared_crypto::ecdsa::Secp256k1KeyPair::from_bytes(
        ephemeral_secret.to_bytes().into(),
    )
    .expect("ephemeral key bytes are always a valid scalar");
    let signature = signing_key.sign_recoverable(&digest);

    let static_pub = uncompressed_coordinates(&static_secret.public_key());

    let body = AuthBody {
        signature,
        ephemeral_pub_hash,
        static_pub,
        nonce: *nonce_initiator,
        version: VERSION,
    };
    let plaintext = body.to_bytes();

    let overhead = 65 + 16 + 32; // ephemeral pub + iv + mac, on top of the plaintext length
    let auth_size = (plaintext.len() + overhead) as u16;

    let mut out = Vec::new();
    out.extend_from_slice(&auth_size.to_be_bytes());
    out.extend_from_slice(&ecies_encrypt(
        recipient_static_pub,
        &plaintext,
        &auth_size.to_be_bytes(),
    ));
    out
}

/// Decrypt and parse an `auth` message (the recipient's side), recovering
/// the initiator's ephemeral public key from its embedded signature.
pub fn parse_auth(
    recipient_static_secret: &SecretKey,
    initiator_static_pub_hint: Option<&PublicKey>,
    wire_bytes: &[u8],
) -> Result<(AuthBody, PublicKey), HandshakeError> {
    if wire_bytes.len() < 2 {
        return Err(HandshakeError::MalformedBody);
    }
    let (size_prefix, ciphertext) = wire_bytes.split_at(2);

    let plaintext = ecies_decrypt(recipient_static_secret, ciphertext, size_prefix)?;
    let body = AuthBody::from_bytes(&plaintext)?;

    let initiator_static_pub = match initiator_static_pub_hint {
        Some(pub_key) => *pub_key,
        None => {
            let mut sec1 = [0u8; 65];
            sec1[0] = 0x04;
            sec1[1..].copy_from_slice(&body.static_pub);
            PublicKey::from_sec1_bytes(&sec1).map_err(|_| HandshakeError::InvalidKey)?
        }
    };

    let s = static_shared_secret(recipient_static_secret, &initiator_static_pub);
    let digest = xor32(&s, &body.nonce);

    let recovered = recover_public_key(&digest, &body.signature).map_err(|_| HandshakeError::RecoveryFailed)?;
    let coords = recovered
        .to_uncompressed_coordinates()
        .map_err(|_| HandshakeError::RecoveryFailed)?;

    if keccak256(&coords) != body.ephemeral_pub_hash {
        return Err(HandshakeError::RecoveryFailed);
    }

    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(&coords);
    let ephemeral_pub = PublicKey::from_sec1_bytes(&sec1).map_err(|_| HandshakeError::InvalidKey)?;

    Ok((body, ephemeral_pub))
}

/// Build and ECIES-encrypt the recipient's `ack` message.
pub fn build_ack(
    initiator_static_pub: &PublicKey,
    ephemeral_secret: &SecretKey,
    nonce_recipient: &[u8; 32],
) -> Vec<u8> {
    let ephemeral_pub = uncompressed_coordinates(&ephemeral_secret.public_key());
    let body = AckBody {
        ephemeral_pub,
        nonce: *nonce_recipient,
        version: VERSION,
    };
    let plaintext = body.to_bytes();

    let overhead = 65 + 16 + 32;
    let ack_size = (plaintext.len() + overhead) as u16;

    let mut out = Vec::new();
    out.extend_from_slice(&ack_size.to_be_bytes());
    out.extend_from_slice(&ecies_encrypt(
        initiator_static_pub,
        &plaintext,
        &ack_size.to_be_bytes(),
    ));
    out
}

/// Decrypt and parse an `ack` message (the initiator's side).
pub fn parse_ack(
    initiator_static_secret: &SecretKey,
    wire_bytes: &[u8],
) -> Result<AckBody, HandshakeError> {
    if wire_bytes.len() < 2 {
        return Err(HandshakeError::MalformedBody);
    }
    let (size_prefix, ciphertext) = wire_bytes.split_at(2);
    let plaintext = ecies_decrypt(initiator_static_secret, ciphertext, size_prefix)?;
    AckBody::from_bytes(&plaintext)
}

/// The derived session secrets and seeded running MAC states, from the
/// Yellow-Paper's secrets construction.
pub struct SessionSecrets {
    pub aes_secret: [u8; 32],
    pub mac_secret: [u8; 32],
    pub egress_mac: Keccak256State,
    pub ingress_mac: Keccak256State,
}

/// Derive the session secrets. `is_initiator` controls which nonce/message
/// pair seeds the egress vs. ingress MAC (the two sides are mirror images
/// of each other).
#[allow(clippy::too_many_arguments)]
pub fn derive_secrets(
    local_ephemeral_secret: &SecretKey,
    remote_ephemeral_pub: &PublicKey,
    nonce_initiator: &[u8; 32],
    nonce_recipient: &[u8; 32],
    auth_bytes: &[u8],
    ack_bytes: &[u8],
    is_initiator: bool,
) -> SessionSecrets {
    let point = diffie_hellman(
        local_ephemeral_secret.to_nonzero_scalar(),
        remote_ephemeral_pub.as_affine(),
    );
    let mut ephemeral_shared = [0u8; 32];
    ephemeral_shared.copy_from_slice(point.raw_secret_bytes().as_slice());

    let nonce_hash = keccak256_concat(&[nonce_recipient, nonce_initiator]);
    let shared_secret = keccak256_concat(&[&ephemeral_shared, &nonce_hash]);
    let aes_secret = keccak256_concat(&[&ephemeral_shared, &shared_secret]);
    let mac_secret = keccak256_concat(&[&ephemeral_shared, &aes_secret]);

    let egress_seed_nonce = if is_initiator { nonce_recipient } else { nonce_initiator };
    let ingress_seed_nonce = if is_initiator { nonce_initiator } else { nonce_recipient };
    let egress_seed_message = if is_initiator { auth_bytes } else { ack_bytes };
    let ingress_seed_message = if is_initiator { ack_bytes } else { auth_bytes };

    let mut egress_mac = Keccak256State::new();
    egress_mac.update(&xor32(&mac_secret, egress_seed_nonce));
    egress_mac.update(egress_seed_message);

    let mut ingress_mac = Keccak256State::new();
    ingress_mac.update(&xor32(&mac_secret, ingress_seed_nonce));
    ingress_mac.update(ingress_seed_message);

    SessionSecrets {
        aes_secret,
        mac_secret,
        egress_mac,
        ingress_mac,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_secret() -> SecretKey {
        SecretKey::random(&mut rand::thread_rng())
    }

    #[test]
    fn auth_round_trips_and_recovers_ephemeral_key() {
        let initiator_static = random_secret();
        let recipient_static = random_secret();
        let initiator_ephemeral = random_secret();
        let nonce_i = [0x11u8; 32];

        let auth_wire = build_auth(
            &initiator_static,
            &recipient_static.public_key(),
            &initiator_ephemeral,
            &nonce_i,
        );

        let (body, recovered_ephemeral) =
            parse_auth(&recipient_static, Some(&initiator_static.public_key()), &auth_wire).unwrap();

        assert_eq!(body.nonce, nonce_i);
        assert_eq!(
            recovered_ephemeral.to_encoded_point(false).as_bytes(),
            initiator_ephemeral.public_key().to_encoded_point(false).as_bytes()
        );
    }

    #[test]
    fn ack_round_trips() {
        let initiator_static = random_secret();
        let recipient_ephemeral = random_secret();
        let nonce_r = [0x22u8; 32];

        let ack_wire = build_ack(
            &initiator_static.public_key(),
            &recipient_ephemeral,
            &nonce_r,
        );

        let body = parse_ack(&initiator_static, &ack_wire).unwrap();
        assert_eq!(body.nonce, nonce_r);
        assert_eq!(
            body.ephemeral_pub,
            uncompressed_coordinates(&recipient_ephemeral.public_key())
        );
    }

    #[test]
    fn both_sides_derive_identical_secrets() {
        let initiator_ephemeral = random_secret();
        let recipient_ephemeral = random_secret();
        let nonce_i = [0x01u8; 32];
        let nonce_r = [0x02u8; 32];
        let auth_bytes = b"auth-placeholder".to_vec();
        let ack_bytes = b"ack-placeholder".to_vec();

        let initiator_secrets = derive_secrets(
            &initiator_ephemeral,
            &recipient_ephemeral.public_key(),
            &nonce_i,
            &nonce_r,
            &auth_bytes,
            &ack_bytes,
            true,
        );
        let recipient_secrets = derive_secrets(
            &recipient_ephemeral,
            &initiator_ephemeral.public_key(),
            &nonce_i,
            &nonce_r,
            &auth_bytes,
            &ack_bytes,
            false,
        );

        assert_eq!(initiator_secrets.aes_secret, recipient_secrets.aes_secret);
        assert_eq!(initiator_secrets.mac_secret, recipient_secrets.mac_secret);
        assert_eq!(
            initiator_secrets.egress_mac.digest(),
            recipient_secrets.ingress_mac.digest()
        );
        assert_eq!(
            initiator_secrets.ingress_mac.digest(),
            recipient_secrets.egress_mac.digest()
        );
    }
}
