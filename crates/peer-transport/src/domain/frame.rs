//! The RLPx frame codec: splits each message into a 16-byte encrypted
//! header plus an encrypted, MAC'd body, using the AES/MAC secrets
//! [`super::handshake::derive_secrets`] produced.
//!
//! The two running MAC states are append-only Keccak states - one per
//! direction - seeded once at handshake completion and never reset for the
//! life of the session.

use shared_crypto::aes_modes::{aes256_ctr_xor, aes256_ecb_encrypt_block};
use shared_crypto::keccak::Keccak256State;
use thiserror::Error;
use rlp::{decode, encode, RlpItem};

const HEADER_LEN: usize = 16;
const HEADER_DATA_LEN: usize = 13;
const MAC_LEN: usize = 16;

/// Bytes on the wire occupied by the encrypted header plus its MAC, i.e.
/// how much a reader must buffer before [`FrameCodec::decode_header`] can
/// run.
pub const HEADER_BLOCK_LEN: usize = HEADER_LEN + MAC_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is shorter than the fixed header/MAC overhead")]
    Truncated,
    #[error("header MAC does not match")]
    HeaderMacMismatch,
    #[error("body MAC does not match")]
    BodyMacMismatch,
    #[error("frame body is not a well-formed (type, data) pair")]
    MalformedBody,
}

/// A decoded application-level message: a message type tag plus its raw
/// payload bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub message_type: u8,
    pub data: Vec<u8>,
}

impl Frame {
    fn to_body_plaintext(&self) -> Vec<u8> {
        let item = RlpItem::List(vec![
            RlpItem::Bytes(vec![self.message_type]),
            RlpItem::Bytes(self.data.clone()),
        ]);
        encode(&item)
    }

    fn from_body_plaintext(bytes: &[u8]) -> Result<Self, FrameError> {
        let item = decode(bytes).map_err(|_| FrameError::MalformedBody)?;
        let fields = match item {
            RlpItem::List(fields) if fields.len() == 2 => fields,
            _ => return Err(FrameError::MalformedBody),
        };
        let message_type = match &fields[0] {
            RlpItem::Bytes(b) if b.len() == 1 => b[0],
            _ => return Err(FrameError::MalformedBody),
        };
        let data = match &fields[1] {
            RlpItem::Bytes(b) => b.clone(),
            _ => return Err(FrameError::MalformedBody),
        };
        Ok(Frame { message_type, data })
    }
}

fn mac_mix(mac_secret: &[u8; 32], running: &Keccak256State) -> [u8; 16] {
    let digest = running.digest();
    let mut seed = [0u8; 16];
    seed.copy_from_slice(&digest[..16]);
    let encrypted = aes256_ecb_encrypt_block(mac_secret, &seed);
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = seed[i] ^ encrypted[i];
    }
    out
}

fn pad_to_block(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let remainder = out.len() % 16;
    if remainder != 0 {
        out.resize(out.len() + (16 - remainder), 0);
    }
    out
}

/// One direction's worth of frame (en|de)coding state: the AES-CTR key
/// shared by header and body, the MAC key, and the running MAC digest.
pub struct FrameCodec {
    aes_secret: [u8; 32],
    mac_secret: [u8; 32],
    egress_mac: Keccak256State,
    ingress_mac: Keccak256State,
}

impl FrameCodec {
    pub fn new(
        aes_secret: [u8; 32],
        mac_secret: [u8; 32],
        egress_mac: Keccak256State,
        ingress_mac: Keccak256State,
    ) -> Self {
        Self {
            aes_secret,
            mac_secret,
            egress_mac,
            ingress_mac,
        }
    }

    /// Encrypt and frame an outbound message, advancing the egress MAC.
    pub fn encode_frame(&mut self, frame: &Frame) -> Vec<u8> {
        let body_plaintext = frame.to_body_plaintext();
        let body_padded = pad_to_block(&body_plaintext);

        let mut header = [0u8; HEADER_LEN];
        let body_size = body_plaintext.len() as u32;
        header[0] = (body_size >> 16) as u8;
        header[1] = (body_size >> 8) as u8;
        header[2] = body_size as u8;
        // header_data: reserved RLP-encoded protocol/context, empty here.
        let header_data = encode(&RlpItem::List(vec![]));
        let n = header_data.len().min(HEADER_DATA_LEN);
        header[3..3 + n].copy_from_slice(&header_data[..n]);

        let header_iv = [0u8; 16];
        let mut header_ct = header;
        aes256_ctr_xor(&self.aes_secret, &header_iv, &mut header_ct);

        self.egress_mac.update(&header_ct);
        let header_mac = mac_mix(&self.mac_secret, &self.egress_mac);
        self.egress_mac.update(&header_mac);

        let body_iv = [0u8; 16];
        let mut body_ct = body_padded;
        aes256_ctr_xor(&self.aes_secret, &body_iv, &mut body_ct);

        self.egress_mac.update(&body_ct);
        let body_mac_full = self.egress_mac.digest();
        let mut body_mac = [0u8; 16];
        body_mac.copy_from_slice(&body_mac_full[..16]);
        self.egress_mac.update(&body_mac);

        let mut out = Vec::with_capacity(HEADER_LEN + MAC_LEN + body_ct.len() + MAC_LEN);
        out.extend_from_slice(&header_ct);
        out.extend_from_slice(&header_mac);
        out.extend_from_slice(&body_ct);
        out.extend_from_slice(&body_mac);
        out
    }

    /// Decrypt and verify an inbound frame, advancing the ingress MAC.
    pub fn decode_frame(&mut self, wire: &[u8]) -> Result<Frame, FrameError> {
        if wire.len() < HEADER_LEN + MAC_LEN {
            return Err(FrameError::Truncated);
        }
        let (header_block, rest) = wire.split_at(HEADER_LEN + MAC_LEN);
        let body_size = self.decode_header(header_block)?;
        self.decode_body(rest, body_size)
    }

    /// Decrypt and verify just the fixed-size header block (the 16-byte
    /// encrypted header plus its 16-byte MAC), returning the body length it
    /// announces. Lets a stream reader learn how many more bytes to read
    /// before the body can be decoded, without buffering the whole frame
    /// up front.
    pub fn decode_header(&mut self, header_block: &[u8]) -> Result<usize, FrameError> {
        if header_block.len() != HEADER_LEN + MAC_LEN {
            return Err(FrameError::Truncated);
        }
        let (header_ct, header_mac) = header_block.split_at(HEADER_LEN);

        self.ingress_mac.update(header_ct);
        let expected_header_mac = mac_mix(&self.mac_secret, &self.ingress_mac);
        self.ingress_mac.update(&expected_header_mac);
        if expected_header_mac != header_mac {
            return Err(FrameError::HeaderMacMismatch);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(header_ct);
        let header_iv = [0u8; 16];
        aes256_ctr_xor(&self.aes_secret, &header_iv, &mut header);
        let body_size = ((header[0] as usize) << 16) | ((header[1] as usize) << 8) | header[2] as usize;
        Ok(body_size)
    }

    /// Decrypt and verify the body block (the padded ciphertext plus its
    /// trailing 16-byte MAC) that follows a header decoded via
    /// [`Self::decode_header`].
    pub fn decode_body(&mut self, body_block: &[u8], body_size: usize) -> Result<Frame, FrameError> {
        if body_block.len() < MAC_LEN {
            return Err(FrameError::Truncated);
        }
        let (body_ct, body_mac) = body_block.split_at(body_block.len() - MAC_LEN);

        self.ingress_mac.update(body_ct);
        let expected_body_mac_full = self.ingress_mac.digest();
        let mut expected_body_mac = [0u8; 16];
        expected_body_mac.copy_from_slice(&expected_body_mac_full[..16]);
        self.ingress_mac.update(&expected_body_mac);
        if expected_body_mac != body_mac {
            return Err(FrameError::BodyMacMismatch);
        }

        let mut body_padded = body_ct.to_vec();
        let body_iv = [0u8; 16];
        aes256_ctr_xor(&self.aes_secret, &body_iv, &mut body_padded);

        if body_size > body_padded.len() {
            return Err(FrameError::Truncated);
        }
        Frame::from_body_plaintext(&body_padded[..body_size])
    }

    /// Number of ciphertext bytes [`Self::decode_body`] expects for a given
    /// announced body size (padded to the AES block size, plus its MAC).
    pub fn body_wire_len(body_size: usize) -> usize {
        let remainder = body_size % 16;
        let padded = if remainder == 0 { body_size } else { body_size + (16 - remainder) };
        padded + MAC_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_codec() -> (FrameCodec, FrameCodec) {
        let aes_secret = shared_crypto::keccak::keccak256(&[0u8]);
        let mac_secret = shared_crypto::keccak::keccak256(&[0u8]);

        let mut seed = Keccak256State::new();
        seed.update(&[0xFFu8; 32]);

        let sender = FrameCodec::new(aes_secret, mac_secret, seed.clone(), seed.clone());
        let receiver = FrameCodec::new(aes_secret, mac_secret, seed.clone(), seed);
        (sender, receiver)
    }

    #[test]
    fn frame_round_trips_with_seeded_macs() {
        let (mut sender, mut receiver) = seeded_codec();

        let frame = Frame {
            message_type: 8,
            data: vec![1, 2, 3, 4],
        };

        let wire = sender.encode_frame(&frame);
        let decoded = receiver.decode_frame(&wire).unwrap();

        assert_eq!(decoded.message_type, 8);
        assert_eq!(decoded.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn header_mac_matches_recomputed_expected_mac() {
        let aes_secret = shared_crypto::keccak::keccak256(&[0u8]);
        let mac_secret = shared_crypto::keccak::keccak256(&[0u8]);
        let mut seed = Keccak256State::new();
        seed.update(&[0xFFu8; 32]);

        let mut sender = FrameCodec::new(aes_secret, mac_secret, seed.clone(), seed.clone());
        let frame = Frame {
            message_type: 8,
            data: vec![1, 2, 3, 4],
        };
        let wire = sender.encode_frame(&frame);

        let mut expected_mac_state = seed.clone();
        expected_mac_state.update(&wire[..HEADER_LEN]);
        let expected_header_mac = mac_mix(&mac_secret, &expected_mac_state);

        assert_eq!(&wire[HEADER_LEN..HEADER_LEN + MAC_LEN], &expected_header_mac);
    }

    #[test]
    fn tampered_body_fails_mac() {
        let (mut sender, mut receiver) = seeded_codec();
        let frame = Frame {
            message_type: 1,
            data: vec![9, 9, 9],
        };
        let mut wire = sender.encode_frame(&frame);
        let last = wire.len() - 1;
        wire[last] ^= 0xFF;

        assert_eq!(receiver.decode_frame(&wire), Err(FrameError::BodyMacMismatch));
    }

    #[test]
    fn split_header_then_body_decode_matches_decode_frame() {
        let (mut sender, mut receiver) = seeded_codec();
        let frame = Frame {
            message_type: 5,
            data: vec![10, 20, 30],
        };
        let wire = sender.encode_frame(&frame);

        let (header_block, body_block) = wire.split_at(HEADER_BLOCK_LEN);
        let body_size = receiver.decode_header(header_block).unwrap();
        assert_eq!(body_block.len(), FrameCodec::body_wire_len(body_size));
        let decoded = receiver.decode_body(body_block, body_size).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn mac_state_advances_and_is_never_reset() {
        let (mut sender, mut receiver) = seeded_codec();
        let frame_a = Frame {
            message_type: 2,
            data: vec![1],
        };
        let frame_b = Frame {
            message_type: 3,
            data: vec![2],
        };

        let wire_a = sender.encode_frame(&frame_a);
        let wire_b = sender.encode_frame(&frame_b);

        assert_eq!(receiver.decode_frame(&wire_a).unwrap(), frame_a);
        assert_eq!(receiver.decode_frame(&wire_b).unwrap(), frame_b);
    }
}
