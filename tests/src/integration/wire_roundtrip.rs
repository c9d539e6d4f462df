//! Frame codec round-trip: encode then decode must recover the original
//! message, the way two sides of an established RLPx session would.

use peer_transport::domain::{Frame, FrameCodec};
use shared_crypto::keccak::Keccak256State;

fn seeded_mac() -> Keccak256State {
    let mut mac = Keccak256State::new();
    mac.update(&[0xffu8; 32]);
    mac
}

#[test]
fn encoded_frame_decodes_back_to_the_same_message() {
    let aes_secret = shared_crypto::keccak256(&[0u8]);
    let mac_secret = shared_crypto::keccak256(&[0u8]);

    let mut sender = FrameCodec::new(aes_secret, mac_secret, seeded_mac(), seeded_mac());
    let mut receiver = FrameCodec::new(aes_secret, mac_secret, seeded_mac(), seeded_mac());

    let frame = Frame {
        message_type: 8,
        data: vec![1, 2, 3, 4],
    };

    let wire = sender.encode_frame(&frame);
    let decoded = receiver.decode_frame(&wire).expect("frame must decode");

    assert_eq!(decoded, frame);
}

#[test]
fn tampered_body_fails_the_mac_check() {
    let aes_secret = shared_crypto::keccak256(&[0u8]);
    let mac_secret = shared_crypto::keccak256(&[0u8]);

    let mut sender = FrameCodec::new(aes_secret, mac_secret, seeded_mac(), seeded_mac());
    let mut receiver = FrameCodec::new(aes_secret, mac_secret, seeded_mac(), seeded_mac());

    let frame = Frame {
        message_type: 8,
        data: vec![1, 2, 3, 4],
    };

    let mut wire = sender.encode_frame(&frame);
    let last = wire.len() - 1;
    wire[last] ^= 0xff;

    assert!(receiver.decode_frame(&wire).is_err());
}
