//! # Domain layer for peer transport
//!
//! Pure business logic with no I/O. This is the innermost layer of the
//! hexagonal architecture: the ECIES primitives, the auth/ack handshake,
//! the frame codec, and capability/session negotiation all live here with
//! no dependency on sockets.
//!
//! ## Contents
//!
//! - **ecies**: ECIES encrypt/decrypt over secp256k1 (`ecies.rs`)
//! - **handshake**: auth/ack body encoding and session secret derivation (`handshake.rs`)
//! - **frame**: the encrypted, MAC'd message frame codec (`frame.rs`)
//! - **session**: `Hello` exchange and capability negotiation (`session.rs`)

mod ecies;
mod frame;
mod handshake;
mod session;

pub use ecies::{ecies_decrypt, ecies_encrypt, EciesError};
pub use frame::{Frame, FrameCodec, FrameError, HEADER_BLOCK_LEN};
pub use handshake::{
    build_ack, build_auth, derive_secrets, parse_ack, parse_auth, AckBody, AuthBody,
    HandshakeError, SessionSecrets,
};
pub use session::{Capability, DisconnectReason, Hello, SessionState, PING_TIMEOUT};
