//! # Peer transport
//!
//! The RLPx peer-wire transport: an ECIES-encrypted auth/ack handshake
//! (`domain/ecies.rs`, `domain/handshake.rs`) establishes per-session AES
//! and MAC secrets, which the frame codec (`domain/frame.rs`) then uses to
//! encrypt and authenticate every message exchanged with a peer. Sessions
//! become active once both sides' `Hello` packets (`domain/session.rs`)
//! share at least one capability.
//!
//! ## Module structure
//!
//! ```text
//! domain/   - handshake, frame codec, session/capability state (pure, no I/O)
//! service/  - PeerSession: drives the handshake and Hello exchange over a
//!             real TCP socket, then frames application messages
//! ```
//!
//! ## Concurrency model
//!
//! One `PeerSession` per connected peer, each owned by its own task: a
//! peer's socket, handshake state, and frame codec never cross into
//! another peer's task. A session takes at most [`service::HANDSHAKE_TIMEOUT`]
//! to go from TCP accept/connect to an active `Hello` exchange, and
//! [`domain::PING_TIMEOUT`] of silence on an established session is treated
//! as a dead peer.
//!
//! ## Usage example
//!
//! ```rust,ignore
//! use peer_transport::{LocalIdentity, PeerSession};
//!
//! let stream = tokio::net::TcpStream::connect(addr).await?;
//! let mut session = PeerSession::connect(stream, &local_identity, &remote_static_pub).await?;
//! session.send(&Frame { message_type: 0x10, data: vec![] }).await?;
//! let reply = session.recv().await?;
//! ```

pub mod domain;
pub mod service;

pub use domain::{
    build_ack, build_auth, derive_secrets, ecies_decrypt, ecies_encrypt, parse_ack, parse_auth,
    AckBody, AuthBody, Capability, DisconnectReason, EciesError, Frame, FrameCodec, FrameError,
    HandshakeError, Hello, SessionSecrets, SessionState,
};
pub use service::{LocalIdentity, PeerSession, SessionError, HANDSHAKE_TIMEOUT};
