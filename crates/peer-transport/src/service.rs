//! Per-peer session driver.
//!
//! A [`PeerSession`] owns one TCP connection end to end: it runs the
//! ECIES auth/ack handshake, derives the session secrets, exchanges
//! `Hello`, and then reads and writes application frames over the
//! resulting [`FrameCodec`]. This is the "one task per peer" half of the
//! network domain - the session never reaches into another peer's state,
//! and talks to the rest of the node only through whatever channel its
//! caller wires its `send`/`recv` calls into.

use std::time::Duration;

use k256::{PublicKey, SecretKey};
use rlp::{Decodable, Encodable};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::{
    build_ack, build_auth, derive_secrets, parse_ack, parse_auth, Capability, EciesError, Frame,
    FrameCodec, FrameError, HandshakeError, Hello, SessionSecrets, SessionState, HEADER_BLOCK_LEN,
    PING_TIMEOUT,
};

/// Hard timeout from the start of the handshake to an active, `Hello`-negotiated
/// session. Matches the peer task's TCP-accept-to-active-session budget.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors a peer session can fail with. Every variant here is peer-fatal:
/// the caller drops the connection rather than retrying on the same
/// socket.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("handshake did not complete within {0:?}")]
    HandshakeTimeout(Duration),
    #[error(transparent)]
    Ecies(#[from] EciesError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("peer closed the connection")]
    ConnectionClosed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer's Hello shared no capability with ours")]
    UselessPeer,
    #[error("remote Hello did not decode: {0}")]
    MalformedHello(rlp::RlpError),
    #[error("no frame received within {0:?}")]
    PingTimeout(Duration),
}

/// This node's static identity and advertised protocol surface, used to
/// drive both sides of the handshake and the `Hello` it sends.
#[derive(Clone)]
pub struct LocalIdentity {
    pub static_secret: SecretKey,
    pub capabilities: Vec<Capability>,
    pub client_id: String,
    pub protocol_version: u64,
    pub listen_port: u16,
}

impl LocalIdentity {
    /// The 64-byte uncompressed public key this identity presents as its
    /// `node_id` in `Hello`.
    fn node_id(&self) -> [u8; 64] {
        let encoded = self.static_secret.public_key().to_encoded_point(false);
        let mut out = [0u8; 64];
        out.copy_from_slice(&encoded.as_bytes()[1..]);
        out
    }
}

fn random_nonce() -> [u8; 32] {
    use rand::RngCore;
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

fn decode_uncompressed_pub(coords: &[u8; 64]) -> Result<PublicKey, SessionError> {
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(coords);
    PublicKey::from_sec1_bytes(&sec1).map_err(|_| HandshakeError::InvalidKey.into())
}

/// Length-prefixed ECIES message: a 2-byte big-endian size followed by
/// exactly that many ciphertext bytes, mirroring the framing `build_auth`
/// and `build_ack` already produce.
async fn read_length_prefixed(stream: &mut TcpStream) -> Result<Vec<u8>, SessionError> {
    let mut size_prefix = [0u8; 2];
    stream.read_exact(&mut size_prefix).await?;
    let size = u16::from_be_bytes(size_prefix) as usize;
    let mut body = vec![0u8; size];
    stream.read_exact(&mut body).await?;
    let mut out = Vec::with_capacity(2 + size);
    out.extend_from_slice(&size_prefix);
    out.extend_from_slice(&body);
    Ok(out)
}

async fn send_frame(
    stream: &mut TcpStream,
    codec: &mut FrameCodec,
    frame: &Frame,
) -> Result<(), SessionError> {
    let wire = codec.encode_frame(frame);
    stream.write_all(&wire).await?;
    Ok(())
}

async fn recv_frame(stream: &mut TcpStream, codec: &mut FrameCodec) -> Result<Frame, SessionError> {
    let mut header_block = [0u8; HEADER_BLOCK_LEN];
    match stream.read_exact(&mut header_block).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(SessionError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }
    let body_size = codec.decode_header(&header_block)?;

    let mut body_block = vec![0u8; FrameCodec::body_wire_len(body_size)];
    stream.read_exact(&mut body_block).await?;
    Ok(codec.decode_body(&body_block, body_size)?)
}

/// An established, authenticated peer connection. Reads and writes are
/// framed over the session secrets derived during the handshake.
pub struct PeerSession {
    stream: TcpStream,
    codec: FrameCodec,
    /// The capability intersection negotiated with this peer.
    pub shared_capabilities: Vec<Capability>,
    /// The peer's own `Hello`, kept around for `client_id`/`node_id` lookups.
    pub remote_hello: Hello,
}

impl PeerSession {
    /// Run the initiator side: send `auth`, wait for `ack`, then negotiate
    /// `Hello`. Fails the whole handshake if it does not finish within
    /// [`HANDSHAKE_TIMEOUT`].
    pub async fn connect(
        stream: TcpStream,
        local: &LocalIdentity,
        remote_static_pub: &PublicKey,
    ) -> Result<Self, SessionError> {
        timeout(
            HANDSHAKE_TIMEOUT,
            Self::connect_inner(stream, local, remote_static_pub),
        )
        .await
        .map_err(|_| SessionError::HandshakeTimeout(HANDSHAKE_TIMEOUT))?
    }

    async fn connect_inner(
        mut stream: TcpStream,
        local: &LocalIdentity,
        remote_static_pub: &PublicKey,
    ) -> Result<Self, SessionError> {
        let ephemeral = SecretKey::random(&mut rand::thread_rng());
        let nonce_i = random_nonce();

        let auth_wire = build_auth(&local.static_secret, remote_static_pub, &ephemeral, &nonce_i);
        stream.write_all(&auth_wire).await?;
        debug!("sent auth, awaiting ack");

        let ack_wire = read_length_prefixed(&mut stream).await?;
        let ack = parse_ack(&local.static_secret, &ack_wire)?;
        let remote_ephemeral_pub = decode_uncompressed_pub(&ack.ephemeral_pub)?;

        let secrets = derive_secrets(
            &ephemeral,
            &remote_ephemeral_pub,
            &nonce_i,
            &ack.nonce,
            &auth_wire,
            &ack_wire,
            true,
        );

        Self::negotiate_hello(stream, secrets, local).await
    }

    /// Run the recipient side: wait for `auth`, reply with `ack`, then
    /// negotiate `Hello`. Same handshake timeout budget as [`Self::connect`].
    pub async fn accept(stream: TcpStream, local: &LocalIdentity) -> Result<Self, SessionError> {
        timeout(HANDSHAKE_TIMEOUT, Self::accept_inner(stream, local))
            .await
            .map_err(|_| SessionError::HandshakeTimeout(HANDSHAKE_TIMEOUT))?
    }

    async fn accept_inner(mut stream: TcpStream, local: &LocalIdentity) -> Result<Self, SessionError> {
        let auth_wire = read_length_prefixed(&mut stream).await?;
        let (auth, initiator_ephemeral_pub) = parse_auth(&local.static_secret, None, &auth_wire)?;
        debug!("received auth, replying with ack");

        let ephemeral = SecretKey::random(&mut rand::thread_rng());
        let nonce_r = random_nonce();
        let initiator_static_pub = decode_uncompressed_pub(&auth.static_pub)?;

        let ack_wire = build_ack(&initiator_static_pub, &ephemeral, &nonce_r);
        stream.write_all(&ack_wire).await?;

        let secrets = derive_secrets(
            &ephemeral,
            &initiator_ephemeral_pub,
            &auth.nonce,
            &nonce_r,
            &auth_wire,
            &ack_wire,
            false,
        );

        Self::negotiate_hello(stream, secrets, local).await
    }

    async fn negotiate_hello(
        mut stream: TcpStream,
        secrets: SessionSecrets,
        local: &LocalIdentity,
    ) -> Result<Self, SessionError> {
        let mut codec = FrameCodec::new(
            secrets.aes_secret,
            secrets.mac_secret,
            secrets.egress_mac,
            secrets.ingress_mac,
        );

        let hello = Hello {
            protocol_version: local.protocol_version,
            client_id: local.client_id.clone(),
            capabilities: local.capabilities.clone(),
            listen_port: local.listen_port,
            node_id: local.node_id(),
        };
        let hello_frame = Frame {
            message_type: 0x00,
            data: hello.rlp_bytes(),
        };
        send_frame(&mut stream, &mut codec, &hello_frame).await?;

        let frame = recv_frame(&mut stream, &mut codec).await?;
        let remote_hello = Hello::rlp_decode(&frame.data).map_err(SessionError::MalformedHello)?;

        match SessionState::on_hello_received(&local.capabilities, &remote_hello) {
            SessionState::Active { shared_capabilities } => {
                debug!(
                    client_id = %remote_hello.client_id,
                    shared = shared_capabilities.len(),
                    "session active"
                );
                Ok(Self {
                    stream,
                    codec,
                    shared_capabilities,
                    remote_hello,
                })
            }
            _ => {
                warn!(client_id = %remote_hello.client_id, "peer shares no capability, disconnecting");
                Err(SessionError::UselessPeer)
            }
        }
    }

    /// Send one application-level frame.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), SessionError> {
        send_frame(&mut self.stream, &mut self.codec, frame).await
    }

    /// Receive the next application-level frame, treating
    /// [`PING_TIMEOUT`] of silence as a dead peer.
    pub async fn recv(&mut self) -> Result<Frame, SessionError> {
        timeout(PING_TIMEOUT, recv_frame(&mut self.stream, &mut self.codec))
            .await
            .map_err(|_| SessionError::PingTimeout(PING_TIMEOUT))?
    }
}
