//! Capability negotiation and session lifecycle, layered on top of the
//! frame codec. A session becomes active once both sides have exchanged
//! `Hello` and found at least one shared capability; otherwise it is
//! dropped as a `UselessPeer`.

use std::time::Duration;

use rlp::{Decodable, Encodable, RlpError, RlpItem};

/// How long a session may go without a pong before it is considered dead.
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// A single `(name, version)` capability the peer advertises support for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub version: u64,
}

impl Encodable for Capability {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::List(vec![
            RlpItem::Bytes(self.name.as_bytes().to_vec()),
            self.version.rlp_append(),
        ])
    }
}

impl Decodable for Capability {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let fields = match item {
            RlpItem::List(fields) if fields.len() == 2 => fields,
            _ => return Err(RlpError::UnexpectedList),
        };
        let name = match &fields[0] {
            RlpItem::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| RlpError::NonCanonicalLength)?,
            RlpItem::List(_) => return Err(RlpError::UnexpectedList),
        };
        let version = u64::rlp_parse(&fields[1])?;
        Ok(Capability { name, version })
    }
}

/// The `Hello` packet each side sends once framing is established.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hello {
    pub protocol_version: u64,
    pub client_id: String,
    pub capabilities: Vec<Capability>,
    pub listen_port: u16,
    pub node_id: [u8; 64],
}

impl Encodable for Hello {
    fn rlp_append(&self) -> RlpItem {
        RlpItem::List(vec![
            self.protocol_version.rlp_append(),
            RlpItem::Bytes(self.client_id.as_bytes().to_vec()),
            RlpItem::List(self.capabilities.iter().map(Encodable::rlp_append).collect()),
            (self.listen_port as u64).rlp_append(),
            RlpItem::Bytes(self.node_id.to_vec()),
        ])
    }
}

impl Decodable for Hello {
    fn rlp_parse(item: &RlpItem) -> Result<Self, RlpError> {
        let fields = match item {
            RlpItem::List(fields) if fields.len() == 5 => fields,
            _ => return Err(RlpError::UnexpectedList),
        };
        let protocol_version = u64::rlp_parse(&fields[0])?;
        let client_id = match &fields[1] {
            RlpItem::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| RlpError::NonCanonicalLength)?,
            RlpItem::List(_) => return Err(RlpError::UnexpectedList),
        };
        let capabilities = match &fields[2] {
            RlpItem::List(items) => items
                .iter()
                .map(Capability::rlp_parse)
                .collect::<Result<Vec<_>, _>>()?,
            RlpItem::Bytes(_) => return Err(RlpError::UnexpectedString),
        };
        let listen_port = u64::rlp_parse(&fields[3])? as u16;
        let node_id = match &fields[4] {
            RlpItem::Bytes(b) if b.len() == 64 => {
                let mut out = [0u8; 64];
                out.copy_from_slice(b);
                out
            }
            _ => return Err(RlpError::SizeOverflow),
        };
        Ok(Hello {
            protocol_version,
            client_id,
            capabilities,
            listen_port,
            node_id,
        })
    }
}

/// Why a session was torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    UselessPeer,
    PingTimeout,
    PeerDisconnected(u8),
    LocalDisconnected(u8),
}

/// The lifecycle state of a negotiated peer session.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHello,
    Active { shared_capabilities: Vec<Capability> },
    Closed(DisconnectReason),
}

impl SessionState {
    /// Apply a received `Hello`, computing the capability intersection
    /// against the ones the local side already advertised.
    pub fn on_hello_received(local_capabilities: &[Capability], remote: &Hello) -> Self {
        let shared: Vec<Capability> = local_capabilities
            .iter()
            .filter(|local| {
                remote
                    .capabilities
                    .iter()
                    .any(|r| r.name == local.name && r.version == local.version)
            })
            .cloned()
            .collect();

        if shared.is_empty() {
            SessionState::Closed(DisconnectReason::UselessPeer)
        } else {
            SessionState::Active {
                shared_capabilities: shared,
            }
        }
    }
}
