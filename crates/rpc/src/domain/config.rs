//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Configuration for the JSON-RPC surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listen address for the JSON-RPC endpoint.
    pub listen_addr: SocketAddr,
    /// Chain identity reported by `net_version` / the signature domain.
    pub chain: ChainConfig,
    /// Request handling limits.
    pub limits: LimitsConfig,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8545),
            chain: ChainConfig::default(),
            limits: LimitsConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Chain identity used to answer `net_version` and `web3_clientVersion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub client_version: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { chain_id: 1, client_version: super::super::client_version() }
    }
}

/// Size limits on requests the dispatcher will accept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of requests in a single JSON-RPC batch.
    pub max_batch_size: usize,
    /// Maximum serialized request body size, in bytes.
    pub max_request_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_batch_size: 100, max_request_bytes: 1024 * 1024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_8545() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr.port(), 8545);
    }

    #[test]
    fn default_chain_id_is_mainnet() {
        assert_eq!(ChainConfig::default().chain_id, 1);
    }
}
