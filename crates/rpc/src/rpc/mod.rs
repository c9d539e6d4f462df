//! One handler module per JSON-RPC namespace.

pub mod eth;
pub mod net;
pub mod web3;

pub use eth::EthRpc;
pub use net::NetRpc;
pub use web3::Web3Rpc;

use crate::domain::config::GatewayConfig;
use crate::ports::ChainReader;
use std::sync::Arc;

/// Every namespace's handlers, constructed once per [`GatewayConfig`] and
/// shared [`ChainReader`].
pub struct RpcHandlers {
    pub eth: EthRpc,
    pub web3: Web3Rpc,
    pub net: NetRpc,
}

impl RpcHandlers {
    pub fn new(config: &GatewayConfig, reader: Arc<dyn ChainReader>) -> Self {
        Self {
            eth: EthRpc::new(Arc::clone(&reader)),
            web3: Web3Rpc::new(config.chain.client_version.clone()),
            net: NetRpc::new(reader, config.chain.chain_id),
        }
    }
}
