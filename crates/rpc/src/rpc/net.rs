//! `net_*` methods.

use crate::domain::error::ApiResult;
use crate::ports::ChainReader;
use std::sync::Arc;

/// `net_*` handlers.
pub struct NetRpc {
    reader: Arc<dyn ChainReader>,
    chain_id: u64,
}

impl NetRpc {
    pub fn new(reader: Arc<dyn ChainReader>, chain_id: u64) -> Self {
        Self { reader, chain_id }
    }

    /// `net_version`: the network ID, here the same value as the chain ID.
    pub fn version(&self) -> ApiResult<String> {
        Ok(self.chain_id.to_string())
    }

    /// `net_listening`.
    pub fn listening(&self) -> ApiResult<bool> {
        Ok(self.reader.is_listening())
    }

    /// `net_peerCount`.
    pub fn peer_count(&self) -> ApiResult<String> {
        Ok(format!("0x{:x}", self.reader.peer_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::eth::tests::FixtureChainReader;

    #[test]
    fn version_reports_chain_id() {
        let net = NetRpc::new(Arc::new(FixtureChainReader::default()), 1);
        assert_eq!(net.version().unwrap(), "1");
    }

    #[test]
    fn peer_count_is_hex_encoded() {
        let net = NetRpc::new(Arc::new(FixtureChainReader::default()), 1);
        assert_eq!(net.peer_count().unwrap(), "0x0");
    }
}
