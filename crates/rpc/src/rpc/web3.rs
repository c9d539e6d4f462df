//! `web3_*` methods.

use crate::domain::error::ApiResult;
use crate::domain::types::Bytes;
use sha3::{Digest, Keccak256};

/// `web3_*` handlers. Stateless aside from the client version string.
pub struct Web3Rpc {
    client_version: String,
}

impl Web3Rpc {
    pub fn new(client_version: String) -> Self {
        Self { client_version }
    }

    /// `web3_clientVersion`.
    pub fn client_version(&self) -> ApiResult<String> {
        Ok(self.client_version.clone())
    }

    /// `web3_sha3`: Keccak-256 (not the standardized SHA3-256) of the input.
    pub fn sha3(&self, data: Bytes) -> ApiResult<String> {
        let mut hasher = Keccak256::new();
        hasher.update(data.as_slice());
        let result = hasher.finalize();
        Ok(format!("0x{}", hex::encode(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_version_round_trips() {
        let web3 = Web3Rpc::new("QuantumChain/v0.1.0/linux/rust".to_string());
        assert!(web3.client_version().unwrap().contains("QuantumChain"));
    }

    #[test]
    fn sha3_of_empty_matches_known_digest() {
        let web3 = Web3Rpc::new("test".to_string());
        let result = web3.sha3(Bytes::new()).unwrap();
        assert_eq!(result, "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
    }

    #[test]
    fn sha3_of_hello_matches_known_digest() {
        let web3 = Web3Rpc::new("test".to_string());
        let result = web3.sha3(Bytes::from_slice(b"hello")).unwrap();
        assert_eq!(result, "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8");
    }
}
