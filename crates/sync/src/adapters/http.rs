//! Provider-URL block source for the `sync` subcommand.
//!
//! The peer wire format (RLP-encoded blocks over `eth/63`) is out of scope
//! here; a provider URL is a JSON endpoint, and its schema isn't specified.
//! This adapter assumes the simplest shape that still carries the real
//! wire encoding end to end: `GET {base}/tip` returns `{"height": u64}`,
//! `GET {base}/block/{height}` returns `{"rlp": "0x..."}` (hex of the
//! RLP-encoded `[header, transactions, ommers]` list) or 404 if the height
//! isn't available yet.

use async_trait::async_trait;
use consensus::EthBlock;
use rlp::Decodable;
use serde::Deserialize;

use crate::domain::SyncError;
use crate::ports::outbound::BlockSource;

#[derive(Deserialize)]
struct TipResponse {
    height: u64,
}

#[derive(Deserialize)]
struct BlockResponse {
    rlp: String,
}

/// Polls a JSON-over-HTTP provider for chain tip and block bodies.
pub struct HttpBlockSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlockSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BlockSource for HttpBlockSource {
    async fn chain_tip(&self) -> Result<u64, SyncError> {
        let url = format!("{}/tip", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?
            .json::<TipResponse>()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        Ok(response.height)
    }

    async fn block_at(&self, height: u64) -> Result<Option<EthBlock>, SyncError> {
        let url = format!("{}/block/{height}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?
            .json::<BlockResponse>()
            .await
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;

        let bytes = hex::decode(body.rlp.trim_start_matches("0x"))
            .map_err(|e| SyncError::SourceUnavailable(format!("malformed rlp hex: {e}")))?;
        let block = EthBlock::rlp_decode(&bytes)
            .map_err(|e| SyncError::SourceUnavailable(format!("malformed block rlp: {e}")))?;
        Ok(Some(block))
    }
}
