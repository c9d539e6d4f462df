//! Sync loop configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a running [`crate::application::SyncLoop`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often (in blocks) to flush account-layer state into the trie
    /// and verify the resulting root against the header.
    pub checkpoint_interval: u64,

    /// Chain ID used to build each block's execution context.
    pub chain_id: u64,

    /// Base URL of the JSON block-source provider, for the `sync`
    /// subcommand. Unused by the peer-channel (`mana`) path.
    pub provider_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1000,
            chain_id: 1,
            provider_url: None,
        }
    }
}

impl SyncConfig {
    /// A config with a short checkpoint interval, for tests and local
    /// development chains.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            checkpoint_interval: 10,
            chain_id: 1337,
            provider_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checkpoints_every_thousand_blocks() {
        let config = SyncConfig::default();
        assert_eq!(config.checkpoint_interval, 1000);
    }
}
