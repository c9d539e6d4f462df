//! Error types for the block synchronization loop.

use consensus::HeaderValidationError;
use thiserror::Error;

/// 32-byte hash alias, matching the header/state-root representation used
/// throughout `consensus` and `state`.
pub type Hash = [u8; 32];

/// Everything that can go wrong driving blocks from a [`crate::ports::outbound::BlockSource`]
/// into validated, committed state.
///
/// Per the loop's retry policy: [`Self::HeaderValidation`], [`Self::StateRootMismatch`],
/// and [`Self::BackingStoreIo`] are never retried. The loop logs them, performs one
/// final commit of the last good state, and propagates the error to the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A header failed one of `consensus::HeaderValidator`'s checks against
    /// its parent.
    #[error("header validation failed at height {height}: {source}")]
    HeaderValidation {
        height: u64,
        #[source]
        source: HeaderValidationError,
    },

    /// The state root computed after applying a block's transactions does
    /// not match the header's declared `state_root`.
    #[error("state root mismatch at height {height}: header says {expected:?}, computed {got:?}")]
    StateRootMismatch {
        height: u64,
        expected: Hash,
        got: Hash,
    },

    /// A transaction's sender nonce did not match the account's current
    /// nonce when applying a block.
    #[error("nonce mismatch applying tx {tx_hash:?} in block {height}: {source}")]
    InvalidTransaction {
        height: u64,
        tx_hash: Hash,
        #[source]
        source: evm::prelude::VmError,
    },

    /// ECDSA recovery of a transaction's sender failed.
    #[error("sender recovery failed for tx {tx_hash:?} in block {height}")]
    SenderRecoveryFailed { height: u64, tx_hash: Hash },

    /// The backing store (trie database / checkpoint store) failed a read
    /// or write. Never silently retried - surfaced so the caller can decide
    /// whether to restart from the last checkpoint.
    #[error("backing store I/O error: {0}")]
    BackingStoreIo(String),

    /// The block source (provider HTTP endpoint, peer channel) returned an
    /// error fetching a header or body.
    #[error("block source error: {0}")]
    SourceUnavailable(String),

    /// A requested block height was not yet available from the source.
    #[error("block {height} not yet available from source")]
    BlockNotAvailable { height: u64 },

    /// The source's reported chain tip regressed below our last committed
    /// height, which should never happen for an honest single source.
    #[error("source chain tip {tip} is behind our last committed height {committed}")]
    TipRegressed { tip: u64, committed: u64 },
}
