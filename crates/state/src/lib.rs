//! # state
//!
//! Account and storage state for the protocol client: a Patricia Merkle
//! Trie over accounts, keyed by `Keccak(address)`, with per-account storage
//! tries keyed by `Keccak(slot)`, plus a journaled account layer that
//! transaction execution reads and writes through before committing to the
//! trie.
//!
//! ## Modules
//!
//! - [`domain::trie`]: `PatriciaMerkleTrie` — hex-prefix nibble paths,
//!   leaf/extension/branch nodes, content-addressed by `Keccak(RLP(node))`.
//! - [`domain::account_layer`]: `AccountLayer` — the three-level
//!   storage/account cache with snapshot/revert/commit used during block
//!   and transaction execution.
//! - [`ports`]: abstract backing-store interfaces (`TrieDatabase`,
//!   `SnapshotStorage`) the trie is generic over.
//! - [`adapters`]: reference in-memory implementations of those ports.
//!
//! ## Invariants
//!
//! - Balance is non-negative and modular over 2^256; transfers that would
//!   underflow are rejected rather than wrapping.
//! - Nonce increments by exactly 1 per processed transaction and never
//!   wraps past `u64::MAX`.
//! - The state root is a pure function of account contents: two tries built
//!   from the same account set hash identically regardless of insertion
//!   order.

#![warn(missing_docs)]
#![allow(missing_docs)] // TODO: Add documentation for all public items

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ports::*;
