//! # Adapters Layer (Outer Hexagon)
//!
//! Adapters implement the domain's outbound ports: `StateAccess` and
//! `AccessList`, either over the real trie-backed account layer
//! (`account_layer_adapter`) or an in-memory double for tests
//! (`state_adapter`, `access_list`).

pub mod access_list;
pub mod account_layer_adapter;
pub mod state_adapter;

pub use access_list::*;
pub use account_layer_adapter::*;
pub use state_adapter::*;
