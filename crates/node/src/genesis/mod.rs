//! Genesis block creation and chain initialization.
//!
//! The genesis header has height 0, a zero parent hash, and an empty
//! transactions/state root unless a premine `alloc` is supplied.

pub mod builder;

pub use builder::{GenesisBuilder, GenesisConfig, GenesisError};
