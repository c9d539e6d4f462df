//! Node runtime library: genesis construction and named chain specs shared
//! between the `sync` and `mana` entry points in `main.rs`.

pub mod chainspec;
pub mod genesis;

pub use chainspec::Chain;
pub use genesis::{GenesisBuilder, GenesisConfig, GenesisError};
