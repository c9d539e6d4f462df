//! Abstract interfaces the state layer depends on.
//!
//! Per spec S1, the trie's backing key/value store is an abstract interface
//! with three operations (`get`/`put`/`delete`); the CLI/database choice that
//! implements it is an external collaborator.

pub mod database;

pub use database::*;
