//! Cross-crate integration tests.
//!
//! ```bash
//! cargo test -p eth-core-tests
//! cargo bench -p eth-core-tests
//! ```

pub mod integration;
