//! JSON-RPC surface over the protocol client's chain state.
//!
//! The contract this crate answers is narrow and synchronous: fifteen
//! read-only `eth_*`/`net_*`/`web3_*` methods, batched or single, over
//! plain HTTP, against whatever currently committed chain state a
//! [`ports::ChainReader`] exposes. Everything else a production JSON-RPC
//! gateway usually carries - `eth_call`, `eth_sendRawTransaction`, log
//! filters, WebSocket subscriptions, admin/debug/txpool namespaces - is out
//! of scope; unsupported methods fail closed with a JSON-RPC error rather
//! than being silently accepted.
//!
//! # Architecture
//!
//! - [`domain`] - wire types (`U256`, `Bytes`, `BlockId`, ...), the fixed
//!   method registry, error codes, and configuration.
//! - [`ports`] - [`ports::ChainReader`], the only thing the dispatcher
//!   depends on to answer a request.
//! - [`rpc`] - one handler module per JSON-RPC namespace (`eth`, `net`,
//!   `web3`), each a thin translation from wire types to a `ChainReader`
//!   call and back.
//! - [`router`] - JSON-RPC 2.0 envelope handling: single and batched
//!   requests, method dispatch, verbatim ID echoing.
//! - [`service`] - ties a `ChainReader` and a [`domain::GatewayConfig`]
//!   together into something an HTTP listener can drive.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod router;
pub mod rpc;
pub mod service;

pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use domain::methods::is_method_supported;
pub use ports::ChainReader;
pub use router::{dispatch_batch, dispatch_single, JsonRpcRequest, JsonRpcResponse};
pub use service::RpcService;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client version string for `web3_clientVersion`.
pub fn client_version() -> String {
    format!("QuantumChain/v{}/linux/rust", VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn client_version_names_the_client() {
        let version = client_version();
        assert!(version.starts_with("QuantumChain/"));
        assert!(version.contains(VERSION));
    }

    #[test]
    fn method_support_matches_the_registry() {
        assert!(is_method_supported("eth_getBalance"));
        assert!(is_method_supported("web3_clientVersion"));
        assert!(!is_method_supported("eth_sendRawTransaction"));
    }
}
