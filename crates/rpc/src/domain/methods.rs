//! The fixed method registry: every JSON-RPC method the core answers
//! synchronously, per §6.

/// The full set of supported methods. Anything outside this list is
/// rejected with a "method not found" error rather than forwarded anywhere.
pub const SUPPORTED_METHODS: &[&str] = &[
    "web3_clientVersion",
    "web3_sha3",
    "net_version",
    "net_listening",
    "net_peerCount",
    "eth_blockNumber",
    "eth_getBalance",
    "eth_getStorageAt",
    "eth_getTransactionCount",
    "eth_getBlockByHash",
    "eth_getBlockByNumber",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "eth_getCode",
    "eth_syncing",
];

/// Whether the dispatcher recognises a method name.
pub fn is_method_supported(method: &str) -> bool {
    SUPPORTED_METHODS.contains(&method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_methods_are_supported() {
        assert!(is_method_supported("eth_getBalance"));
        assert!(is_method_supported("eth_syncing"));
        assert!(is_method_supported("web3_clientVersion"));
    }

    #[test]
    fn unknown_methods_are_rejected() {
        assert!(!is_method_supported("eth_call"));
        assert!(!is_method_supported("eth_sendRawTransaction"));
        assert!(!is_method_supported("admin_peers"));
    }
}
