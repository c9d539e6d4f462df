//! JSON-RPC 2.0 envelope handling: parses a request (or a batch of them),
//! dispatches each to its handler, and echoes the caller's ID back
//! verbatim, per §6.

use crate::domain::error::ApiError;
use crate::domain::types::JsonRpcId;
use crate::rpc::RpcHandlers;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<JsonRpcId>,
}

/// A single JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub id: Option<JsonRpcId>,
}

impl JsonRpcResponse {
    fn ok(id: Option<JsonRpcId>, result: Value) -> Self {
        Self { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    fn err(id: Option<JsonRpcId>, error: ApiError) -> Self {
        Self { jsonrpc: "2.0", result: None, error: Some(error), id }
    }
}

/// Dispatches a single request to its handler and wraps the outcome in a
/// response envelope. A malformed request (missing/unrecognised method)
/// still gets an envelope back with `id` echoed, if one was present.
pub fn dispatch_single(handlers: &RpcHandlers, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    match route_method(handlers, &request.method, request.params.as_ref()) {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err(e) => JsonRpcResponse::err(id, e),
    }
}

/// Dispatches a batch of requests, one response per request, in order.
/// An empty batch is itself an invalid request per the JSON-RPC 2.0 spec.
pub fn dispatch_batch(handlers: &RpcHandlers, requests: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, ApiError> {
    if requests.is_empty() {
        return Err(ApiError::invalid_request("batch must not be empty"));
    }
    Ok(requests.into_iter().map(|r| dispatch_single(handlers, r)).collect())
}

fn route_method(handlers: &RpcHandlers, method: &str, params: Option<&Value>) -> Result<Value, ApiError> {
    use crate::domain::types::{BlockId, Bytes};

    let value = match method {
        "web3_clientVersion" => serde_json::json!(handlers.web3.client_version()?),
        "web3_sha3" => {
            let data: Bytes = parse_param(params, 0)?;
            serde_json::json!(handlers.web3.sha3(data)?)
        }
        "net_version" => serde_json::json!(handlers.net.version()?),
        "net_listening" => serde_json::json!(handlers.net.listening()?),
        "net_peerCount" => serde_json::json!(handlers.net.peer_count()?),
        "eth_blockNumber" => serde_json::json!(handlers.eth.block_number()?),
        "eth_getBalance" => {
            let address = parse_hex_array::<20>(params, 0)?;
            let block: BlockId = parse_param_optional(params, 1).unwrap_or_default();
            serde_json::json!(handlers.eth.get_balance(address, block)?)
        }
        "eth_getStorageAt" => {
            let address = parse_hex_array::<20>(params, 0)?;
            let slot = parse_hex_array::<32>(params, 1)?;
            let block: BlockId = parse_param_optional(params, 2).unwrap_or_default();
            serde_json::json!(handlers.eth.get_storage_at(address, slot, block)?)
        }
        "eth_getTransactionCount" => {
            let address = parse_hex_array::<20>(params, 0)?;
            let block: BlockId = parse_param_optional(params, 1).unwrap_or_default();
            serde_json::json!(handlers.eth.get_transaction_count(address, block)?)
        }
        "eth_getCode" => {
            let address = parse_hex_array::<20>(params, 0)?;
            let block: BlockId = parse_param_optional(params, 1).unwrap_or_default();
            serde_json::json!(handlers.eth.get_code(address, block)?)
        }
        "eth_getBlockByHash" => {
            let hash = parse_hex_array::<32>(params, 0)?;
            let full: bool = parse_param_optional(params, 1).unwrap_or(false);
            handlers.eth.get_block_by_hash(hash, full)?.unwrap_or(Value::Null)
        }
        "eth_getBlockByNumber" => {
            let block: BlockId = parse_param(params, 0)?;
            let full: bool = parse_param_optional(params, 1).unwrap_or(false);
            handlers.eth.get_block_by_number(block, full)?.unwrap_or(Value::Null)
        }
        "eth_getTransactionByHash" => {
            let hash = parse_hex_array::<32>(params, 0)?;
            handlers.eth.get_transaction_by_hash(hash)?.unwrap_or(Value::Null)
        }
        "eth_getTransactionReceipt" => {
            let hash = parse_hex_array::<32>(params, 0)?;
            handlers.eth.get_transaction_receipt(hash)?.unwrap_or(Value::Null)
        }
        "eth_syncing" => serde_json::to_value(handlers.eth.syncing()?).unwrap_or(Value::Null),
        _ => return Err(ApiError::method_not_found(method)),
    };
    Ok(value)
}

/// Parses a required positional parameter. Per JSON-RPC 2.0, `params` is
/// normally an array; a bare scalar is tolerated as a one-element array
/// for leniency with hand-written clients.
fn parse_param<T: serde::de::DeserializeOwned>(params: Option<&Value>, index: usize) -> Result<T, ApiError> {
    let param = params
        .and_then(|p| if p.is_array() { p.get(index) } else if index == 0 { Some(p) } else { None })
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {}", index)))?;

    serde_json::from_value(param.clone())
        .map_err(|e| ApiError::invalid_params(format!("invalid parameter at index {}: {}", index, e)))
}

/// Parses a `"0x..."`-prefixed hex string parameter into a fixed-size byte
/// array (an address or a hash) - the one shape `serde_json`'s blanket
/// array impl can't produce directly from a JSON string.
fn parse_hex_array<const N: usize>(params: Option<&Value>, index: usize) -> Result<[u8; N], ApiError> {
    let param = params
        .and_then(|p| if p.is_array() { p.get(index) } else if index == 0 { Some(p) } else { None })
        .ok_or_else(|| ApiError::invalid_params(format!("missing parameter at index {}", index)))?;

    let s = param
        .as_str()
        .ok_or_else(|| ApiError::invalid_params(format!("parameter at index {} must be a hex string", index)))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| ApiError::invalid_params(format!("invalid hex at index {}: {}", index, e)))?;
    if bytes.len() != N {
        return Err(ApiError::invalid_params(format!(
            "parameter at index {} must be {} bytes, got {}",
            index,
            N,
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Parses an optional positional parameter, `None` if absent or unparsable.
fn parse_param_optional<T: serde::de::DeserializeOwned>(params: Option<&Value>, index: usize) -> Option<T> {
    params
        .and_then(|p| if p.is_array() { p.get(index) } else if index == 0 { Some(p) } else { None })
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::GatewayConfig;
    use crate::rpc::eth::tests::FixtureChainReader;
    use std::sync::Arc;

    fn handlers() -> RpcHandlers {
        RpcHandlers::new(&GatewayConfig::default(), Arc::new(FixtureChainReader { height: 7, ..Default::default() }))
    }

    #[test]
    fn dispatches_block_number() {
        let request = JsonRpcRequest {
            jsonrpc: Some("2.0".to_string()),
            method: "eth_blockNumber".to_string(),
            params: None,
            id: Some(JsonRpcId::Number(1)),
        };
        let response = dispatch_single(&handlers(), request);
        assert_eq!(response.result.unwrap(), serde_json::json!("0x7"));
        assert_eq!(response.id, Some(JsonRpcId::Number(1)));
    }

    #[test]
    fn echoes_string_id_verbatim() {
        let request = JsonRpcRequest {
            jsonrpc: Some("2.0".to_string()),
            method: "net_version".to_string(),
            params: None,
            id: Some(JsonRpcId::String("req-1".to_string())),
        };
        let response = dispatch_single(&handlers(), request);
        assert_eq!(response.id, Some(JsonRpcId::String("req-1".to_string())));
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let request = JsonRpcRequest {
            jsonrpc: Some("2.0".to_string()),
            method: "eth_call".to_string(),
            params: None,
            id: Some(JsonRpcId::Number(1)),
        };
        let response = dispatch_single(&handlers(), request);
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn batch_dispatches_every_request_in_order() {
        let requests = vec![
            JsonRpcRequest {
                jsonrpc: Some("2.0".to_string()),
                method: "eth_blockNumber".to_string(),
                params: None,
                id: Some(JsonRpcId::Number(1)),
            },
            JsonRpcRequest {
                jsonrpc: Some("2.0".to_string()),
                method: "net_version".to_string(),
                params: None,
                id: Some(JsonRpcId::Number(2)),
            },
        ];
        let responses = dispatch_batch(&handlers(), requests).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id, Some(JsonRpcId::Number(1)));
        assert_eq!(responses[1].id, Some(JsonRpcId::Number(2)));
    }

    #[test]
    fn empty_batch_is_rejected() {
        let err = dispatch_batch(&handlers(), vec![]).unwrap_err();
        assert_eq!(err.code, -32600);
    }

    #[test]
    fn missing_required_param_is_invalid_params() {
        let request = JsonRpcRequest {
            jsonrpc: Some("2.0".to_string()),
            method: "eth_getBalance".to_string(),
            params: None,
            id: None,
        };
        let response = dispatch_single(&handlers(), request);
        assert_eq!(response.error.unwrap().code, -32602);
    }
}
