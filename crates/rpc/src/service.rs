//! HTTP entry point for the JSON-RPC surface: a single POST endpoint that
//! accepts either one request object or a batch array, per §6.

use crate::domain::error::GatewayError;
use crate::ports::ChainReader;
use crate::router::{dispatch_batch, dispatch_single, JsonRpcRequest, JsonRpcResponse};
use crate::rpc::RpcHandlers;
use crate::GatewayConfig;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// The JSON-RPC HTTP service: configuration plus the handlers it dispatches
/// every request through.
pub struct RpcService {
    config: GatewayConfig,
    handlers: Arc<RpcHandlers>,
}

impl RpcService {
    /// Builds the service. The caller supplies whatever backs chain reads -
    /// a live node's trie and sync loop in production, a fixture in tests.
    pub fn new(config: GatewayConfig, reader: Arc<dyn ChainReader>) -> Self {
        let handlers = Arc::new(RpcHandlers::new(&config, reader));
        Self { config, handlers }
    }

    fn router(&self) -> Router {
        Router::new().route("/", post(handle_request)).with_state(Arc::clone(&self.handlers))
    }

    /// Binds `config.listen_addr` and serves JSON-RPC requests until the
    /// process is asked to shut down.
    pub async fn run(self) -> Result<(), GatewayError> {
        let addr: SocketAddr = self.config.listen_addr;
        info!(%addr, "starting JSON-RPC service");
        let listener =
            tokio::net::TcpListener::bind(addr).await.map_err(|e| GatewayError::Bind(e.to_string()))?;
        axum::serve(listener, self.router()).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(())
    }
}

async fn handle_request(State(handlers): State<Arc<RpcHandlers>>, body: Json<Value>) -> impl IntoResponse {
    match body.0 {
        Value::Array(items) => {
            let requests: Result<Vec<JsonRpcRequest>, _> =
                items.into_iter().map(serde_json::from_value).collect();
            match requests {
                Ok(requests) => match dispatch_batch(&handlers, requests) {
                    Ok(responses) => (StatusCode::OK, Json(serde_json::json!(responses))),
                    Err(e) => (
                        StatusCode::OK,
                        Json(serde_json::json!(JsonRpcResponse {
                            jsonrpc: "2.0",
                            result: None,
                            error: Some(e),
                            id: None,
                        })),
                    ),
                },
                Err(e) => (
                    StatusCode::OK,
                    Json(serde_json::json!(JsonRpcResponse {
                        jsonrpc: "2.0",
                        result: None,
                        error: Some(crate::domain::error::ApiError::invalid_request(e.to_string())),
                        id: None,
                    })),
                ),
            }
        }
        single => match serde_json::from_value::<JsonRpcRequest>(single) {
            Ok(request) => (StatusCode::OK, Json(serde_json::json!(dispatch_single(&handlers, request)))),
            Err(e) => (
                StatusCode::OK,
                Json(serde_json::json!(JsonRpcResponse {
                    jsonrpc: "2.0",
                    result: None,
                    error: Some(crate::domain::error::ApiError::invalid_request(e.to_string())),
                    id: None,
                })),
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::eth::tests::FixtureChainReader;

    #[test]
    fn router_builds_without_panicking() {
        let service = RpcService::new(GatewayConfig::default(), Arc::new(FixtureChainReader::default()));
        let _router = service.router();
    }
}
