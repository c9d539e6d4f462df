//! Wire types, method registry, configuration, and error handling for the
//! JSON-RPC surface.

pub mod config;
pub mod error;
pub mod methods;
pub mod types;

pub use config::{ChainConfig, GatewayConfig, LimitsConfig};
pub use error::{ApiError, ApiResult, GatewayError};
pub use methods::{is_method_supported, SUPPORTED_METHODS};
pub use types::*;
