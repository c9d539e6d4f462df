//! # Ports layer
//!
//! Trait definitions for smart contract execution: the interfaces between
//! the domain and the outside world.
//!
//! - **Driving ports (inbound)**: `SmartContractApi`, `BatchExecutor`
//! - **Driven ports (outbound)**: `StateAccess`, `AccessList`, `SignatureVerifier`, `BlockHashOracle`

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
