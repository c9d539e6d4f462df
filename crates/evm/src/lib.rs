//! # Smart contract execution
//!
//! Provides a sandboxed virtual machine (EVM) for executing deterministic smart
//! contract code. Manages gas metering, memory allocation, and state access while
//! ensuring isolation and security.
//!
//! ## Domain invariants
//!
//! Enforced in `domain/invariants.rs`: gas limit enforcement, deterministic
//! execution, no state change on revert, static-call purity, and a bounded
//! call depth.
//!
//! ## Execution safety limits
//!
//! | Limit | Value | Purpose |
//! |-------|-------|---------|
//! | `max_call_depth` | 1024 | Prevent stack overflow |
//! | `max_code_size` | 24 KB (EIP-170) | Limit contract size |
//! | `max_init_code_size` | 48 KB (EIP-3860) | Limit deployment code |
//! | `max_stack_size` | 1024 | EVM stack limit |
//! | `max_memory_size` | 16 MB | Memory expansion limit |
//! | `execution_timeout` | 5 seconds | Hard timeout |
//!
//! ## EVM components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Interpreter | `evm/interpreter.rs` | Main execution engine |
//! | Stack | `evm/stack.rs` | 1024-item stack |
//! | Memory | `evm/memory.rs` | Dynamic memory with gas |
//! | Gas | `evm/gas.rs` | Cost tables & calculations |
//! | Precompiles | `evm/precompiles/` | ecrecover, sha256, modexp |
//!
//! ## Usage example
//!
//! ```ignore
//! use evm::prelude::*;
//!
//! let result = api.execute_transaction(&tx, &block_context).await?;
//! if result.success {
//!     println!("Gas used: {}", result.gas_used);
//!     println!("Output: {:?}", result.output);
//! }
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod errors;
pub mod evm;
pub mod optimizer;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        AccountState, BlockContext, Config, ExecutionContext, ExecutionResult, Log,
        StateChange, VmConfig,
    };

    // Value objects
    pub use crate::domain::value_objects::{
        Address, Bytes, EcdsaSignature, GasCounter, Hash, StorageKey, StorageValue, U256,
    };

    // Domain services
    pub use crate::domain::services::{
        compute_contract_address, compute_contract_address_create2, estimate_base_gas, keccak256,
        precompiles,
    };

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, limits, InvariantCheckResult, InvariantViolation,
    };

    // Ports
    pub use crate::ports::inbound::{
        BatchExecutor, SignedTransaction, SmartContractApi, TransactionReceipt,
    };
    pub use crate::ports::outbound::{
        AccessList, AccessStatus, BlockHashOracle, SignatureVerifier, StateAccess,
    };

    // Errors
    pub use crate::errors::{PrecompileError, StateError, VmError};

    // EVM components
    pub use crate::evm::{
        gas, memory::Memory, opcodes::Opcode, stack::Stack, transient::TransientStorage,
        Interpreter,
    };

    // Adapters
    pub use crate::adapters::{InMemoryAccessList, InMemoryState, TrieBackedState};

    // Service
    pub use crate::service::{create_test_service, ServiceConfig, SmartContractService};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
