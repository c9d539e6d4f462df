//! Block header and transaction validation, difficulty retargeting.
//!
//! Three layers, each usable on its own:
//!
//! - [`EthHeader`]/[`EthBlock`] - the wire format, with RLP and the
//!   `Keccak(RLP(header))` hash.
//! - [`EthTransaction`] - signed transaction wire format, intrinsic gas,
//!   and ECDSA sender recovery.
//! - [`HeaderValidator`] - the per-block check a sync loop runs against a
//!   header and its already-trusted parent: sequential numbering, gas
//!   limit drift, timestamp monotonicity, and the difficulty retargeting
//!   formula from [`DifficultyCalculator`].

pub mod domain;

pub use domain::{
    BlockInfo, BlockValidationConfig, BlockValidationError, BlockValidator, BombDelayActivation,
    DifficultyCalculator, DifficultyConfig, EthBlock, EthHeader, EthTransaction,
    HeaderValidationError, HeaderValidator, LogsBloom, TransactionError, ValidationResult,
    ValidationWarning,
};
