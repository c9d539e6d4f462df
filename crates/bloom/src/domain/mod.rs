//! Domain layer: the 2048-bit logs bloom folded into every block header
//! and receipt.

pub mod logs_bloom;

pub use logs_bloom::{bloom_for_log, bloom_for_receipts, LogsBloom, BLOOM_BYTE_LENGTH};
