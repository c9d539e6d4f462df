//! The 2048-bit logs bloom folded into every block header and receipt.
//!
//! Every log's address and each of its topics contributes three set bits,
//! each the low 11 bits of a 16-bit window of the item's Keccak256 digest
//! (§3's "three distinct 11-bit slices"). A receipt's bloom is the union of
//! its logs' blooms; a header's bloom is the union of its receipts' blooms.
//!
//! ## Invariant
//!
//! No false negatives: `B(logs) ⊇ B({e})` bitwise for every `e` in `logs` —
//! once an item's bits are set, `might_contain` for that item always
//! returns `true`. False positives are inherent to a bloom filter and are
//! not a correctness defect.

pub mod domain;

pub use domain::{bloom_for_log, bloom_for_receipts, LogsBloom, BLOOM_BYTE_LENGTH};
