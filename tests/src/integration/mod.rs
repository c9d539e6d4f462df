//! Cross-crate integration tests: each test exercises more than one crate
//! the way the sync loop actually would (decode a header, validate it,
//! fold it into the bloom filter, frame it for the wire).

mod header_pipeline;
mod wire_roundtrip;
