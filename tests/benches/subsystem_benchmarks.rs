//! Throughput benchmarks for the hot paths: RLP codec, header validation,
//! and the bloom filter.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use consensus::{DifficultyConfig, EthHeader, HeaderValidator};
use primitive_types::U256;
use rlp::{Decodable, Encodable};

fn sample_header(number: u64, difficulty: U256) -> EthHeader {
    EthHeader {
        parent_hash: [0x11; 32],
        ommers_hash: [0x22; 32],
        beneficiary: [0x33; 20],
        state_root: [0x44; 32],
        transactions_root: [0x55; 32],
        receipts_root: [0x66; 32],
        logs_bloom: [0u8; 256],
        difficulty,
        number,
        gas_limit: 200_000,
        gas_used: 21_000,
        timestamp: number * 13,
        extra_data: vec![0xaa; 32],
        mix_hash: [0x77; 32],
        nonce: [0u8; 8],
    }
}

fn bench_header_rlp_roundtrip(c: &mut Criterion) {
    let header = sample_header(1, U256::from(131_072u64));
    c.bench_function("header_rlp_encode", |b| b.iter(|| black_box(header.rlp_bytes())));

    let encoded = header.rlp_bytes();
    c.bench_function("header_rlp_decode", |b| {
        b.iter(|| black_box(EthHeader::rlp_decode(&encoded).unwrap()))
    });
}

fn bench_header_validation(c: &mut Criterion) {
    let validator = HeaderValidator::new(DifficultyConfig::default());
    let parent = sample_header(99, U256::from(20_000_000u64));
    let mut child = sample_header(100, U256::from(20_000_000u64));
    child.timestamp = parent.timestamp + 13;

    c.bench_function("header_validate_against_parent", |b| {
        b.iter(|| black_box(validator.validate(&child, &parent, u64::MAX)))
    });
}

fn bench_bloom_folding(c: &mut Criterion) {
    use bloom::bloom_for_log;

    let logs: Vec<_> = (0..20u8)
        .map(|i| bloom_for_log(&[i; 20], &[[i; 32], [i.wrapping_add(1); 32]]))
        .collect();

    c.bench_function("bloom_fold_20_receipts", |b| {
        b.iter(|| black_box(bloom::bloom_for_receipts(logs.iter())))
    });
}

criterion_group!(benches, bench_header_rlp_roundtrip, bench_header_validation, bench_bloom_folding);
criterion_main!(benches);
