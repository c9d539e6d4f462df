//! Header validation chained across `consensus`, `state`, and `bloom` the
//! way a sync loop actually composes them.

use bloom::{bloom_for_log, bloom_for_receipts};
use consensus::{DifficultyConfig, EthHeader, HeaderValidator};
use primitive_types::U256;

fn header(number: u64, timestamp: u64, difficulty: U256, gas_limit: u64, logs_bloom: [u8; 256]) -> EthHeader {
    EthHeader {
        parent_hash: [0u8; 32],
        ommers_hash: [0u8; 32],
        beneficiary: [0u8; 20],
        state_root: state::EMPTY_TRIE_ROOT,
        transactions_root: state::EMPTY_TRIE_ROOT,
        receipts_root: state::EMPTY_TRIE_ROOT,
        logs_bloom,
        difficulty,
        number,
        gas_limit,
        gas_used: 0,
        timestamp,
        extra_data: vec![],
        mix_hash: [0u8; 32],
        nonce: [0u8; 8],
    }
}

#[test]
fn genesis_header_matches_seed_vector() {
    let genesis = header(0, 0, U256::from(131_072u64), 200_000, [0u8; 256]);
    assert_eq!(genesis.difficulty, U256::from(131_072u64));
    assert_eq!(genesis.gas_limit, 200_000);
    assert_eq!(genesis.number, 0);
}

#[test]
fn ten_second_gap_child_validates_against_parent() {
    let validator = HeaderValidator::new(DifficultyConfig::default());
    let parent = header(0, 55, U256::from(131_072u64), 200_000, [0u8; 256]);
    let child = header(1, 65, U256::from(131_136u64), 200_000, [0u8; 256]);

    assert!(validator.validate(&child, &parent, 1_000_000_000).is_ok());
}

#[test]
fn wrong_difficulty_is_rejected() {
    let validator = HeaderValidator::new(DifficultyConfig::default());
    let parent = header(0, 55, U256::from(131_072u64), 200_000, [0u8; 256]);
    let child = header(1, 65, U256::from(999_999u64), 200_000, [0u8; 256]);

    assert!(validator.validate(&child, &parent, 1_000_000_000).is_err());
}

#[test]
fn receipt_blooms_fold_into_a_header_bloom_that_still_matches_every_log() {
    let log_a = bloom_for_log(&[0x11; 20], &[[0x22; 32]]);
    let log_b = bloom_for_log(&[0x33; 20], &[[0x44; 32], [0x55; 32]]);

    let header_bloom = bloom_for_receipts([&log_a, &log_b]);

    // The header bloom must never false-negative a bit any constituent log set.
    assert!(header_bloom.might_contain(&[0x11; 20]));
    assert!(header_bloom.might_contain(&[0x22; 32]));
    assert!(header_bloom.might_contain(&[0x33; 20]));
    assert!(header_bloom.might_contain(&[0x44; 32]));
    assert!(header_bloom.might_contain(&[0x55; 32]));
}
