//! Ties difficulty retargeting and the header-field checks together into the
//! single entry point a sync loop calls per incoming header.

use primitive_types::U256;

use super::block_validation::{BlockValidationConfig, BlockValidationError, BlockValidator};
use super::difficulty::{BlockInfo, DifficultyCalculator, DifficultyConfig};
use super::eth_header::EthHeader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValidationError {
    /// Wraps the underlying duplicate/height/difficulty/timestamp checks.
    Block(BlockValidationError),
    NonSequentialNumber { expected: u64, got: u64 },
    GasLimitDrift { parent: u64, child: u64 },
    GasUsedExceedsLimit { used: u64, limit: u64 },
    ExtraDataTooLong { len: usize },
    TimestampNotAfterParent { parent: u64, child: u64 },
}

impl std::fmt::Display for HeaderValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block(e) => write!(f, "{e}"),
            Self::NonSequentialNumber { expected, got } => {
                write!(f, "header number {got} is not parent + 1 ({expected})")
            }
            Self::GasLimitDrift { parent, child } => {
                write!(f, "gas limit {child} drifted too far from parent {parent}")
            }
            Self::GasUsedExceedsLimit { used, limit } => {
                write!(f, "gas used {used} exceeds gas limit {limit}")
            }
            Self::ExtraDataTooLong { len } => write!(f, "extra_data is {len} bytes, max 32"),
            Self::TimestampNotAfterParent { parent, child } => {
                write!(f, "timestamp {child} does not exceed parent timestamp {parent}")
            }
        }
    }
}

impl std::error::Error for HeaderValidationError {}

impl From<BlockValidationError> for HeaderValidationError {
    fn from(e: BlockValidationError) -> Self {
        Self::Block(e)
    }
}

/// Maximum extra_data length, enforced since Homestead (EIP-?) to bound
/// header size.
const MAX_EXTRA_DATA_BYTES: usize = 32;

/// Gas limit may drift by at most `parent / 1024` per block, and must stay
/// at or above the protocol floor.
const GAS_LIMIT_ADJUSTMENT_DENOMINATOR: u64 = 1024;
const MIN_GAS_LIMIT: u64 = 5000;

pub struct HeaderValidator {
    block_validator: BlockValidator,
    difficulty: DifficultyCalculator,
}

impl HeaderValidator {
    pub fn new(difficulty_config: DifficultyConfig) -> Self {
        Self {
            block_validator: BlockValidator::new(BlockValidationConfig::default()),
            difficulty: DifficultyCalculator::new(difficulty_config),
        }
    }

    /// Validate `header` against its `parent` (`None` only for genesis,
    /// which this is never called on - the sync loop treats genesis as
    /// already trusted). `current_time` gates the future-timestamp check.
    pub fn validate(
        &self,
        header: &EthHeader,
        parent: &EthHeader,
        current_time: u64,
    ) -> Result<(), HeaderValidationError> {
        if header.number != parent.number + 1 {
            return Err(HeaderValidationError::NonSequentialNumber {
                expected: parent.number + 1,
                got: header.number,
            });
        }

        if header.timestamp <= parent.timestamp {
            return Err(HeaderValidationError::TimestampNotAfterParent {
                parent: parent.timestamp,
                child: header.timestamp,
            });
        }

        if header.extra_data.len() > MAX_EXTRA_DATA_BYTES {
            return Err(HeaderValidationError::ExtraDataTooLong {
                len: header.extra_data.len(),
            });
        }

        if header.gas_used > header.gas_limit {
            return Err(HeaderValidationError::GasUsedExceedsLimit {
                used: header.gas_used,
                limit: header.gas_limit,
            });
        }

        self.validate_gas_limit_drift(parent.gas_limit, header.gas_limit)?;

        self.block_validator
            .validate_timestamp(header.timestamp, current_time)
            .map_err(HeaderValidationError::from)?;

        let parent_info = BlockInfo {
            number: parent.number,
            timestamp: parent.timestamp,
            difficulty: parent.difficulty,
        };
        self.block_validator
            .validate_difficulty_formula(
                &self.difficulty,
                Some(&parent_info),
                header.number,
                header.timestamp,
                header.difficulty,
            )
            .map_err(HeaderValidationError::from)?;

        Ok(())
    }

    fn validate_gas_limit_drift(&self, parent: u64, child: u64) -> Result<(), HeaderValidationError> {
        if child < MIN_GAS_LIMIT {
            return Err(HeaderValidationError::GasLimitDrift { parent, child });
        }
        let max_delta = parent / GAS_LIMIT_ADJUSTMENT_DENOMINATOR;
        let delta = parent.abs_diff(child);
        if delta > max_delta {
            return Err(HeaderValidationError::GasLimitDrift { parent, child });
        }
        Ok(())
    }

    /// The difficulty required of a block at `number`/`timestamp` given its
    /// parent (or `None` for genesis).
    pub fn required_difficulty(&self, parent: Option<&EthHeader>, number: u64, timestamp: u64) -> U256 {
        let parent_info = parent.map(|p| BlockInfo {
            number: p.number,
            timestamp: p.timestamp,
            difficulty: p.difficulty,
        });
        self.difficulty.calculate(parent_info.as_ref(), number, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, timestamp: u64, difficulty: U256, gas_limit: u64) -> EthHeader {
        EthHeader {
            parent_hash: [0u8; 32],
            ommers_hash: [0u8; 32],
            beneficiary: [0u8; 20],
            state_root: [0u8; 32],
            transactions_root: [0u8; 32],
            receipts_root: [0u8; 32],
            logs_bloom: [0u8; 256],
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
    fn accepts_well_formed_successor() {
        let validator = HeaderValidator::new(DifficultyConfig::default());
        let parent = header(0, 0, U256::from(131_072u64), 200_000);
        let child = header(1, 13, U256::from(131_136u64), 200_000);
        assert!(validator.validate(&child, &parent, 1_000_000).is_ok());
    }

    #[test]
    fn rejects_non_sequential_number() {
        let validator = HeaderValidator::new(DifficultyConfig::default());
        let parent = header(0, 0, U256::from(131_072u64), 200_000);
        let child = header(2, 13, U256::from(131_072u64), 200_000);
        assert!(matches!(
            validator.validate(&child, &parent, 1_000_000),
            Err(HeaderValidationError::NonSequentialNumber { .. })
        ));
    }

    #[test]
    fn rejects_gas_limit_drift_beyond_1_over_1024() {
        let validator = HeaderValidator::new(DifficultyConfig::default());
        let parent = header(0, 0, U256::from(131_072u64), 200_000);
        let child = header(1, 13, U256::from(131_136u64), 400_000);
        assert!(matches!(
            validator.validate(&child, &parent, 1_000_000),
            Err(HeaderValidationError::GasLimitDrift { .. })
        ));
    }

    #[test]
    fn rejects_non_increasing_timestamp() {
        let validator = HeaderValidator::new(DifficultyConfig::default());
        let parent = header(0, 100, U256::from(131_072u64), 200_000);
        let child = header(1, 100, U256::from(131_072u64), 200_000);
        assert!(matches!(
            validator.validate(&child, &parent, 1_000_000),
            Err(HeaderValidationError::TimestampNotAfterParent { .. })
        ));
    }
}
