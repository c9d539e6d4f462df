//! Proof-of-work difficulty retargeting.
//!
//! Unlike the epoch-based and Dark Gravity Wave adjusters this workspace also
//! carries, this implements the exact per-block formula used by the
//! reference chain: a pre-Homestead and post-Homestead adjustment term plus
//! an exponential "ice age" term that forces difficulty up every 100,000
//! blocks, offset by a bomb-delay schedule so later hardforks can push the
//! ice age back out without resetting it.
//!
//! **Difficulty is a CEILING on the block hash, not a floor** - contrary to
//! the "target" framing used by `qc-17-block-production`'s DGW adjuster,
//! here the stored quantity increases with mining difficulty.

use primitive_types::U256;

/// A hardfork's bomb-delay activation: from `activation_block` onward, the
/// ice-age exponent is computed against `number - delay` instead of `number`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BombDelayActivation {
    pub activation_block: u64,
    pub delay: u64,
}

/// Difficulty retargeting configuration for a chain.
#[derive(Clone, Debug)]
pub struct DifficultyConfig {
    /// Genesis difficulty (131072 on the reference chain).
    pub initial_difficulty: U256,
    /// Floor below which difficulty never drops, regardless of the formula.
    pub minimum_difficulty: U256,
    /// Block number at which the post-Homestead adjustment term activates.
    pub homestead_block: u64,
    /// Bomb-delay schedule, ordered by ascending `activation_block`. The
    /// delay in effect for a given block is the last entry whose
    /// `activation_block` is `<=` that block.
    pub bomb_delays: Vec<BombDelayActivation>,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: U256::from(131_072u64),
            minimum_difficulty: U256::from(131_072u64),
            homestead_block: 1_150_000,
            bomb_delays: vec![BombDelayActivation {
                activation_block: 4_370_000,
                delay: 3_000_000,
            }],
        }
    }
}

impl DifficultyConfig {
    fn bomb_delay_for(&self, number: u64) -> u64 {
        self.bomb_delays
            .iter()
            .filter(|a| a.activation_block <= number)
            .map(|a| a.delay)
            .last()
            .unwrap_or(0)
    }
}

/// The parent header fields a difficulty calculation depends on.
#[derive(Clone, Copy, Debug)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
    pub difficulty: U256,
}

/// Computes the required difficulty for a child block given its parent.
#[derive(Clone)]
pub struct DifficultyCalculator {
    config: DifficultyConfig,
}

impl DifficultyCalculator {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    /// Difficulty required of the block at `child_number`/`child_timestamp`
    /// whose parent is `parent`. Pass `parent = None` for the genesis block.
    pub fn calculate(
        &self,
        parent: Option<&BlockInfo>,
        child_number: u64,
        child_timestamp: u64,
    ) -> U256 {
        let parent = match parent {
            None => return self.config.initial_difficulty,
            Some(p) => p,
        };

        let x = parent.difficulty / U256::from(2048u64);

        let sigma = if child_number >= self.config.homestead_block {
            self.homestead_sigma(parent.timestamp, child_timestamp)
        } else {
            self.frontier_sigma(parent.timestamp, child_timestamp)
        };

        let adjustment = signed_mul(x, sigma);
        let epsilon = self.ice_age_term(child_number);

        let unclamped = signed_add(parent.difficulty, signed_add(adjustment, epsilon));
        unclamped.max(self.config.minimum_difficulty)
    }

    /// Pre-Homestead: `sigma = 1` if the block arrived within 13 seconds of
    /// its parent, else `-1`.
    fn frontier_sigma(&self, parent_timestamp: u64, child_timestamp: u64) -> i64 {
        if child_timestamp < parent_timestamp.saturating_add(13) {
            1
        } else {
            -1
        }
    }

    /// Post-Homestead: `sigma = max(1 - floor((ts - parent.ts) / 10), -99)`.
    fn homestead_sigma(&self, parent_timestamp: u64, child_timestamp: u64) -> i64 {
        let elapsed = child_timestamp.saturating_sub(parent_timestamp);
        let step = (elapsed / 10) as i64;
        (1 - step).max(-99)
    }

    /// `epsilon = floor(2 ^ (floor(number' / 100000) - 2))` where `number'`
    /// is `number` offset by whatever bomb delay is active at that height.
    /// Clamped to zero below the first ice-age period (the exponent would
    /// otherwise be negative).
    fn ice_age_term(&self, number: u64) -> U256 {
        let delay = self.config.bomb_delay_for(number);
        let effective_number = number.saturating_sub(delay);
        let period = effective_number / 100_000;

        if period < 2 {
            return U256::zero();
        }

        U256::from(2u64).pow(U256::from(period - 2))
    }
}

/// `x` is always `parent.difficulty / 2048`, far below `i64::MAX` for any
/// difficulty a real chain reaches, so a plain `i64` product is exact.
fn signed_mul(value: U256, factor: i64) -> i64 {
    value.low_u64() as i64 * factor
}

/// Add a possibly-negative `i64` delta to a `U256`, saturating at zero.
fn signed_add(base: U256, delta: i64) -> U256 {
    if delta >= 0 {
        base.saturating_add(U256::from(delta as u64))
    } else {
        base.saturating_sub(U256::from(delta.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DifficultyConfig {
        DifficultyConfig {
            initial_difficulty: U256::from(131_072u64),
            minimum_difficulty: U256::from(131_072u64),
            homestead_block: 1_150_000,
            bomb_delays: vec![],
        }
    }

    #[test]
    fn genesis_uses_initial_difficulty() {
        let calc = DifficultyCalculator::new(config());
        assert_eq!(calc.calculate(None, 0, 0), U256::from(131_072u64));
    }

    #[test]
    fn ten_second_gap_retargets_up_pre_homestead() {
        let calc = DifficultyCalculator::new(config());
        let parent = BlockInfo {
            number: 0,
            timestamp: 55,
            difficulty: U256::from(131_072u64),
        };

        let next = calc.calculate(Some(&parent), 1, 65);
        assert_eq!(next, U256::from(131_136u64));
    }

    #[test]
    fn slow_block_retargets_down_pre_homestead() {
        let calc = DifficultyCalculator::new(config());
        let parent = BlockInfo {
            number: 0,
            timestamp: 0,
            difficulty: U256::from(131_072u64),
        };

        // 20 seconds: >= parent.timestamp + 13, so sigma = -1.
        let next = calc.calculate(Some(&parent), 1, 20);
        assert_eq!(next, U256::from(131_072u64 - 64));
    }

    #[test]
    fn difficulty_never_drops_below_minimum() {
        let mut cfg = config();
        cfg.minimum_difficulty = U256::from(131_072u64);
        let calc = DifficultyCalculator::new(cfg);

        let parent = BlockInfo {
            number: 0,
            timestamp: 0,
            difficulty: U256::from(131_072u64),
        };

        let next = calc.calculate(Some(&parent), 1, 10_000);
        assert_eq!(next, U256::from(131_072u64));
    }

    #[test]
    fn ice_age_term_is_zero_before_first_period() {
        let calc = DifficultyCalculator::new(config());
        assert_eq!(calc.ice_age_term(199_999), U256::zero());
        assert_eq!(calc.ice_age_term(200_000), U256::from(1u64));
        assert_eq!(calc.ice_age_term(300_000), U256::from(2u64));
    }

    #[test]
    fn bomb_delay_schedule_pushes_ice_age_back() {
        let cfg = DifficultyConfig {
            bomb_delays: vec![BombDelayActivation {
                activation_block: 4_370_000,
                delay: 3_000_000,
            }],
            ..config()
        };
        let calc = DifficultyCalculator::new(cfg);

        // Without the delay this would already be well past the first ice
        // age period; with the 3,000,000-block delay it is not.
        assert_eq!(calc.ice_age_term(4_370_000), U256::zero());
    }

    #[test]
    fn homestead_sigma_caps_at_minus_99() {
        let calc = DifficultyCalculator::new(config());
        assert_eq!(calc.homestead_sigma(0, 100_000), -99);
    }

    #[test]
    fn homestead_sigma_matches_frontier_for_on_time_blocks() {
        let calc = DifficultyCalculator::new(config());
        assert_eq!(calc.homestead_sigma(0, 9), 1);
    }
}
