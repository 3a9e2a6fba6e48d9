//! Fixed-point stake mathematics
//!
//! All arithmetic is integer and every division truncates toward zero.
//! Products of two `u128` quantities go through `U256` intermediates and
//! are narrowed back after the scaling division.

use crate::error::StakingError;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for large intermediate values
    pub struct U256(4);
}

/// Unit weight of an unlocked stake of value 1.
pub const WEIGHT_MULT: u128 = 1_000_000;

/// Scale of the rewards-per-weight accumulators.
pub const REWARD_PER_WEIGHT_MULT: u128 = 1_000_000_000_000;

/// Weight multiplier applied to engine-created yield stakes.
pub const YEAR_WEIGHT_MULT: u128 = 2 * WEIGHT_MULT;

/// Maximum lock period: 730 days in seconds.
pub const MAX_LOCK: u64 = 730 * 24 * 60 * 60;

/// Bonus factor applied to migrated v1 weights.
pub const V1_WEIGHT_BONUS: u128 = 2;

/// v1 -> v2 weight translation ratio.
pub const V1_TO_V2_NUMERATOR: u128 = 1500;
pub const V1_TO_V2_DENOMINATOR: u128 = 1000;

/// Geometric decay applied by each emission ratio update: 3% per interval.
pub const EMISSION_DECAY_NUMERATOR: u64 = 97;
pub const EMISSION_DECAY_DENOMINATOR: u64 = 100;

impl U256 {
    /// Create U256 from u128
    pub const fn from_u128(val: u128) -> Self {
        U256([val as u64, (val >> 64) as u64, 0, 0])
    }

    /// Convert to u128, returning None if overflow
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[2] != 0 || self.0[3] != 0 {
            return None;
        }
        Some((self.0[1] as u128) << 64 | self.0[0] as u128)
    }
}

/// Weight of a stake of `value` locked from `locked_from` to `locked_until`.
///
/// `weight = value * ((until - from) * WEIGHT_MULT / MAX_LOCK + WEIGHT_MULT)`
///
/// A flexible stake (`locked_from == locked_until == 0`) weighs
/// `value * WEIGHT_MULT`; a full two-year lock weighs exactly twice that.
pub fn lock_weight(value: u64, locked_from: u64, locked_until: u64) -> Result<u128, StakingError> {
    if locked_until < locked_from {
        return Err(StakingError::InvalidLock);
    }
    let range = (locked_until - locked_from) as u128;
    let multiplier = range
        .checked_mul(WEIGHT_MULT)
        .ok_or(StakingError::MathOverflow)?
        / MAX_LOCK as u128
        + WEIGHT_MULT;
    (value as u128)
        .checked_mul(multiplier)
        .ok_or(StakingError::MathOverflow)
}

/// Reward earned by `weight` under a rewards-per-weight accumulator value.
///
/// `reward = weight * rewards_per_weight / REWARD_PER_WEIGHT_MULT`
pub fn weight_to_reward(weight: u128, rewards_per_weight: u128) -> Result<u128, StakingError> {
    let product = U256::from_u128(weight)
        .checked_mul(U256::from_u128(rewards_per_weight))
        .ok_or(StakingError::MathOverflow)?;
    (product / U256::from_u128(REWARD_PER_WEIGHT_MULT))
        .to_u128()
        .ok_or(StakingError::MathOverflow)
}

/// Accumulator delta contributed by distributing `reward` over
/// `global_weight`. Callers must never pass a zero weight.
pub fn reward_per_weight(reward: u128, global_weight: u128) -> Result<u128, StakingError> {
    if global_weight == 0 {
        return Err(StakingError::NoStakedWeight);
    }
    let scaled = U256::from_u128(reward)
        .checked_mul(U256::from_u128(REWARD_PER_WEIGHT_MULT))
        .ok_or(StakingError::MathOverflow)?;
    (scaled / U256::from_u128(global_weight))
        .to_u128()
        .ok_or(StakingError::MathOverflow)
}

/// Translate a legacy v1 weight into its v2 bonus weight.
///
/// `v2 = v1 * V1_WEIGHT_BONUS * 1500 / 1000`, applied as a single combined
/// factor so truncation happens once.
pub fn v1_to_v2_weight(v1_weight: u128) -> Result<u128, StakingError> {
    v1_weight
        .checked_mul(V1_WEIGHT_BONUS)
        .and_then(|w| w.checked_mul(V1_TO_V2_NUMERATOR))
        .ok_or(StakingError::MathOverflow)
        .map(|w| w / V1_TO_V2_DENOMINATOR)
}

/// Reward emitted to a pool over `elapsed` seconds.
///
/// `reward = elapsed * reward_per_second * pool_weight / factory_total_weight`
pub fn pool_emission(
    elapsed: u64,
    reward_per_second: u64,
    pool_weight: u32,
    factory_total_weight: u32,
) -> Result<u128, StakingError> {
    if factory_total_weight == 0 {
        return Err(StakingError::NoStakedWeight);
    }
    let product = U256::from(elapsed)
        .checked_mul(U256::from(reward_per_second))
        .and_then(|p| p.checked_mul(U256::from(pool_weight)))
        .ok_or(StakingError::MathOverflow)?;
    (product / U256::from(factory_total_weight))
        .to_u128()
        .ok_or(StakingError::MathOverflow)
}
