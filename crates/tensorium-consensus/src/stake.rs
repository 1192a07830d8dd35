// Node tier classification and logarithmic stake weighting
// Every stake-weighted path in the core routes through log_stake()

use serde::{Deserialize, Serialize};
use tensorium_core::constants::staking::{
    FULL_NODE_STAKE, LOG_STAKE_SCALE, SUPER_VALIDATOR_STAKE, VALIDATOR_MIN_STAKE,
};

/// Deterministic integer square root (Newton's method).
///
/// Identical on every platform: u128 arithmetic only, no floating point.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) >> 1;
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x
}

/// Effective weight of a raw stake: `floor(sqrt(stake)) * LOG_STAKE_SCALE`.
///
/// The scale is chosen so that one whole token maps to one whole token of
/// weight; doubling the stake yields ~1.414x the weight. Selection, reward
/// distribution, aggregation and pro-rata slashing all weight stake through
/// this single function — no path may read `raw_stake` for weighting.
pub fn log_stake(stake: u128) -> u128 {
    isqrt(stake).saturating_mul(LOG_STAKE_SCALE)
}

/// Node tier levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeTier {
    /// Sync and relay only; shares in tx-fee relay, no emission
    Light = 0,
    /// Full validation; infrastructure pool
    Full = 1,
    /// Weight consensus participant; validator pool, may produce blocks
    Validator = 2,
    /// Validator with priority block-production slot
    Super = 3,
}

impl NodeTier {
    /// Minimum raw stake for this tier
    pub fn min_stake(&self) -> u128 {
        match self {
            NodeTier::Light => 0,
            NodeTier::Full => FULL_NODE_STAKE,
            NodeTier::Validator => VALIDATOR_MIN_STAKE,
            NodeTier::Super => SUPER_VALIDATOR_STAKE,
        }
    }

    /// Classify a raw stake into a tier
    pub fn from_stake(stake: u128) -> Self {
        if stake >= SUPER_VALIDATOR_STAKE {
            NodeTier::Super
        } else if stake >= VALIDATOR_MIN_STAKE {
            NodeTier::Validator
        } else if stake >= FULL_NODE_STAKE {
            NodeTier::Full
        } else {
            NodeTier::Light
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeTier::Light => "Light",
            NodeTier::Full => "Full",
            NodeTier::Validator => "Validator",
            NodeTier::Super => "Super",
        }
    }

    /// Whether this tier may produce blocks
    pub fn can_produce_blocks(&self) -> bool {
        matches!(self, NodeTier::Validator | NodeTier::Super)
    }

    /// Whether this tier draws from the infrastructure pool
    pub fn receives_infrastructure_rewards(&self) -> bool {
        matches!(self, NodeTier::Full)
    }

    /// Whether this tier draws from the validator pool
    pub fn receives_validator_rewards(&self) -> bool {
        matches!(self, NodeTier::Validator | NodeTier::Super)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorium_core::constants::tokenomics::ONE_TOKEN;

    #[test]
    fn test_isqrt_exact_squares() {
        for n in [0u128, 1, 4, 9, 100, 10_000, 1 << 60] {
            let r = isqrt(n);
            assert_eq!(r * r, n);
        }
    }

    #[test]
    fn test_isqrt_floors() {
        assert_eq!(isqrt(2), 1);
        assert_eq!(isqrt(3), 1);
        assert_eq!(isqrt(8), 2);
        assert_eq!(isqrt(99), 9);
    }

    #[test]
    fn test_log_stake_unit_fixpoint() {
        // One token of stake weighs exactly one token
        assert_eq!(log_stake(ONE_TOKEN), ONE_TOKEN);
    }

    #[test]
    fn test_log_stake_dampens_whales() {
        let small = log_stake(100 * ONE_TOKEN);
        let big = log_stake(400 * ONE_TOKEN);
        // 4x the stake gives exactly 2x the weight
        assert_eq!(big, small * 2);
    }

    #[test]
    fn test_tier_from_stake() {
        assert_eq!(NodeTier::from_stake(0), NodeTier::Light);
        assert_eq!(NodeTier::from_stake(FULL_NODE_STAKE - 1), NodeTier::Light);
        assert_eq!(NodeTier::from_stake(FULL_NODE_STAKE), NodeTier::Full);
        assert_eq!(NodeTier::from_stake(VALIDATOR_MIN_STAKE), NodeTier::Validator);
        assert_eq!(NodeTier::from_stake(SUPER_VALIDATOR_STAKE), NodeTier::Super);
    }

    #[test]
    fn test_tier_eligibility() {
        assert!(!NodeTier::Light.can_produce_blocks());
        assert!(NodeTier::Super.can_produce_blocks());
        assert!(NodeTier::Full.receives_infrastructure_rewards());
        assert!(!NodeTier::Validator.receives_infrastructure_rewards());
        assert!(NodeTier::Validator.receives_validator_rewards());
    }

    proptest::proptest! {
        // For any stake pair s1 < s2, the weight advantage never exceeds
        // the square root of the stake ratio.
        #[test]
        fn prop_whale_bound(s1 in 1u128..1u128 << 80, s2 in 1u128..1u128 << 80) {
            let (lo, hi) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
            let ratio = log_stake(hi) / log_stake(lo).max(1);
            // isqrt floors, so compare against the ceiling of sqrt(hi/lo)
            let stake_ratio = hi / lo;
            proptest::prop_assert!(ratio * ratio <= stake_ratio.saturating_add(1).saturating_mul(4));
        }

        #[test]
        fn prop_isqrt_is_exact_floor(n in 0u128..u128::MAX / 2) {
            let r = isqrt(n);
            proptest::prop_assert!(r * r <= n);
            proptest::prop_assert!((r + 1).checked_mul(r + 1).map_or(true, |sq| sq > n));
        }
    }
}
