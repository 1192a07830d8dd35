// Block reward halving schedule
// Bitcoin-like decay with a perpetual tail floor
//
// Design:
// - Initial reward: 0.24 TSR per block
// - Halving interval: 2,190,000 blocks (~3.33 years at 12 s blocks)
// - After MAX_HALVINGS eras the reward settles at MIN_TAIL_REWARD forever

use serde::{Deserialize, Serialize};
use tensorium_core::constants::emission::{
    HALVING_INTERVAL, INITIAL_BLOCK_REWARD, MAX_HALVINGS, MIN_TAIL_REWARD,
};

/// Halving schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HalvingSchedule {
    /// Era-0 block reward
    pub initial_reward: u128,
    /// Blocks between halvings
    pub halving_interval: u64,
    /// Perpetual tail reward, the lower bound of every era
    pub min_tail_reward: u128,
    /// Era index after which the tail applies unconditionally
    pub max_halvings: u32,
}

impl Default for HalvingSchedule {
    fn default() -> Self {
        Self {
            initial_reward: INITIAL_BLOCK_REWARD,
            halving_interval: HALVING_INTERVAL,
            min_tail_reward: MIN_TAIL_REWARD,
            max_halvings: MAX_HALVINGS,
        }
    }
}

impl HalvingSchedule {
    /// Per-block base reward at a block height.
    ///
    /// `reward = initial_reward >> era`, floored at `min_tail_reward`.
    /// The tail is perpetual: past `max_halvings` eras this returns the tail
    /// reward, never zero.
    pub fn base_reward(&self, block_height: u64) -> u128 {
        let era = block_height / self.halving_interval;
        if era > self.max_halvings as u64 {
            return self.min_tail_reward;
        }
        (self.initial_reward >> era).max(self.min_tail_reward)
    }

    /// Halving era at a block height, capped at `max_halvings`
    pub fn era(&self, block_height: u64) -> u32 {
        ((block_height / self.halving_interval) as u32).min(self.max_halvings)
    }

    /// Blocks until the next halving boundary; zero once in the tail
    pub fn blocks_until_next_halving(&self, block_height: u64) -> u64 {
        let current_era = self.era(block_height);
        if current_era >= self.max_halvings {
            return 0;
        }
        let next_boundary = (current_era as u64 + 1) * self.halving_interval;
        next_boundary.saturating_sub(block_height)
    }

    /// Upper bound on base-reward emission through the end of the halving
    /// eras (tail emission excluded since it is unbounded in time).
    pub fn scheduled_emission_bound(&self) -> u128 {
        let mut total: u128 = 0;
        for era in 0..=self.max_halvings {
            let reward = (self.initial_reward >> era).max(self.min_tail_reward);
            total = total.saturating_add(reward.saturating_mul(self.halving_interval as u128));
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_reward() {
        let schedule = HalvingSchedule::default();
        assert_eq!(schedule.base_reward(0), INITIAL_BLOCK_REWARD);
        assert_eq!(schedule.base_reward(HALVING_INTERVAL - 1), INITIAL_BLOCK_REWARD);
    }

    #[test]
    fn test_halvings() {
        let schedule = HalvingSchedule::default();
        assert_eq!(schedule.base_reward(HALVING_INTERVAL), INITIAL_BLOCK_REWARD / 2);
        assert_eq!(schedule.base_reward(HALVING_INTERVAL * 2), INITIAL_BLOCK_REWARD / 4);
        assert_eq!(schedule.base_reward(HALVING_INTERVAL * 3), INITIAL_BLOCK_REWARD / 8);
    }

    #[test]
    fn test_tail_is_perpetual_and_nonzero() {
        let schedule = HalvingSchedule::default();
        let tail_start = (MAX_HALVINGS as u64 + 1) * HALVING_INTERVAL;
        assert_eq!(schedule.base_reward(tail_start), MIN_TAIL_REWARD);
        assert_eq!(schedule.base_reward(tail_start * 100), MIN_TAIL_REWARD);
        assert_eq!(schedule.base_reward(u64::MAX), MIN_TAIL_REWARD);
    }

    #[test]
    fn test_floor_applies_within_final_eras() {
        // 0.24 >> 8 ≈ 0.0009 TSR, below the 0.001 tail: the floor kicks in
        // before the era cap does.
        let schedule = HalvingSchedule::default();
        assert_eq!(schedule.base_reward(8 * HALVING_INTERVAL), MIN_TAIL_REWARD);
        assert!(schedule.base_reward(7 * HALVING_INTERVAL) > MIN_TAIL_REWARD);
    }

    #[test]
    fn test_era_and_next_halving() {
        let schedule = HalvingSchedule::default();
        assert_eq!(schedule.era(0), 0);
        assert_eq!(schedule.era(HALVING_INTERVAL), 1);
        assert_eq!(schedule.era(HALVING_INTERVAL * 50), MAX_HALVINGS);

        assert_eq!(schedule.blocks_until_next_halving(0), HALVING_INTERVAL);
        assert_eq!(schedule.blocks_until_next_halving(HALVING_INTERVAL - 1), 1);
        assert_eq!(schedule.blocks_until_next_halving(HALVING_INTERVAL * 50), 0);
    }

    #[test]
    fn test_emission_bound_fits_pool() {
        use tensorium_core::constants::tokenomics::EMISSION_POOL;
        let schedule = HalvingSchedule::default();
        // The scheduled (pre-tail) emission must fit inside the 45% pool;
        // the supply ledger clamps the long tail.
        assert!(schedule.scheduled_emission_bound() < EMISSION_POOL * 12 / 10);
    }
}
