// Emission controller: adaptive per-epoch mint
// Combines the halving base reward, the network utility score and the
// weight-consensus quality multiplier, clamped by the epoch floor and the
// remaining emission pool. Integer basis-point arithmetic throughout —
// no floating point on the consensus path.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::halving::HalvingSchedule;
use crate::supply::SupplyLedger;
use tensorium_core::constants::consensus::EPOCH_BLOCKS;
use tensorium_core::constants::emission::{MIN_EPOCH_FLOOR, QUOTA_THRESHOLD_BPS, TASK_TARGET};

/// Basis-point denominator
pub const BPS: u128 = 10_000;

/// Neutral quality multiplier (1.0)
pub const QUALITY_NEUTRAL_BPS: u32 = 10_000;
/// Quality multiplier floor (0.6)
pub const QUALITY_MIN_BPS: u32 = 6_000;
/// Quality multiplier ceiling (1.4)
pub const QUALITY_MAX_BPS: u32 = 14_000;

/// Emission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Blocks per epoch
    pub epoch_blocks: u64,
    /// Lower clamp on the adjusted epoch emission
    pub min_epoch_floor: u128,
    /// Utility score below which the epoch fails its quota
    pub quota_threshold_bps: u32,
    /// Task count at which the volume term saturates
    pub task_target: u64,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            epoch_blocks: EPOCH_BLOCKS,
            min_epoch_floor: MIN_EPOCH_FLOOR,
            quota_threshold_bps: QUOTA_THRESHOLD_BPS,
            task_target: TASK_TARGET,
        }
    }
}

/// Raw inputs to the utility score for one epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct UtilityInputs {
    /// Tasks completed across all miners this epoch
    pub tasks_this_epoch: u64,
    /// Average task difficulty in basis points (0..=10_000)
    pub avg_difficulty_bps: u32,
    /// Validators that participated this epoch
    pub active_validators: u64,
    /// All registered validators
    pub total_validators: u64,
}

impl UtilityInputs {
    /// Utility score in basis points, weights fixed in consensus:
    /// 0.4 task volume + 0.3 difficulty + 0.3 participation, each sub-term
    /// a ratio of integers clamped to [0, 10_000].
    pub fn score_bps(&self, task_target: u64) -> u32 {
        let volume = if task_target == 0 {
            0
        } else {
            self.tasks_this_epoch.min(task_target) as u128 * BPS / task_target as u128
        };
        let difficulty = (self.avg_difficulty_bps as u128).min(BPS);
        let participation = if self.total_validators == 0 {
            0
        } else {
            (self.active_validators.min(self.total_validators) as u128 * BPS)
                / self.total_validators as u128
        };

        let score = (4_000 * volume + 3_000 * difficulty + 3_000 * participation) / BPS;
        score.min(BPS) as u32
    }
}

/// Outcome of one epoch's emission decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochEmission {
    /// The floor-clamped, utility-adjusted amount scheduled for the epoch
    pub scheduled: u128,
    /// Portion satisfied from the recycled pool (not newly minted)
    pub from_recycled: u128,
    /// Portion newly minted from the emission pool (post-clamp)
    pub minted_from_pool: u128,
    /// Utility score used
    pub utility_bps: u32,
    /// Quality multiplier used
    pub quality_bps: u32,
    /// Whether the utility score met the quota threshold
    pub quota_met: bool,
}

impl EpochEmission {
    /// Total amount available for distribution this epoch
    pub fn total(&self) -> u128 {
        self.from_recycled + self.minted_from_pool
    }
}

/// The emission controller. Stateless between epochs: everything it needs
/// arrives as arguments, everything it decides goes out in the result.
#[derive(Debug, Clone, Default)]
pub struct EmissionController {
    schedule: HalvingSchedule,
    config: EmissionConfig,
}

impl EmissionController {
    pub fn new(schedule: HalvingSchedule, config: EmissionConfig) -> Self {
        Self { schedule, config }
    }

    pub fn schedule(&self) -> &HalvingSchedule {
        &self.schedule
    }

    /// Decide the epoch mint.
    ///
    /// ```text
    /// raw      = base_reward(h0) * EPOCH_BLOCKS
    /// adjusted = max(raw * U_bps * Q_bps / 10^8, MIN_EPOCH_FLOOR)
    /// ```
    /// The recycled pool is consumed before the emission pool; only the
    /// residual reaches `credit_mint`, which clamps to what remains.
    pub fn epoch_emission(
        &self,
        epoch_start_height: u64,
        utility_bps: u32,
        quality_bps: u32,
        recycled_pool: u128,
        supply: &mut SupplyLedger,
    ) -> EpochEmission {
        let quality_bps = quality_bps.clamp(QUALITY_MIN_BPS, QUALITY_MAX_BPS);
        let base = self.schedule.base_reward(epoch_start_height);
        let raw = base.saturating_mul(self.config.epoch_blocks as u128);

        let adjusted = raw
            .saturating_mul(utility_bps as u128)
            .saturating_mul(quality_bps as u128)
            / (BPS * BPS);
        let scheduled = adjusted.max(self.config.min_epoch_floor);

        let from_recycled = scheduled.min(recycled_pool);
        let minted_from_pool = supply.credit_mint(scheduled - from_recycled);

        let quota_met = utility_bps >= self.config.quota_threshold_bps;
        let emission = EpochEmission {
            scheduled,
            from_recycled,
            minted_from_pool,
            utility_bps,
            quality_bps,
            quota_met,
        };

        info!(
            height = epoch_start_height,
            scheduled,
            from_recycled,
            minted = minted_from_pool,
            utility_bps,
            quality_bps,
            quota_met,
            "epoch emission decided"
        );

        emission
    }

    pub fn config(&self) -> &EmissionConfig {
        &self.config
    }
}
