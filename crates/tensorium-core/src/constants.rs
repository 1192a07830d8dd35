//! Chain constants and consensus parameters
//!
//! Single source of truth for every tunable in the consensus core. All of
//! these are adjustable only through on-chain governance (48-hour timelock);
//! the values here are the genesis defaults.

use crate::types::Address;

/// Token economics
pub mod tokenomics {
    /// Decimals (18, like ETH)
    pub const DECIMALS: u8 = 18;

    /// One full token in base units
    pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

    /// Total supply cap: 21 million TSR
    pub const TOTAL_SUPPLY: u128 = 21_000_000 * ONE_TOKEN;

    /// Pre-minted at TGE: 55% of total supply (11.55M TSR).
    /// Team 10%, Private 8%, IDO 5%, DAO 10%, Liquidity 5%, Foundation 5%,
    /// Ecosystem 12%.
    pub const PREMINTED_SUPPLY: u128 = TOTAL_SUPPLY * 55 / 100;

    /// Emission pool: the 45% that is minted over time (9.45M TSR)
    pub const EMISSION_POOL: u128 = TOTAL_SUPPLY - PREMINTED_SUPPLY;

    /// TGE allocation breakdown in percent of total supply.
    /// The core only consumes the aggregate premint; the breakdown is kept
    /// for genesis construction and reporting.
    pub const TGE_ALLOCATIONS: [(&str, u8); 7] = [
        ("team", 10),
        ("private_sale", 8),
        ("ido", 5),
        ("dao_treasury", 10),
        ("liquidity", 5),
        ("foundation", 5),
        ("ecosystem", 12),
    ];
}

/// Emission schedule
pub mod emission {
    use super::tokenomics::ONE_TOKEN;

    /// Era-0 per-block reward: 0.24 TSR
    pub const INITIAL_BLOCK_REWARD: u128 = 240_000_000_000_000_000;

    /// Blocks per halving era (~3.33 years at 12 s blocks)
    pub const HALVING_INTERVAL: u64 = 2_190_000;

    /// Eras after which the schedule settles into tail emission
    pub const MAX_HALVINGS: u32 = 10;

    /// Perpetual tail reward per block: 0.001 TSR. Never zero.
    pub const MIN_TAIL_REWARD: u128 = ONE_TOKEN / 1000;

    /// Lower clamp on a full epoch's emission
    pub const MIN_EPOCH_FLOOR: u128 = MIN_TAIL_REWARD * super::consensus::EPOCH_BLOCKS as u128;

    /// Epochs with a utility score below this burn their miner pool
    pub const QUOTA_THRESHOLD_BPS: u32 = 1000;

    /// Task count at which the volume term of the utility score saturates
    pub const TASK_TARGET: u64 = 10_000;
}

/// Block and epoch parameters
pub mod consensus {
    /// Blocks per epoch
    pub const EPOCH_BLOCKS: u64 = 32;

    /// Commit window length in blocks
    pub const COMMIT_BLOCKS: u64 = 16;

    /// Reveal window length in blocks
    pub const REVEAL_BLOCKS: u64 = 16;

    /// Target block time in seconds. Reporting only; consensus math is
    /// block-height based and never reads the clock.
    pub const BLOCK_TIME_SECS: u64 = 12;

    /// Epochs in one day at the target block time
    pub const EPOCHS_PER_DAY: u64 = 86_400 / (BLOCK_TIME_SECS * EPOCH_BLOCKS);
}

/// Staking thresholds and weighting
pub mod staking {
    use super::tokenomics::ONE_TOKEN;

    /// Full-node tier threshold: 10 TSR
    pub const FULL_NODE_STAKE: u128 = 10 * ONE_TOKEN;

    /// Validator tier threshold: 100 TSR. Single source of truth for the
    /// minimum validator stake.
    pub const VALIDATOR_MIN_STAKE: u128 = 100 * ONE_TOKEN;

    /// Super-validator tier threshold: 1000 TSR
    pub const SUPER_VALIDATOR_STAKE: u128 = 1000 * ONE_TOKEN;

    /// Cap on the active validator set; excess registrants wait in a queue
    pub const MAX_ACTIVE_VALIDATORS: usize = 1000;

    /// Epochs during which unbonding stake remains slashable (~7 days)
    pub const UNBONDING_EPOCHS: u64 = 540;

    /// Epochs of inactivity after which a validator is an offline candidate
    pub const OFFLINE_WINDOW: u64 = 16;

    /// Multiplier so that log_stake(ONE_TOKEN) == ONE_TOKEN
    pub const LOG_STAKE_SCALE: u128 = 1_000_000_000;
}

/// Weight consensus parameters
pub mod weights {
    /// Outlier threshold: 2.5 sigma, expressed in basis points
    pub const OUTLIER_SIGMA_BPS: u128 = 25_000;

    /// Miner reward bonus for GPU work, in basis points (5%)
    pub const GPU_BONUS_BPS: u32 = 500;
}

/// Well-known system addresses
pub mod addresses {
    use super::Address;

    /// DAO treasury: receives the DAO pool plus every residual
    pub const DAO_TREASURY: Address = Address::new([
        0xda, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premint_plus_pool_is_total() {
        assert_eq!(
            tokenomics::PREMINTED_SUPPLY + tokenomics::EMISSION_POOL,
            tokenomics::TOTAL_SUPPLY
        );
    }

    #[test]
    fn test_tge_breakdown_sums_to_premint_share() {
        let pct: u32 = tokenomics::TGE_ALLOCATIONS.iter().map(|(_, p)| *p as u32).sum();
        assert_eq!(pct, 55);
    }

    #[test]
    fn test_windows_fill_the_epoch() {
        assert!(consensus::COMMIT_BLOCKS + consensus::REVEAL_BLOCKS <= consensus::EPOCH_BLOCKS);
    }

    #[test]
    fn test_epoch_floor() {
        assert_eq!(emission::MIN_EPOCH_FLOOR, emission::MIN_TAIL_REWARD * 32);
    }
}
