// Reward distributor: the seven-way split of each epoch's emission
// Miners 35%, validators 28%, infrastructure 2%, delegators 12%, subnet
// owners 10%, DAO treasury 13%, ecosystem residual to the treasury.
//
// All pool math is integer basis points. Every pool's integer-division
// residual goes to its heaviest participant, empty pools fold into the
// treasury, and the ledger is exact: the intents plus any unmet-quota burn
// always sum to the epoch emission.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensorium_core::constants::addresses::DAO_TREASURY;
use tensorium_core::constants::weights::GPU_BONUS_BPS;
use tensorium_core::types::Address;
use tracing::info;

use crate::delegation::Delegation;

/// Ordered reward categories; the intent list sorts by (category, recipient)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RewardCategory {
    Miner,
    Validator,
    Infrastructure,
    Delegator,
    SubnetOwner,
    DaoTreasury,
}

/// One balance credit to be applied at epoch close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardIntent {
    pub epoch: u64,
    pub recipient: Address,
    pub amount: u128,
    pub category: RewardCategory,
}

/// Pool shares in basis points of the epoch emission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSplit {
    pub miner_bps: u32,
    pub validator_bps: u32,
    pub infrastructure_bps: u32,
    pub delegator_bps: u32,
    pub subnet_bps: u32,
    pub dao_bps: u32,
}

impl Default for PoolSplit {
    fn default() -> Self {
        Self {
            miner_bps: 3_500,
            validator_bps: 2_800,
            infrastructure_bps: 200,
            delegator_bps: 1_200,
            subnet_bps: 1_000,
            dao_bps: 1_300,
        }
    }
}

impl PoolSplit {
    pub fn total_bps(&self) -> u32 {
        self.miner_bps
            + self.validator_bps
            + self.infrastructure_bps
            + self.delegator_bps
            + self.subnet_bps
            + self.dao_bps
    }
}

/// A miner's claim on the miner pool: canonical score plus GPU bonus
#[derive(Debug, Clone)]
pub struct MinerShare {
    pub address: Address,
    /// Canonical consensus score in basis points
    pub score_bps: u16,
    /// GPU share of the miner's completed tasks, basis points
    pub gpu_fraction_bps: u32,
}

impl MinerShare {
    /// `score * (1 + GPU_BONUS * gpu_fraction)`, in integer bps
    fn weight(&self) -> u128 {
        let bonus_bps = GPU_BONUS_BPS as u128 * self.gpu_fraction_bps as u128 / 10_000;
        self.score_bps as u128 * (10_000 + bonus_bps)
    }
}

/// A stake-weighted claim (validators and full nodes). The weight must
/// already have passed through `log_stake`.
#[derive(Debug, Clone)]
pub struct StakeShare {
    pub address: Address,
    pub weight: u128,
}

/// Result of one epoch's distribution
#[derive(Debug, Clone)]
pub struct DistributionOutcome {
    pub intents: Vec<RewardIntent>,
    /// The miner pool, when the epoch failed its quota (burned by C4)
    pub miner_pool_burned: u128,
}

/// The distributor. Stateless: one call per epoch.
#[derive(Debug, Clone)]
pub struct RewardDistributor {
    split: PoolSplit,
    dao_treasury: Address,
}

impl Default for RewardDistributor {
    fn default() -> Self {
        Self { split: PoolSplit::default(), dao_treasury: DAO_TREASURY }
    }
}

impl RewardDistributor {
    pub fn new(split: PoolSplit, dao_treasury: Address) -> Self {
        assert!(split.total_bps() <= 10_000, "pool split exceeds 100%");
        Self { split, dao_treasury }
    }

    /// Produce the epoch's reward intents.
    ///
    /// `quota_met` reflects the utility quota; when it is false, or when no
    /// miner carries weight, the miner pool is returned for burning instead
    /// of distributed. All other pools proceed regardless.
    #[allow(clippy::too_many_arguments)]
    pub fn distribute(
        &self,
        epoch: u64,
        emission: u128,
        quota_met: bool,
        miners: &[MinerShare],
        validators: &[StakeShare],
        full_nodes: &[StakeShare],
        delegations: &[Delegation],
        subnet_owners: &[Address],
    ) -> DistributionOutcome {
        let miner_pool = emission * self.split.miner_bps as u128 / 10_000;
        let validator_pool = emission * self.split.validator_bps as u128 / 10_000;
        let infra_pool = emission * self.split.infrastructure_bps as u128 / 10_000;
        let delegator_pool = emission * self.split.delegator_bps as u128 / 10_000;
        let subnet_pool = emission * self.split.subnet_bps as u128 / 10_000;
        let dao_pool = emission * self.split.dao_bps as u128 / 10_000;
        // the ecosystem residual absorbs all rounding dust from the splits
        let ecosystem = emission
            - miner_pool
            - validator_pool
            - infra_pool
            - delegator_pool
            - subnet_pool
            - dao_pool;

        let mut credits: BTreeMap<(RewardCategory, Address), u128> = BTreeMap::new();
        let mut treasury = dao_pool + ecosystem;

        // Miners: pro-rata by canonical score with GPU bonus
        let miner_weights: Vec<(Address, u128)> =
            miners.iter().map(|m| (m.address, m.weight())).collect();
        let mut miner_pool_burned = 0;
        if !quota_met || miner_weights.iter().all(|(_, w)| *w == 0) {
            miner_pool_burned = miner_pool;
        } else {
            distribute_pro_rata(miner_pool, &miner_weights, |addr, amount| {
                *credits.entry((RewardCategory::Miner, addr)).or_default() += amount;
            });
        }

        // Validators: pro-rata by effective stake (log_stake x trust)
        let validator_weights: Vec<(Address, u128)> =
            validators.iter().map(|v| (v.address, v.weight)).collect();
        if !apply_pool(validator_pool, &validator_weights, RewardCategory::Validator, &mut credits)
        {
            treasury += validator_pool;
        }

        // Infrastructure: pro-rata by log_stake over Full-tier nodes
        let infra_weights: Vec<(Address, u128)> =
            full_nodes.iter().map(|n| (n.address, n.weight)).collect();
        if !apply_pool(infra_pool, &infra_weights, RewardCategory::Infrastructure, &mut credits) {
            treasury += infra_pool;
        }

        // Delegators: pro-rata by lock-boosted log_stake
        let delegator_weights: Vec<(Address, u128)> = delegations
            .iter()
            .map(|d| (d.delegator, d.effective_weight()))
            .collect();
        if !apply_pool(delegator_pool, &delegator_weights, RewardCategory::Delegator, &mut credits)
        {
            treasury += delegator_pool;
        }

        // Subnet owners: flat split among owners active this epoch
        let subnet_weights: Vec<(Address, u128)> =
            subnet_owners.iter().map(|o| (*o, 1u128)).collect();
        if !apply_pool(subnet_pool, &subnet_weights, RewardCategory::SubnetOwner, &mut credits) {
            treasury += subnet_pool;
        }

        *credits.entry((RewardCategory::DaoTreasury, self.dao_treasury)).or_default() += treasury;

        let intents: Vec<RewardIntent> = credits
            .into_iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|((category, recipient), amount)| RewardIntent { epoch, recipient, amount, category })
            .collect();

        info!(
            epoch,
            emission,
            intents = intents.len(),
            miner_pool_burned,
            "epoch rewards distributed"
        );

        DistributionOutcome { intents, miner_pool_burned }
    }

    pub fn dao_treasury(&self) -> Address {
        self.dao_treasury
    }

    pub fn split(&self) -> &PoolSplit {
        &self.split
    }
}

// Distribute a pool pro-rata over weights, returning false when there is
// nothing to distribute to (the caller folds the pool into the treasury).
fn apply_pool(
    pool: u128,
    weights: &[(Address, u128)],
    category: RewardCategory,
    credits: &mut BTreeMap<(RewardCategory, Address), u128>,
) -> bool {
    if pool == 0 {
        return true;
    }
    if weights.iter().map(|(_, w)| w).sum::<u128>() == 0 {
        return false;
    }
    distribute_pro_rata(pool, weights, |addr, amount| {
        *credits.entry((category, addr)).or_default() += amount;
    });
    true
}

// Exact pro-rata split: each share is floor(pool * w / total) and the
// remainder goes to the heaviest participant (ties to the smaller address).
fn distribute_pro_rata(
    pool: u128,
    weights: &[(Address, u128)],
    mut credit: impl FnMut(Address, u128),
) {
    let total: u128 = weights.iter().map(|(_, w)| w).sum();
    debug_assert!(total > 0);

    let mut distributed = 0u128;
    let mut heaviest: Option<(Address, u128)> = None;
    for (addr, w) in weights {
        let amount = pool * w / total;
        distributed += amount;
        if amount > 0 {
            credit(*addr, amount);
        }
        let heavier = match heaviest {
            None => true,
            Some((best_addr, best_w)) => *w > best_w || (*w == best_w && *addr < best_addr),
        };
        if heavier {
            heaviest = Some((*addr, *w));
        }
    }

    let residual = pool - distributed;
    if residual > 0 {
        if let Some((addr, _)) = heaviest {
            credit(addr, residual);
        }
    }
}
