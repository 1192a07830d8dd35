// Epoch orchestrator: drives each epoch through
// commit -> reveal -> aggregate -> emit -> distribute -> finalize.
//
// This is the single owner of all mutable consensus state. It is driven by
// block commit events from the execution layer and is strictly
// single-threaded; readers are served from immutable snapshots published at
// epoch boundaries.
//
// Everything an epoch close produces (reward intents, slash results, escrow
// and unbonding releases) is collected into one EpochOutcome. The execution
// layer must apply that outcome atomically with the block that closes the
// epoch; the consensus state itself is deterministically re-derivable by
// replaying the epoch's blocks, so a crash before the atomic apply leaves
// the chain re-runnable.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tensorium_core::constants::addresses::DAO_TREASURY;
use tensorium_core::constants::consensus::EPOCH_BLOCKS;
use tensorium_core::constants::staking::OFFLINE_WINDOW;
use tensorium_core::types::{Address, Hash};
use tensorium_crypto::{keccak256_concat, merkle::namespaced_root};
use tracing::{info, warn};

use crate::burn::{BurnConfig, BurnManager, BurnTotals};
use crate::delegation::{Delegation, DelegationSet, LockPeriod};
use crate::emission::{EmissionConfig, EmissionController, EpochEmission, UtilityInputs};
use crate::error::{ConsensusError, Result};
use crate::halving::HalvingSchedule;
use crate::rewards::{MinerShare, PoolSplit, RewardDistributor, RewardIntent, StakeShare};
use crate::scoring::ScoringLedger;
use crate::slashing::{EscrowEntry, Offense, SlashOutcome, Slasher, SlashingConfig};
use crate::stake::log_stake;
use crate::supply::{SupplyLedger, SupplyState};
use crate::validator_set::{ValidatorRecord, ValidatorSet};
use crate::weights::{WeightConsensus, WeightConsensusConfig};

/// The four transaction flavors the core consumes. Everything else on the
/// chain is opaque to consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoreTransaction {
    RegisterValidator {
        validator: Address,
        stake: u128,
    },
    Delegate {
        delegator: Address,
        validator: Address,
        amount: u128,
        lock: LockPeriod,
    },
    Commit {
        validator: Address,
        epoch: u64,
        commit_hash: Hash,
    },
    Reveal {
        validator: Address,
        epoch: u64,
        scores: BTreeMap<Address, u16>,
        salt: [u8; 32],
    },
}

/// One committed block, as reported by the execution layer. Signatures and
/// nonces are already validated upstream.
#[derive(Debug, Clone)]
pub struct BlockEvent {
    pub height: u64,
    pub parent_hash: Hash,
    pub producer: Address,
    pub transactions: Vec<CoreTransaction>,
    /// Total base fees collected in the block
    pub base_fee_total: u128,
    /// Subnet registrations: (owner, fee paid)
    pub subnet_registrations: Vec<(Address, u128)>,
    /// RANDAO output, present on epoch-start blocks
    pub randao_reveal: Option<Hash>,
}

impl BlockEvent {
    /// An empty block at a height
    pub fn empty(height: u64, producer: Address) -> Self {
        Self {
            height,
            parent_hash: [0u8; 32],
            producer,
            transactions: Vec::new(),
            base_fee_total: 0,
            subnet_registrations: Vec::new(),
            randao_reveal: None,
        }
    }
}

/// Everything produced by closing one epoch. Applied by the execution
/// layer in a single write batch, atomically with the closing block.
#[derive(Debug, Clone)]
pub struct EpochOutcome {
    pub epoch: u64,
    pub emission: EpochEmission,
    pub utility_bps: u32,
    pub canonical_scores: BTreeMap<Address, u16>,
    /// Balance credits, sorted by (category, recipient)
    pub reward_intents: Vec<RewardIntent>,
    /// Miner pool burned under the unmet-quota rule, if any
    pub miner_pool_burned: u128,
    pub slashes: Vec<SlashOutcome>,
    /// Escrowed slash remainders due back to their owners
    pub escrow_released: Vec<EscrowEntry>,
    /// Fully unbonded validators and their returned stakes
    pub unbonded: Vec<(Address, u128)>,
    pub state_root: Hash,
}

/// Orchestrator configuration: one struct wiring every component's knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub epoch_blocks: u64,
    pub offline_window: u64,
    pub emission: EmissionConfig,
    pub weights: WeightConsensusConfig,
    pub burn: BurnConfig,
    pub slashing: SlashingConfig,
    pub split: PoolSplit,
    pub dao_treasury: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch_blocks: EPOCH_BLOCKS,
            offline_window: OFFLINE_WINDOW,
            emission: EmissionConfig::default(),
            weights: WeightConsensusConfig::default(),
            burn: BurnConfig::default(),
            slashing: SlashingConfig::default(),
            split: PoolSplit::default(),
            dao_treasury: DAO_TREASURY,
        }
    }
}

// Read-only views published at epoch boundaries
#[derive(Debug, Clone)]
struct Snapshots {
    supply: SupplyState,
    validators: Vec<ValidatorRecord>,
}

/// The epoch engine
pub struct EpochEngine {
    config: EngineConfig,
    supply: SupplyLedger,
    emission: EmissionController,
    burn: BurnManager,
    validators: ValidatorSet,
    delegations: DelegationSet,
    scoring: ScoringLedger,
    weights: WeightConsensus,
    slasher: Slasher,
    distributor: RewardDistributor,
    /// Full-tier infrastructure nodes: address -> raw stake
    full_nodes: BTreeMap<Address, u128>,
    /// All registered subnet owners
    subnet_owners: BTreeSet<Address>,
    /// Subnet owners active in the current epoch
    active_subnet_owners: BTreeSet<Address>,
    /// Validators that committed or revealed this epoch
    participants: BTreeSet<Address>,
    /// Delegation weights frozen at epoch start for reward purposes
    frozen_delegations: Vec<Delegation>,
    epoch_seed: Hash,
    current_epoch: u64,
    started: bool,
    snapshots: RwLock<Snapshots>,
}

impl EpochEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_supply(config, SupplyLedger::genesis())
    }

    pub fn with_supply(config: EngineConfig, supply: SupplyLedger) -> Self {
        let snapshots = RwLock::new(Snapshots { supply: supply.snapshot(), validators: Vec::new() });
        Self {
            emission: EmissionController::new(HalvingSchedule::default(), config.emission.clone()),
            burn: BurnManager::new(config.burn.clone()),
            validators: ValidatorSet::new(),
            delegations: DelegationSet::new(),
            scoring: ScoringLedger::new(),
            weights: WeightConsensus::new(config.weights.clone()),
            slasher: Slasher::new(config.slashing.clone()),
            distributor: RewardDistributor::new(config.split.clone(), config.dao_treasury),
            full_nodes: BTreeMap::new(),
            subnet_owners: BTreeSet::new(),
            active_subnet_owners: BTreeSet::new(),
            participants: BTreeSet::new(),
            frozen_delegations: Vec::new(),
            epoch_seed: [0u8; 32],
            current_epoch: 0,
            started: false,
            snapshots,
            supply,
            config,
        }
    }

    /// Process one committed block. Returns the closed epoch's outcome when
    /// the block sits on an epoch boundary.
    pub fn on_block(&mut self, block: BlockEvent) -> Option<EpochOutcome> {
        let height = block.height;
        let mut outcome = None;

        if height % self.config.epoch_blocks == 0 {
            let epoch = height / self.config.epoch_blocks;
            if self.started {
                outcome = Some(self.close_epoch(block.producer));
            }
            self.open_epoch(epoch, height, block.randao_reveal);
            self.started = true;
        }
        self.weights.advance(height);

        for tx in block.transactions {
            if let Err(err) = self.apply_transaction(tx, height) {
                // Consensus rejections are local: the submission is dropped,
                // the block stays valid, the sender learns via its receipt.
                warn!(%err, height, "submission rejected by consensus module");
            }
        }

        let epoch = self.current_epoch;
        if block.base_fee_total > 0 {
            self.burn.burn_tx_fees(block.base_fee_total, epoch, &mut self.supply);
        }
        for (owner, fee) in block.subnet_registrations {
            self.burn.subnet_registration(fee, epoch, &mut self.supply);
            self.subnet_owners.insert(owner);
            self.active_subnet_owners.insert(owner);
        }

        outcome
    }

    fn apply_transaction(&mut self, tx: CoreTransaction, height: u64) -> Result<()> {
        match tx {
            CoreTransaction::RegisterValidator { validator, stake } => {
                self.validators.register(validator, stake, self.current_epoch)
            }
            CoreTransaction::Delegate { delegator, validator, amount, lock } => {
                if !self.validators.contains(&validator) {
                    return Err(ConsensusError::UnknownValidator(validator));
                }
                self.delegations.delegate(delegator, validator, amount, lock, self.current_epoch);
                Ok(())
            }
            CoreTransaction::Commit { validator, epoch, commit_hash } => {
                self.check_epoch(epoch)?;
                self.check_participant(&validator)?;
                self.weights.submit_commit(validator, commit_hash, height)?;
                self.note_participation(validator);
                Ok(())
            }
            CoreTransaction::Reveal { validator, epoch, scores, salt } => {
                self.check_epoch(epoch)?;
                self.check_participant(&validator)?;
                self.weights.submit_reveal(validator, scores, salt, height)?;
                self.note_participation(validator);
                Ok(())
            }
        }
    }

    fn check_epoch(&self, epoch: u64) -> Result<()> {
        if epoch != self.current_epoch {
            return Err(ConsensusError::WrongEpoch { submitted: epoch, current: self.current_epoch });
        }
        Ok(())
    }

    fn check_participant(&self, validator: &Address) -> Result<()> {
        let record = self
            .validators
            .get(validator)
            .ok_or(ConsensusError::UnknownValidator(*validator))?;
        if !record.is_eligible(self.current_epoch) {
            return Err(ConsensusError::UnknownValidator(*validator));
        }
        Ok(())
    }

    fn note_participation(&mut self, validator: Address) {
        self.validators.activity_tick(&validator, self.current_epoch);
        self.participants.insert(validator);
    }

    // Epoch start: latch the RANDAO seed, reset the scoring ledger, open the
    // commit window, freeze delegation weights, rebuild the selection index.
    fn open_epoch(&mut self, epoch: u64, start_height: u64, randao: Option<Hash>) {
        self.current_epoch = epoch;
        match randao {
            Some(seed) => self.epoch_seed = seed,
            None => {
                // A missing beacon must not stall the chain; fold the epoch
                // number into the previous seed so the value still changes.
                warn!(epoch, "no RANDAO reveal at epoch start, deriving fallback seed");
                self.epoch_seed = keccak256_concat(&self.epoch_seed, &epoch.to_be_bytes());
            }
        }
        self.scoring.reset_epoch(epoch);
        self.weights.open_epoch(epoch, start_height);
        self.validators.rebuild_selection_index(epoch);
        self.frozen_delegations = self.delegations.snapshot();
        self.active_subnet_owners.clear();
        self.participants.clear();
        info!(epoch, start_height, "epoch opened");
    }

    // Epoch close, at the first block of the following epoch. Step order
    // follows the data flow: aggregate, then emit, then distribute against
    // the pre-penalty stake view, then execute penalties and releases.
    fn close_epoch(&mut self, producer: Address) -> EpochOutcome {
        let epoch = self.current_epoch;
        let next_epoch = epoch + 1;

        // Aggregate reveals under effective-stake weights
        let validator_weights: BTreeMap<Address, u128> = self
            .validators
            .eligible(epoch)
            .map(|r| (r.address, r.effective_stake()))
            .collect();
        let aggregation = self.weights.aggregate(&validator_weights);

        // Reward shares are captured before any of this epoch's penalties
        // land; trust and stake changes take effect next epoch.
        let validator_shares: Vec<StakeShare> = self
            .validators
            .eligible(epoch)
            .map(|r| StakeShare { address: r.address, weight: r.effective_stake() })
            .collect();

        // Utility from the scoring ledger and participation
        let utility_inputs = UtilityInputs {
            tasks_this_epoch: self.scoring.tasks_this_epoch(),
            avg_difficulty_bps: self.scoring.avg_difficulty_bps(),
            active_validators: self.participants.len() as u64,
            total_validators: self.validators.total_registered() as u64,
        };
        let utility_bps = utility_inputs.score_bps(self.config.emission.task_target);

        // Emission: recycled pool first, then the supply ledger
        let recycled = self.burn.take_recycled();
        let emission = self.emission.epoch_emission(
            epoch * self.config.epoch_blocks,
            utility_bps,
            aggregation.quality_bps,
            recycled,
            &mut self.supply,
        );
        let unconsumed_recycled = recycled - emission.from_recycled;
        self.burn.burn_recycled_remainder(unconsumed_recycled, epoch, &mut self.supply);

        // Distribution
        let miners: Vec<MinerShare> = aggregation
            .canonical
            .iter()
            .map(|(miner, score)| MinerShare {
                address: *miner,
                score_bps: *score,
                gpu_fraction_bps: self.scoring.stats(miner).gpu_fraction_bps(),
            })
            .collect();
        let full_nodes: Vec<StakeShare> = self
            .full_nodes
            .iter()
            .map(|(addr, stake)| StakeShare { address: *addr, weight: log_stake(*stake) })
            .collect();
        let subnet_owners: Vec<Address> = self.active_subnet_owners.iter().copied().collect();

        let distribution = self.distributor.distribute(
            epoch,
            emission.total(),
            emission.quota_met,
            &miners,
            &validator_shares,
            &full_nodes,
            &self.frozen_delegations,
            &subnet_owners,
        );
        if distribution.miner_pool_burned > 0 {
            self.burn.unmet_quota(distribution.miner_pool_burned, epoch, &mut self.supply);
        }

        // Penalties: non-revealers, then offline candidates
        let mut slashes = Vec::new();
        for validator in &aggregation.non_revealers {
            match self.slasher.slash(
                Offense::MissedReveal,
                *validator,
                None,
                producer,
                epoch,
                &mut self.validators,
                &mut self.delegations,
                &mut self.burn,
                &mut self.supply,
            ) {
                Ok(outcome) => slashes.push(outcome),
                Err(err) => warn!(%err, %validator, "missed-reveal slash skipped"),
            }
        }
        for validator in self.validators.offline_candidates(epoch, self.config.offline_window) {
            match self.slasher.slash(
                Offense::Offline,
                validator,
                None,
                producer,
                epoch,
                &mut self.validators,
                &mut self.delegations,
                &mut self.burn,
                &mut self.supply,
            ) {
                Ok(outcome) => slashes.push(outcome),
                Err(err) => warn!(%err, %validator, "offline slash skipped"),
            }
        }

        // Trust feedback lands now and applies from the next epoch on
        for (validator, deviation) in &aggregation.validator_deviation_bps {
            self.validators.update_trust_from_deviation(validator, *deviation);
        }
        let absent: Vec<Address> = self
            .validators
            .eligible(epoch)
            .map(|r| r.address)
            .filter(|a| !self.participants.contains(a))
            .collect();
        for validator in &absent {
            self.validators.decay_trust(validator);
        }

        // Boundary releases: jail terms, escrow, unbonding
        self.validators.unjail_due(next_epoch);
        let escrow_released = self.slasher.release_due_escrow(next_epoch);
        let unbonded = self.validators.release_unbonded(next_epoch);

        let state_root = self.state_root();
        let outcome = EpochOutcome {
            epoch,
            emission,
            utility_bps,
            canonical_scores: aggregation.canonical,
            reward_intents: distribution.intents,
            miner_pool_burned: distribution.miner_pool_burned,
            slashes,
            escrow_released,
            unbonded,
            state_root,
        };

        *self.snapshots.write() = Snapshots {
            supply: self.supply.snapshot(),
            validators: self.validators.snapshot(),
        };

        info!(
            epoch,
            emitted = outcome.emission.total(),
            intents = outcome.reward_intents.len(),
            slashes = outcome.slashes.len(),
            root = %hex::encode(&outcome.state_root[..8]),
            "epoch closed"
        );
        outcome
    }

    /// Deterministic state root over all entity namespaces, sorted by
    /// (namespace, key). Contains nothing non-deterministic.
    pub fn state_root(&self) -> Hash {
        let mut entries: Vec<(u8, Vec<u8>, Vec<u8>)> = Vec::new();

        let supply = self.supply.snapshot();
        let mut supply_value = Vec::with_capacity(64);
        supply_value.extend_from_slice(&supply.total_cap.to_be_bytes());
        supply_value.extend_from_slice(&supply.preminted.to_be_bytes());
        supply_value.extend_from_slice(&supply.minted_from_pool.to_be_bytes());
        supply_value.extend_from_slice(&supply.burned.to_be_bytes());
        entries.push((0, b"supply".to_vec(), supply_value));

        for record in self.validators.iter() {
            let mut value = Vec::with_capacity(64);
            value.extend_from_slice(&record.raw_stake.to_be_bytes());
            value.extend_from_slice(&record.trust_bps.to_be_bytes());
            value.extend_from_slice(&record.registered_epoch.to_be_bytes());
            value.extend_from_slice(&record.jailed_until_epoch.unwrap_or(0).to_be_bytes());
            value.extend_from_slice(&record.unbonding_at_epoch.unwrap_or(0).to_be_bytes());
            value.push(record.active as u8);
            entries.push((1, record.address.as_bytes().to_vec(), value));
        }

        for delegation in self.delegations.iter() {
            let mut key = Vec::with_capacity(40);
            key.extend_from_slice(delegation.delegator.as_bytes());
            key.extend_from_slice(delegation.validator.as_bytes());
            let mut value = Vec::with_capacity(32);
            value.extend_from_slice(&delegation.raw_stake.to_be_bytes());
            value.extend_from_slice(&delegation.lock_until_epoch.to_be_bytes());
            value.extend_from_slice(&delegation.lock_bonus_bps.to_be_bytes());
            entries.push((2, key, value));
        }

        for (miner, stats) in self.scoring.miners() {
            let mut value = Vec::with_capacity(24);
            value.extend_from_slice(&stats.tasks_completed.to_be_bytes());
            value.extend_from_slice(&stats.gpu_tasks_completed.to_be_bytes());
            value.extend_from_slice(&stats.cumulative_quality.to_be_bytes());
            entries.push((3, miner.as_bytes().to_vec(), value));
        }

        let totals = self.burn.totals();
        let mut burn_value = Vec::with_capacity(80);
        burn_value.extend_from_slice(&totals.tx_fee.to_be_bytes());
        burn_value.extend_from_slice(&totals.subnet.to_be_bytes());
        burn_value.extend_from_slice(&totals.unmet_quota.to_be_bytes());
        burn_value.extend_from_slice(&totals.slash.to_be_bytes());
        burn_value.extend_from_slice(&totals.recycled_residual.to_be_bytes());
        entries.push((4, b"burn_totals".to_vec(), burn_value));

        // BTreeMap iteration already yields sorted keys per namespace and
        // the namespaces were pushed in ascending order
        namespaced_root(&entries)
    }

    /// Stake-weighted block proposer for a slot, from the epoch's RANDAO seed
    pub fn select_leader(&self, slot: u64) -> Option<Address> {
        self.validators.select_leader(&self.epoch_seed, slot)
    }

    // ── Host-facing inputs outside the transaction set ──

    /// Report a completed CPU task for a miner
    pub fn record_task(&mut self, miner: Address, quality: u64, difficulty_bps: u32) {
        self.scoring.record_task(miner, quality, difficulty_bps);
    }

    /// Report a completed, validator-verified GPU task for a miner
    pub fn record_gpu_task(&mut self, miner: Address, quality: u64, difficulty_bps: u32) {
        self.scoring.record_gpu_task(miner, quality, difficulty_bps);
    }

    /// Register or restake a Full-tier infrastructure node
    pub fn register_full_node(&mut self, address: Address, raw_stake: u128) {
        self.full_nodes.insert(address, raw_stake);
    }

    /// Begin unbonding a validator. The stake stays slashable until the
    /// returned release epoch.
    pub fn request_unbond(&mut self, validator: Address) -> Result<u64> {
        self.validators.request_unbond(validator, self.current_epoch)
    }

    /// Withdraw a delegation whose lock has expired. Returns the released
    /// stake for the execution layer to credit.
    pub fn undelegate(&mut self, delegator: Address, validator: Address) -> Result<u128> {
        self.delegations.undelegate(delegator, validator, self.current_epoch)
    }

    /// Mark a registered subnet owner as active in the current epoch
    pub fn record_subnet_activity(&mut self, owner: Address) {
        if self.subnet_owners.contains(&owner) {
            self.active_subnet_owners.insert(owner);
        }
    }

    // ── Read-only views ──

    /// Supply snapshot as of the last epoch boundary
    pub fn supply_snapshot(&self) -> SupplyState {
        self.snapshots.read().supply
    }

    /// Live supply view (single-threaded callers only)
    pub fn supply(&self) -> SupplyState {
        self.supply.snapshot()
    }

    /// Validator set snapshot as of the last epoch boundary
    pub fn validator_snapshot(&self) -> Vec<ValidatorRecord> {
        self.snapshots.read().validators.clone()
    }

    pub fn burn_totals(&self) -> BurnTotals {
        self.burn.totals()
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    pub fn epoch_seed(&self) -> Hash {
        self.epoch_seed
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn delegations(&self) -> &DelegationSet {
        &self.delegations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        Address::new(bytes)
    }

    fn engine() -> EpochEngine {
        EpochEngine::new(EngineConfig::default())
    }

    fn boundary_block(epoch: u64) -> BlockEvent {
        let mut block = BlockEvent::empty(epoch * EPOCH_BLOCKS, addr(99));
        block.randao_reveal = Some([epoch as u8 + 1; 32]);
        block
    }

    #[test]
    fn test_epoch_numbering() {
        let mut engine = engine();
        assert!(engine.on_block(boundary_block(0)).is_none());
        assert_eq!(engine.current_epoch(), 0);

        for h in 1..EPOCH_BLOCKS {
            assert!(engine.on_block(BlockEvent::empty(h, addr(99))).is_none());
        }

        let outcome = engine.on_block(boundary_block(1)).expect("epoch 0 closes");
        assert_eq!(outcome.epoch, 0);
        assert_eq!(engine.current_epoch(), 1);
    }

    #[test]
    fn test_seed_latched_from_randao() {
        let mut engine = engine();
        engine.on_block(boundary_block(0));
        assert_eq!(engine.epoch_seed(), [1u8; 32]);

        // missing beacon falls back deterministically
        for h in 1..EPOCH_BLOCKS {
            engine.on_block(BlockEvent::empty(h, addr(99)));
        }
        let mut no_beacon = BlockEvent::empty(EPOCH_BLOCKS, addr(99));
        no_beacon.randao_reveal = None;
        engine.on_block(no_beacon);
        assert_ne!(engine.epoch_seed(), [1u8; 32]);
    }

    #[test]
    fn test_rejected_submission_leaves_block_valid() {
        let mut engine = engine();
        let mut block = boundary_block(0);
        // commit from an unregistered validator is dropped, not fatal
        block.transactions.push(CoreTransaction::Commit {
            validator: addr(1),
            epoch: 0,
            commit_hash: [0u8; 32],
        });
        assert!(engine.on_block(block).is_none());
    }

    #[test]
    fn test_fee_and_subnet_burns_route_through_supply() {
        let mut engine = engine();
        let mut block = boundary_block(0);
        block.base_fee_total = 1_000;
        block.subnet_registrations = vec![(addr(7), 2_000)];
        engine.on_block(block);

        let totals = engine.burn_totals();
        assert_eq!(totals.tx_fee, 500);
        assert_eq!(totals.subnet, 1_000);
        assert_eq!(engine.supply().burned, 1_500);
    }

    #[test]
    fn test_state_root_changes_with_state() {
        let mut engine = engine();
        engine.on_block(boundary_block(0));
        let root_before = engine.state_root();

        let mut block = BlockEvent::empty(1, addr(99));
        block.transactions.push(CoreTransaction::RegisterValidator {
            validator: addr(1),
            stake: 100 * tensorium_core::constants::tokenomics::ONE_TOKEN,
        });
        engine.on_block(block);

        assert_ne!(engine.state_root(), root_before);
    }

    #[test]
    fn test_state_root_is_deterministic() {
        let build = || {
            let mut engine = engine();
            engine.on_block(boundary_block(0));
            let mut block = BlockEvent::empty(1, addr(99));
            block.transactions.push(CoreTransaction::RegisterValidator {
                validator: addr(1),
                stake: 100 * tensorium_core::constants::tokenomics::ONE_TOKEN,
            });
            block.transactions.push(CoreTransaction::Delegate {
                delegator: addr(2),
                validator: addr(1),
                amount: 10 * tensorium_core::constants::tokenomics::ONE_TOKEN,
                lock: LockPeriod::Days90,
            });
            engine.on_block(block);
            engine.state_root()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_subnet_activity_requires_registration() {
        let mut engine = engine();
        engine.on_block(boundary_block(0));

        engine.record_subnet_activity(addr(5));
        assert!(engine.active_subnet_owners.is_empty());

        let mut block = BlockEvent::empty(1, addr(99));
        block.subnet_registrations = vec![(addr(5), 1_000)];
        engine.on_block(block);
        assert!(engine.active_subnet_owners.contains(&addr(5)));
    }
}
