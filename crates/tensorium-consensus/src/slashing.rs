// Slashing and jailing: penalties for double-signing, missed reveals,
// prolonged downtime and collusion.
//
// Every slash splits exactly: 80% burned, 10% to the reporter (or the block
// producer when no reporter is named), 10% escrowed and returned when the
// jail term ends. Delegations behind the offender are slashed at the same
// rate and follow the same split, with their escrow returning to the
// delegators pro-rata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensorium_core::types::Address;
use tracing::{info, warn};

use crate::burn::BurnManager;
use crate::delegation::DelegationSet;
use crate::error::Result;
use crate::supply::SupplyLedger;
use crate::validator_set::ValidatorSet;

/// Punishable offenses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Offense {
    /// Two signatures at the same height
    DoubleSign,
    /// Committed but never revealed
    MissedReveal,
    /// Idle beyond the offline window; penalty escalates with repetition
    Offline,
    /// Proven collusion in aggregation (challenged fraud proof)
    Collusion,
}

impl Offense {
    /// Penalty in basis points of raw stake. Offline offenses escalate:
    /// 1%, 3%, 10%, then 25% for every further repetition.
    pub fn slash_bps(&self, prior_offline_offenses: u32) -> u32 {
        match self {
            Offense::DoubleSign => 1_000,
            Offense::MissedReveal => 200,
            Offense::Offline => match prior_offline_offenses {
                0 => 100,
                1 => 300,
                2 => 1_000,
                _ => 2_500,
            },
            Offense::Collusion => 1_000,
        }
    }

    /// Jail term in epochs
    pub fn jail_epochs(&self) -> u64 {
        match self {
            Offense::DoubleSign => 7_200,
            Offense::MissedReveal => 8,
            Offense::Offline => 1,
            Offense::Collusion => 7_200,
        }
    }
}

/// Split configuration; the escrow share is the remainder so the three
/// parts always sum to the slashed amount exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashingConfig {
    pub burn_bps: u32,
    pub reporter_bps: u32,
}

impl Default for SlashingConfig {
    fn default() -> Self {
        Self { burn_bps: 8_000, reporter_bps: 1_000 }
    }
}

/// Record of one executed slash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashOutcome {
    pub epoch: u64,
    pub validator: Address,
    pub offense: Offense,
    /// Validator stake removed
    pub validator_slashed: u128,
    /// Delegated stake removed across all delegations to the validator
    pub delegators_slashed: u128,
    pub burned: u128,
    pub reporter: Address,
    pub reporter_award: u128,
    pub escrowed: u128,
    pub jailed_until_epoch: u64,
}

/// Stake held back until the offender's jail term ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Who the escrow returns to (the validator, or a slashed delegator)
    pub owner: Address,
    pub amount: u128,
    pub release_epoch: u64,
}

/// Executes slashes and tracks escrow and offline escalation
#[derive(Debug, Clone, Default)]
pub struct Slasher {
    config: SlashingConfig,
    offline_offenses: BTreeMap<Address, u32>,
    escrow: Vec<EscrowEntry>,
    history: Vec<SlashOutcome>,
}

impl Slasher {
    pub fn new(config: SlashingConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Apply an offense. Removes stake from the validator and its
    /// delegators, burns 80%, awards 10% and escrows the rest.
    #[allow(clippy::too_many_arguments)]
    pub fn slash(
        &mut self,
        offense: Offense,
        validator: Address,
        reporter: Option<Address>,
        block_producer: Address,
        epoch: u64,
        validators: &mut ValidatorSet,
        delegations: &mut DelegationSet,
        burn: &mut BurnManager,
        supply: &mut SupplyLedger,
    ) -> Result<SlashOutcome> {
        let prior_offline = self.offline_offenses.get(&validator).copied().unwrap_or(0);
        let slash_bps = offense.slash_bps(prior_offline);

        let raw_stake = validators
            .get(&validator)
            .map(|r| r.raw_stake)
            .ok_or(crate::error::ConsensusError::UnknownValidator(validator))?;
        let requested = raw_stake * slash_bps as u128 / 10_000;
        let validator_slashed = validators.slash_stake(&validator, requested)?;

        let delegator_cuts = delegations.slash_validator_delegations(&validator, slash_bps);
        let delegators_slashed: u128 = delegator_cuts.iter().map(|(_, c)| c).sum();

        let reporter = reporter.unwrap_or(block_producer);
        let jailed_until = epoch + offense.jail_epochs();

        // Validator portion: escrow returns to the validator
        let (v_burned, v_award, v_escrow) =
            self.split(validator_slashed, validator, jailed_until, epoch, burn, supply);

        // Delegator portions: same split per delegation, with each escrow
        // remainder returning to its own delegator
        let mut d_burned_total = 0u128;
        let mut d_award_total = 0u128;
        let mut d_escrow_total = 0u128;
        for (delegator, cut) in delegator_cuts {
            let (b, a, e) = self.split(cut, delegator, jailed_until, epoch, burn, supply);
            d_burned_total += b;
            d_award_total += a;
            d_escrow_total += e;
        }

        match offense {
            Offense::Offline => {
                *self.offline_offenses.entry(validator).or_insert(0) += 1;
            }
            Offense::MissedReveal => validators.record_missed_reveal(&validator),
            Offense::DoubleSign | Offense::Collusion => {
                validators.record_double_sign(&validator)
            }
        }
        validators.jail(&validator, jailed_until);

        let outcome = SlashOutcome {
            epoch,
            validator,
            offense,
            validator_slashed,
            delegators_slashed,
            burned: v_burned + d_burned_total,
            reporter,
            reporter_award: v_award + d_award_total,
            escrowed: v_escrow + d_escrow_total,
            jailed_until_epoch: jailed_until,
        };
        warn!(
            %validator,
            ?offense,
            slashed = validator_slashed + delegators_slashed,
            burned = outcome.burned,
            jailed_until,
            "validator slashed"
        );
        self.history.push(outcome.clone());
        Ok(outcome)
    }

    // 80/10/10 split of one slashed amount; the escrow takes the remainder
    // so the parts sum to `amount` exactly.
    fn split(
        &mut self,
        amount: u128,
        escrow_owner: Address,
        release_epoch: u64,
        epoch: u64,
        burn: &mut BurnManager,
        supply: &mut SupplyLedger,
    ) -> (u128, u128, u128) {
        let burned = burn.burn_slashed(amount, epoch, supply);
        let award = amount * self.config.reporter_bps as u128 / 10_000;
        let escrowed = amount - burned - award;
        if escrowed > 0 {
            self.escrow.push(EscrowEntry { owner: escrow_owner, amount: escrowed, release_epoch });
        }
        (burned, award, escrowed)
    }

    /// Escrow entries due at `epoch`, removed and returned for crediting
    pub fn release_due_escrow(&mut self, epoch: u64) -> Vec<EscrowEntry> {
        let (due, pending): (Vec<EscrowEntry>, Vec<EscrowEntry>) =
            self.escrow.drain(..).partition(|e| epoch >= e.release_epoch);
        self.escrow = pending;
        for entry in &due {
            info!(owner = %entry.owner, amount = entry.amount, "slash escrow released");
        }
        due
    }

    pub fn escrow_balance(&self) -> u128 {
        self.escrow.iter().map(|e| e.amount).sum()
    }

    pub fn history(&self) -> &[SlashOutcome] {
        &self.history
    }

    pub fn offline_offense_count(&self, validator: &Address) -> u32 {
        self.offline_offenses.get(validator).copied().unwrap_or(0)
    }
}
