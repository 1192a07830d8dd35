// Delegations: stake entrusted to a validator with an optional lock period.
// The lock bonus is fixed at deposit. Reward weights are frozen at epoch
// start; slashing applies to whatever stake is present at the offense.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensorium_core::constants::consensus::EPOCHS_PER_DAY;
use tensorium_core::types::Address;
use tracing::info;

use crate::error::{ConsensusError, Result};
use crate::stake::log_stake;

/// Lock periods selectable at deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPeriod {
    None,
    Days30,
    Days90,
    Days180,
    Days365,
}

impl LockPeriod {
    /// Reward-weight bonus for this lock, in basis points
    pub fn bonus_bps(&self) -> u32 {
        match self {
            LockPeriod::None => 0,
            LockPeriod::Days30 => 1_000,
            LockPeriod::Days90 => 2_500,
            LockPeriod::Days180 => 5_000,
            LockPeriod::Days365 => 10_000,
        }
    }

    /// Lock duration in epochs
    pub fn epochs(&self) -> u64 {
        let days = match self {
            LockPeriod::None => 0,
            LockPeriod::Days30 => 30,
            LockPeriod::Days90 => 90,
            LockPeriod::Days180 => 180,
            LockPeriod::Days365 => 365,
        };
        days * EPOCHS_PER_DAY
    }
}

/// A delegation record, unique per (delegator, validator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    pub raw_stake: u128,
    pub lock_until_epoch: u64,
    pub lock_bonus_bps: u32,
}

impl Delegation {
    /// Reward weight: log_stake scaled by the lock bonus
    pub fn effective_weight(&self) -> u128 {
        log_stake(self.raw_stake) * (10_000 + self.lock_bonus_bps as u128) / 10_000
    }
}

/// All live delegations, keyed (delegator, validator)
#[derive(Debug, Clone, Default)]
pub struct DelegationSet {
    delegations: BTreeMap<(Address, Address), Delegation>,
}

impl DelegationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or top up a delegation. Adding stake to an existing record
    /// keeps the stronger of the old and new lock terms.
    pub fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: u128,
        lock: LockPeriod,
        epoch: u64,
    ) {
        let lock_until = epoch + lock.epochs();
        let entry = self
            .delegations
            .entry((delegator, validator))
            .or_insert(Delegation {
                delegator,
                validator,
                raw_stake: 0,
                lock_until_epoch: lock_until,
                lock_bonus_bps: lock.bonus_bps(),
            });
        entry.raw_stake = entry.raw_stake.saturating_add(amount);
        entry.lock_until_epoch = entry.lock_until_epoch.max(lock_until);
        entry.lock_bonus_bps = entry.lock_bonus_bps.max(lock.bonus_bps());
        info!(%delegator, %validator, amount, lock_until = entry.lock_until_epoch, "delegation updated");
    }

    /// Withdraw a full delegation once its lock has expired
    pub fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        epoch: u64,
    ) -> Result<u128> {
        let key = (delegator, validator);
        let delegation = self
            .delegations
            .get(&key)
            .ok_or(ConsensusError::DelegationNotFound { delegator, validator })?;
        if epoch < delegation.lock_until_epoch {
            return Err(ConsensusError::LockActive(delegation.lock_until_epoch));
        }
        let released = self.delegations.remove(&key).map(|d| d.raw_stake).unwrap_or(0);
        info!(%delegator, %validator, released, "delegation withdrawn");
        Ok(released)
    }

    /// Slash every delegation behind `validator` at `slash_bps` of its
    /// stake. Returns (delegator, amount removed) pairs in key order.
    pub fn slash_validator_delegations(
        &mut self,
        validator: &Address,
        slash_bps: u32,
    ) -> Vec<(Address, u128)> {
        let mut cuts = Vec::new();
        for delegation in self.delegations.values_mut() {
            if &delegation.validator == validator {
                let cut = delegation.raw_stake * slash_bps as u128 / 10_000;
                delegation.raw_stake -= cut;
                if cut > 0 {
                    cuts.push((delegation.delegator, cut));
                }
            }
        }
        cuts
    }

    /// Delegations behind one validator, key-sorted
    pub fn for_validator<'a>(
        &'a self,
        validator: &'a Address,
    ) -> impl Iterator<Item = &'a Delegation> + 'a {
        self.delegations.values().filter(move |d| &d.validator == validator)
    }

    /// All delegations, key-sorted. The orchestrator clones this view at
    /// epoch start to freeze reward weights.
    pub fn iter(&self) -> impl Iterator<Item = &Delegation> {
        self.delegations.values()
    }

    pub fn snapshot(&self) -> Vec<Delegation> {
        self.delegations.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }
}
