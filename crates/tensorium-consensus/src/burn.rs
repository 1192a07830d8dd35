// Burn manager: the four burn channels of the tokenomics
// (tx fees, subnet registration, unmet quota, slashing), all writing
// through the supply ledger. The non-burned half of subnet registration
// fees is recycled into a per-epoch pool the emission controller drains
// before minting.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::supply::SupplyLedger;

/// Why an amount was burned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BurnReason {
    TxFee,
    SubnetReg,
    UnmetQuota,
    Slash,
    /// Recycled subnet-fee tokens the emission controller did not consume
    /// before the epoch closed
    RecycledResidual,
}

/// Burn rates per channel, in basis points of the routed amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnConfig {
    /// Share of each block's base fees that is burned (50%)
    pub tx_fee_burn_bps: u32,
    /// Share of subnet registration fees burned; the rest is recycled (50%)
    pub subnet_burn_bps: u32,
    /// Share of a quota-failed miner pool burned (100%)
    pub unmet_quota_burn_bps: u32,
    /// Share of slashed stake burned (80%)
    pub slash_burn_bps: u32,
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            tx_fee_burn_bps: 5_000,
            subnet_burn_bps: 5_000,
            unmet_quota_burn_bps: 10_000,
            slash_burn_bps: 8_000,
        }
    }
}

/// One recorded burn, append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnEvent {
    pub epoch: u64,
    pub reason: BurnReason,
    pub amount: u128,
}

/// Cumulative totals per channel
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BurnTotals {
    pub tx_fee: u128,
    pub subnet: u128,
    pub unmet_quota: u128,
    pub slash: u128,
    pub recycled_residual: u128,
}

impl BurnTotals {
    pub fn total(&self) -> u128 {
        self.tx_fee + self.subnet + self.unmet_quota + self.slash + self.recycled_residual
    }
}

/// Tracks burns and the per-epoch recycled pool
#[derive(Debug, Clone, Default)]
pub struct BurnManager {
    config: BurnConfig,
    totals: BurnTotals,
    events: Vec<BurnEvent>,
    recycled_pool: u128,
}

impl BurnManager {
    pub fn new(config: BurnConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Burn the protocol share of a block's base fees.
    /// Returns (burned, relay share left for the execution layer).
    pub fn burn_tx_fees(
        &mut self,
        base_fees: u128,
        epoch: u64,
        supply: &mut SupplyLedger,
    ) -> (u128, u128) {
        let burned = base_fees * self.config.tx_fee_burn_bps as u128 / 10_000;
        self.record(BurnReason::TxFee, burned, epoch, supply);
        self.totals.tx_fee += burned;
        (burned, base_fees - burned)
    }

    /// Burn half of a subnet registration fee; recycle the other half into
    /// the epoch's emission pool. Returns (burned, recycled).
    pub fn subnet_registration(
        &mut self,
        fee: u128,
        epoch: u64,
        supply: &mut SupplyLedger,
    ) -> (u128, u128) {
        let burned = fee * self.config.subnet_burn_bps as u128 / 10_000;
        let recycled = fee - burned;
        self.record(BurnReason::SubnetReg, burned, epoch, supply);
        self.totals.subnet += burned;
        self.recycled_pool += recycled;
        (burned, recycled)
    }

    /// Burn the miner pool of an epoch that failed its utility quota
    pub fn unmet_quota(&mut self, amount: u128, epoch: u64, supply: &mut SupplyLedger) -> u128 {
        let burned = amount * self.config.unmet_quota_burn_bps as u128 / 10_000;
        self.record(BurnReason::UnmetQuota, burned, epoch, supply);
        self.totals.unmet_quota += burned;
        burned
    }

    /// Burn the configured share of a slashed amount.
    /// Returns the burned portion; the remainder stays with the slasher
    /// for the reporter award and the escrow.
    pub fn burn_slashed(
        &mut self,
        slashed: u128,
        epoch: u64,
        supply: &mut SupplyLedger,
    ) -> u128 {
        let burned = slashed * self.config.slash_burn_bps as u128 / 10_000;
        self.record(BurnReason::Slash, burned, epoch, supply);
        self.totals.slash += burned;
        burned
    }

    /// Drain the recycled pool for the closing epoch. The pool never
    /// carries across epochs: the emission controller consumes what it
    /// needs and the orchestrator burns any remainder.
    pub fn take_recycled(&mut self) -> u128 {
        std::mem::take(&mut self.recycled_pool)
    }

    /// Burn an unconsumed recycled remainder at epoch close
    pub fn burn_recycled_remainder(
        &mut self,
        remainder: u128,
        epoch: u64,
        supply: &mut SupplyLedger,
    ) {
        if remainder > 0 {
            self.record(BurnReason::RecycledResidual, remainder, epoch, supply);
            self.totals.recycled_residual += remainder;
        }
    }

    pub fn recycled_pool(&self) -> u128 {
        self.recycled_pool
    }

    pub fn totals(&self) -> BurnTotals {
        self.totals
    }

    /// Most recent burn events, newest first
    pub fn recent_events(&self, count: usize) -> Vec<BurnEvent> {
        self.events.iter().rev().take(count).cloned().collect()
    }

    fn record(&mut self, reason: BurnReason, amount: u128, epoch: u64, supply: &mut SupplyLedger) {
        if amount == 0 {
            return;
        }
        supply.record_burn(amount);
        self.events.push(BurnEvent { epoch, reason, amount });
        info!(epoch, ?reason, amount, "burn recorded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SupplyLedger {
        SupplyLedger::new(10_000_000, 5_000_000)
    }

    #[test]
    fn test_tx_fee_split() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        let (burned, relay) = manager.burn_tx_fees(1000, 0, &mut supply);

        assert_eq!(burned, 500);
        assert_eq!(relay, 500);
        assert_eq!(manager.totals().tx_fee, 500);
        assert_eq!(supply.snapshot().burned, 500);
    }

    #[test]
    fn test_subnet_registration_recycles_half() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        let (burned, recycled) = manager.subnet_registration(1000, 0, &mut supply);

        assert_eq!(burned, 500);
        assert_eq!(recycled, 500);
        assert_eq!(manager.recycled_pool(), 500);
        // recycled tokens are not burned
        assert_eq!(supply.snapshot().burned, 500);
    }

    #[test]
    fn test_recycled_pool_drains_completely() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        manager.subnet_registration(1000, 0, &mut supply);
        assert_eq!(manager.take_recycled(), 500);
        assert_eq!(manager.recycled_pool(), 0);
        assert_eq!(manager.take_recycled(), 0);
    }

    #[test]
    fn test_unconsumed_recycled_burns_under_its_own_reason() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        manager.subnet_registration(1000, 0, &mut supply);
        let leftover = manager.take_recycled();
        manager.burn_recycled_remainder(leftover, 0, &mut supply);

        let totals = manager.totals();
        // registration burn and residual burn stay separate
        assert_eq!(totals.subnet, 500);
        assert_eq!(totals.recycled_residual, 500);
        assert_eq!(manager.recent_events(1)[0].reason, BurnReason::RecycledResidual);
        assert_eq!(supply.snapshot().burned, 1000);
    }

    #[test]
    fn test_unmet_quota_burns_everything() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        let burned = manager.unmet_quota(777, 3, &mut supply);

        assert_eq!(burned, 777);
        assert_eq!(manager.totals().unmet_quota, 777);
    }

    #[test]
    fn test_slash_burn_share() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        let burned = manager.burn_slashed(1000, 0, &mut supply);

        assert_eq!(burned, 800);
        assert_eq!(manager.totals().slash, 800);
    }

    #[test]
    fn test_event_log() {
        let mut manager = BurnManager::default();
        let mut supply = ledger();

        manager.burn_tx_fees(100, 1, &mut supply);
        manager.unmet_quota(200, 2, &mut supply);

        let events = manager.recent_events(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].reason, BurnReason::UnmetQuota);
        assert_eq!(events[0].epoch, 2);
        assert_eq!(events[1].reason, BurnReason::TxFee);
    }
}
