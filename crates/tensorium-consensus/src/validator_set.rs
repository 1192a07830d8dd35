// Validator set: registration, unbonding, jail state, trust scores and
// stake-weighted leader selection.
//
// The set is an ordered map keyed by address. Leader selection runs over a
// Fenwick tree of effective stakes that is rebuilt at epoch boundaries, so
// a single selection is O(log n) and intra-epoch selections see a frozen
// weight view. The selection seed comes from the epoch's RANDAO output,
// never from a block hash.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensorium_core::constants::staking::{MAX_ACTIVE_VALIDATORS, UNBONDING_EPOCHS, VALIDATOR_MIN_STAKE};
use tensorium_core::types::{Address, Hash};
use tensorium_crypto::keccak256_concat;
use tracing::{info, warn};

use crate::error::{ConsensusError, Result};
use crate::stake::log_stake;

/// Trust score bounds, in basis points of 1.0
pub const TRUST_FLOOR_BPS: u32 = 1_000;
pub const TRUST_CEIL_BPS: u32 = 15_000;
pub const TRUST_INITIAL_BPS: u32 = 10_000;

/// A registered validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub address: Address,
    pub raw_stake: u128,
    pub registered_epoch: u64,
    /// Member of the active set (false while waiting or unbonding)
    pub active: bool,
    pub jailed_until_epoch: Option<u64>,
    pub last_activity_epoch: u64,
    /// Trust score in [0.1, 1.5], basis points of 1.0
    pub trust_bps: u32,
    pub missed_reveals: u32,
    pub double_signs: u32,
    /// Epoch at which unbonded stake is released, if unbonding
    pub unbonding_at_epoch: Option<u64>,
}

impl ValidatorRecord {
    /// log_stake(raw) scaled by the trust score. This is the only weight
    /// the rest of the system ever sees.
    pub fn effective_stake(&self) -> u128 {
        log_stake(self.raw_stake) * self.trust_bps as u128 / 10_000
    }

    /// Eligible for selection and rewards at `epoch`
    pub fn is_eligible(&self, epoch: u64) -> bool {
        self.active
            && self.unbonding_at_epoch.is_none()
            && self.jailed_until_epoch.map_or(true, |until| epoch >= until)
    }
}

// Fenwick (binary indexed) tree over effective stakes; gives O(log n)
// prefix-sum search for stake-weighted selection.
#[derive(Debug, Clone, Default)]
struct Fenwick {
    tree: Vec<u128>,
}

impl Fenwick {
    fn new(weights: &[u128]) -> Self {
        let n = weights.len();
        let mut tree = vec![0u128; n + 1];
        for (i, w) in weights.iter().enumerate() {
            let mut idx = i + 1;
            while idx <= n {
                tree[idx] += w;
                idx += idx & idx.wrapping_neg();
            }
        }
        Self { tree }
    }

    fn total(&self) -> u128 {
        let n = self.tree.len() - 1;
        let mut idx = n;
        let mut sum = 0;
        while idx > 0 {
            sum += self.tree[idx];
            idx -= idx & idx.wrapping_neg();
        }
        sum
    }

    /// Index of the first position whose prefix sum exceeds `target`
    fn select(&self, mut target: u128) -> usize {
        let n = self.tree.len() - 1;
        let mut pos = 0usize;
        let mut step = n.next_power_of_two();
        while step > 0 {
            let next = pos + step;
            if next <= n && self.tree[next] <= target {
                target -= self.tree[next];
                pos = next;
            }
            step >>= 1;
        }
        pos
    }
}

/// The validator set and its secondary selection index
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    validators: BTreeMap<Address, ValidatorRecord>,
    /// Registrants beyond the active cap, heaviest first
    waiting: Vec<Address>,
    /// Selection index, rebuilt at epoch boundaries
    index: Fenwick,
    index_addrs: Vec<Address>,
    max_active: usize,
    min_stake: u128,
    unbonding_epochs: u64,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self {
            max_active: MAX_ACTIVE_VALIDATORS,
            min_stake: VALIDATOR_MIN_STAKE,
            unbonding_epochs: UNBONDING_EPOCHS,
            ..Default::default()
        }
    }

    pub fn with_limits(max_active: usize, min_stake: u128, unbonding_epochs: u64) -> Self {
        Self { max_active, min_stake, unbonding_epochs, ..Default::default() }
    }

    /// Register a validator. Beyond the active cap the registrant joins a
    /// stake-sorted waiting queue instead of failing.
    pub fn register(&mut self, address: Address, raw_stake: u128, epoch: u64) -> Result<()> {
        if raw_stake < self.min_stake {
            return Err(ConsensusError::InsufficientStake {
                provided: raw_stake,
                required: self.min_stake,
            });
        }
        if self.validators.contains_key(&address) {
            return Err(ConsensusError::ValidatorExists(address));
        }

        let active = self.active_count() < self.max_active;
        let record = ValidatorRecord {
            address,
            raw_stake,
            registered_epoch: epoch,
            active,
            jailed_until_epoch: None,
            last_activity_epoch: epoch,
            trust_bps: TRUST_INITIAL_BPS,
            missed_reveals: 0,
            double_signs: 0,
            unbonding_at_epoch: None,
        };
        self.validators.insert(address, record);

        if !active {
            self.enqueue_waiting(address);
            info!(%address, raw_stake, "validator queued behind active-set cap");
        } else {
            info!(%address, raw_stake, epoch, "validator registered");
        }
        Ok(())
    }

    /// Begin unbonding. The stake stays slashable until the release epoch.
    pub fn request_unbond(&mut self, address: Address, epoch: u64) -> Result<u64> {
        let unbonding_epochs = self.unbonding_epochs;
        let record = self
            .validators
            .get_mut(&address)
            .ok_or(ConsensusError::UnknownValidator(address))?;
        if record.unbonding_at_epoch.is_some() {
            return Err(ConsensusError::Unbonding(address));
        }
        let release = epoch + unbonding_epochs;
        record.unbonding_at_epoch = Some(release);
        record.active = false;
        self.waiting.retain(|a| a != &address);
        self.promote_waiting();
        info!(%address, release, "validator unbonding");
        Ok(release)
    }

    /// Remove validators whose unbonding period has elapsed.
    /// Returns (address, released stake) pairs for the execution layer.
    pub fn release_unbonded(&mut self, epoch: u64) -> Vec<(Address, u128)> {
        let due: Vec<Address> = self
            .validators
            .iter()
            .filter(|(_, r)| r.unbonding_at_epoch.map_or(false, |at| epoch >= at))
            .map(|(a, _)| *a)
            .collect();

        let mut released = Vec::with_capacity(due.len());
        for address in due {
            if let Some(record) = self.validators.remove(&address) {
                info!(%address, stake = record.raw_stake, "unbonding complete");
                released.push((address, record.raw_stake));
            }
        }
        if !released.is_empty() {
            self.promote_waiting();
        }
        released
    }

    /// Bar a validator from selection and rewards until `until_epoch`
    pub fn jail(&mut self, address: &Address, until_epoch: u64) {
        if let Some(record) = self.validators.get_mut(address) {
            record.jailed_until_epoch = Some(until_epoch);
            warn!(%address, until_epoch, "validator jailed");
        }
    }

    /// Clear expired jail terms. Unjail is automatic at epoch boundaries.
    pub fn unjail_due(&mut self, epoch: u64) -> Vec<Address> {
        let mut unjailed = Vec::new();
        for (address, record) in self.validators.iter_mut() {
            if record.jailed_until_epoch.map_or(false, |until| epoch >= until) {
                record.jailed_until_epoch = None;
                info!(%address, epoch, "validator unjailed");
                unjailed.push(*address);
            }
        }
        unjailed
    }

    /// Deduct slashed stake. Returns the amount actually removed.
    pub fn slash_stake(&mut self, address: &Address, amount: u128) -> Result<u128> {
        let record = self
            .validators
            .get_mut(address)
            .ok_or(ConsensusError::UnknownValidator(*address))?;
        let slashed = amount.min(record.raw_stake);
        record.raw_stake -= slashed;
        Ok(slashed)
    }

    /// Record validator activity for the offline tracker
    pub fn activity_tick(&mut self, address: &Address, epoch: u64) {
        if let Some(record) = self.validators.get_mut(address) {
            record.last_activity_epoch = record.last_activity_epoch.max(epoch);
        }
    }

    /// Active validators idle for more than `window` epochs
    pub fn offline_candidates(&self, epoch: u64, window: u64) -> Vec<Address> {
        self.validators
            .values()
            .filter(|r| r.is_eligible(epoch))
            .filter(|r| epoch.saturating_sub(r.last_activity_epoch) > window)
            .map(|r| r.address)
            .collect()
    }

    /// Next-epoch trust from this epoch's mean weight deviation:
    /// `trust' = clamp(0.1, 1.5, 0.9 * trust + 0.1 * (1 - dev))`
    pub fn update_trust_from_deviation(&mut self, address: &Address, avg_deviation_bps: u32) {
        if let Some(record) = self.validators.get_mut(address) {
            let agreement = 10_000u64.saturating_sub(avg_deviation_bps.min(10_000) as u64);
            let next = (record.trust_bps as u64 * 9 + agreement) / 10;
            record.trust_bps = (next as u32).clamp(TRUST_FLOOR_BPS, TRUST_CEIL_BPS);
        }
    }

    /// Trust decay for a validator absent an entire epoch (x0.95)
    pub fn decay_trust(&mut self, address: &Address) {
        if let Some(record) = self.validators.get_mut(address) {
            record.trust_bps =
                (record.trust_bps as u64 * 95 / 100).max(TRUST_FLOOR_BPS as u64) as u32;
        }
    }

    pub fn record_missed_reveal(&mut self, address: &Address) {
        if let Some(record) = self.validators.get_mut(address) {
            record.missed_reveals += 1;
        }
    }

    pub fn record_double_sign(&mut self, address: &Address) {
        if let Some(record) = self.validators.get_mut(address) {
            record.double_signs += 1;
        }
    }

    /// Rebuild the selection index over validators eligible at `epoch`.
    /// Called once per epoch boundary; selections within the epoch then run
    /// against this frozen view.
    pub fn rebuild_selection_index(&mut self, epoch: u64) {
        self.index_addrs = self
            .validators
            .values()
            .filter(|r| r.is_eligible(epoch))
            .map(|r| r.address)
            .collect();
        let weights: Vec<u128> = self
            .index_addrs
            .iter()
            .map(|a| self.validators[a].effective_stake())
            .collect();
        self.index = Fenwick::new(&weights);
    }

    /// Stake-weighted leader for `slot`, seeded by the epoch's RANDAO
    /// output. O(log n) over the rebuilt index.
    pub fn select_leader(&self, seed: &Hash, slot: u64) -> Option<Address> {
        let total = self.index.total();
        if total == 0 || self.index_addrs.is_empty() {
            return None;
        }
        let digest = keccak256_concat(seed, &slot.to_be_bytes());
        let mut value = [0u8; 16];
        value.copy_from_slice(&digest[..16]);
        let target = u128::from_be_bytes(value) % total;
        let idx = self.index.select(target);
        self.index_addrs.get(idx).copied()
    }

    pub fn get(&self, address: &Address) -> Option<&ValidatorRecord> {
        self.validators.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.validators.contains_key(address)
    }

    /// All records, address-sorted
    pub fn iter(&self) -> impl Iterator<Item = &ValidatorRecord> {
        self.validators.values()
    }

    /// Eligible validators at `epoch`, address-sorted
    pub fn eligible(&self, epoch: u64) -> impl Iterator<Item = &ValidatorRecord> + '_ {
        self.validators.values().filter(move |r| r.is_eligible(epoch))
    }

    pub fn total_registered(&self) -> usize {
        self.validators.len()
    }

    pub fn active_count(&self) -> usize {
        self.validators.values().filter(|r| r.active).count()
    }

    /// Clone of the full set for read-only consumers
    pub fn snapshot(&self) -> Vec<ValidatorRecord> {
        self.validators.values().cloned().collect()
    }

    fn enqueue_waiting(&mut self, address: Address) {
        self.waiting.push(address);
        let validators = &self.validators;
        // Heaviest first; ties broken by address so the order is canonical
        self.waiting.sort_by(|a, b| {
            let wa = validators.get(a).map(|r| r.effective_stake()).unwrap_or(0);
            let wb = validators.get(b).map(|r| r.effective_stake()).unwrap_or(0);
            wb.cmp(&wa).then(a.cmp(b))
        });
    }

    fn promote_waiting(&mut self) {
        while self.active_count() < self.max_active {
            let Some(next) = self.waiting.first().copied() else { break };
            self.waiting.remove(0);
            if let Some(record) = self.validators.get_mut(&next) {
                record.active = true;
                info!(address = %next, "validator promoted from waiting queue");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorium_core::constants::tokenomics::ONE_TOKEN;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        Address::new(bytes)
    }

    fn stake(tokens: u128) -> u128 {
        tokens * ONE_TOKEN
    }

    #[test]
    fn test_register_enforces_min_stake() {
        let mut set = ValidatorSet::new();
        let err = set.register(addr(1), stake(99), 0).unwrap_err();
        assert!(matches!(err, ConsensusError::InsufficientStake { .. }));
        assert!(set.register(addr(1), stake(100), 0).is_ok());
        assert!(matches!(
            set.register(addr(1), stake(100), 0),
            Err(ConsensusError::ValidatorExists(_))
        ));
    }

    #[test]
    fn test_cap_overflow_goes_to_waiting_queue() {
        let mut set = ValidatorSet::with_limits(2, stake(100), 10);
        set.register(addr(1), stake(100), 0).unwrap();
        set.register(addr(2), stake(100), 0).unwrap();
        set.register(addr(3), stake(500), 0).unwrap();

        assert_eq!(set.active_count(), 2);
        assert!(!set.get(&addr(3)).unwrap().active);

        // A slot opens; the heaviest waiter is promoted
        set.request_unbond(addr(1), 0).unwrap();
        assert!(set.get(&addr(3)).unwrap().active);
    }

    #[test]
    fn test_unbonding_lifecycle() {
        let mut set = ValidatorSet::with_limits(10, stake(100), 5);
        set.register(addr(1), stake(200), 0).unwrap();

        let release = set.request_unbond(addr(1), 2).unwrap();
        assert_eq!(release, 7);
        // still present (and slashable) before release
        assert!(set.contains(&addr(1)));
        assert!(set.release_unbonded(6).is_empty());

        let released = set.release_unbonded(7);
        assert_eq!(released, vec![(addr(1), stake(200))]);
        assert!(!set.contains(&addr(1)));
    }

    #[test]
    fn test_jail_bars_eligibility_until_epoch() {
        let mut set = ValidatorSet::new();
        set.register(addr(1), stake(100), 0).unwrap();
        set.jail(&addr(1), 10);

        assert!(!set.get(&addr(1)).unwrap().is_eligible(9));
        assert!(set.get(&addr(1)).unwrap().is_eligible(10));

        let unjailed = set.unjail_due(10);
        assert_eq!(unjailed, vec![addr(1)]);
        assert!(set.get(&addr(1)).unwrap().jailed_until_epoch.is_none());
    }

    #[test]
    fn test_selection_is_log_stake_weighted() {
        let mut set = ValidatorSet::new();
        // 100 vs 400 tokens: weights 1:2 after the sqrt curve
        set.register(addr(1), stake(100), 0).unwrap();
        set.register(addr(2), stake(400), 0).unwrap();
        set.rebuild_selection_index(0);

        let mut counts = [0u32; 2];
        for slot in 0..3000u64 {
            match set.select_leader(&[7u8; 32], slot) {
                Some(a) if a == addr(1) => counts[0] += 1,
                Some(a) if a == addr(2) => counts[1] += 1,
                _ => panic!("no leader selected"),
            }
        }
        // expected ratio 1:2, allow sampling slack
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!((1.6..=2.4).contains(&ratio), "ratio {} outside 1:2 band", ratio);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut a = ValidatorSet::new();
        let mut b = ValidatorSet::new();
        for set in [&mut a, &mut b] {
            set.register(addr(1), stake(150), 0).unwrap();
            set.register(addr(2), stake(300), 0).unwrap();
            set.register(addr(3), stake(1000), 0).unwrap();
            set.rebuild_selection_index(0);
        }
        for slot in 0..64 {
            assert_eq!(a.select_leader(&[1u8; 32], slot), b.select_leader(&[1u8; 32], slot));
        }
    }

    #[test]
    fn test_jailed_validator_not_selected() {
        let mut set = ValidatorSet::new();
        set.register(addr(1), stake(100), 0).unwrap();
        set.register(addr(2), stake(100), 0).unwrap();
        set.jail(&addr(2), 100);
        set.rebuild_selection_index(1);

        for slot in 0..50 {
            assert_eq!(set.select_leader(&[3u8; 32], slot), Some(addr(1)));
        }
    }

    #[test]
    fn test_trust_update_and_decay() {
        let mut set = ValidatorSet::new();
        set.register(addr(1), stake(100), 0).unwrap();

        // Perfect agreement nudges trust up over epochs
        for _ in 0..50 {
            set.update_trust_from_deviation(&addr(1), 0);
        }
        assert!(set.get(&addr(1)).unwrap().trust_bps > TRUST_INITIAL_BPS);

        // Saturated deviation pulls it down toward the floor
        for _ in 0..200 {
            set.update_trust_from_deviation(&addr(1), 10_000);
        }
        assert_eq!(set.get(&addr(1)).unwrap().trust_bps, TRUST_FLOOR_BPS);

        // Decay respects the floor too
        set.decay_trust(&addr(1));
        assert_eq!(set.get(&addr(1)).unwrap().trust_bps, TRUST_FLOOR_BPS);
    }

    #[test]
    fn test_offline_candidates() {
        let mut set = ValidatorSet::new();
        set.register(addr(1), stake(100), 0).unwrap();
        set.register(addr(2), stake(100), 0).unwrap();
        set.activity_tick(&addr(1), 20);

        let idle = set.offline_candidates(21, 16);
        assert_eq!(idle, vec![addr(2)]);
    }

    #[test]
    fn test_effective_stake_uses_trust() {
        let mut set = ValidatorSet::new();
        set.register(addr(1), stake(100), 0).unwrap();
        let base = set.get(&addr(1)).unwrap().effective_stake();

        for _ in 0..200 {
            set.update_trust_from_deviation(&addr(1), 10_000);
        }
        let degraded = set.get(&addr(1)).unwrap().effective_stake();
        assert_eq!(degraded, base / 10);
    }
}
