// Scoring ledger: per-epoch per-miner task counters
// Feeds the miner reward weights and the utility score. All counters are
// monotonic within an epoch and reset together at the epoch boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensorium_core::types::Address;

/// Per-miner counters for one epoch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MinerEpochStats {
    pub tasks_completed: u64,
    pub gpu_tasks_completed: u64,
    pub cumulative_quality: u64,
}

impl MinerEpochStats {
    /// CPU-only task count
    pub fn cpu_tasks(&self) -> u64 {
        self.tasks_completed.saturating_sub(self.gpu_tasks_completed)
    }

    /// GPU share of completed work, in basis points
    pub fn gpu_fraction_bps(&self) -> u32 {
        if self.tasks_completed == 0 {
            return 0;
        }
        (self.gpu_tasks_completed as u128 * 10_000 / self.tasks_completed as u128) as u32
    }
}

/// Epoch-scoped task accounting across all miners.
///
/// Iteration is over a `BTreeMap`, so every read is in address-sorted order.
#[derive(Debug, Clone, Default)]
pub struct ScoringLedger {
    epoch: u64,
    miners: BTreeMap<Address, MinerEpochStats>,
    total_tasks: u64,
    difficulty_sum_bps: u128,
    difficulty_samples: u64,
}

impl ScoringLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed CPU task
    pub fn record_task(&mut self, miner: Address, quality: u64, difficulty_bps: u32) {
        let stats = self.miners.entry(miner).or_default();
        stats.tasks_completed += 1;
        stats.cumulative_quality = stats.cumulative_quality.saturating_add(quality);
        self.total_tasks += 1;
        self.difficulty_sum_bps += difficulty_bps.min(10_000) as u128;
        self.difficulty_samples += 1;
        self.check_invariants(&miner);
    }

    /// Record a completed GPU task. Bumps both counters, so
    /// `gpu_tasks_completed <= tasks_completed` holds by construction.
    pub fn record_gpu_task(&mut self, miner: Address, quality: u64, difficulty_bps: u32) {
        self.record_task(miner, quality, difficulty_bps);
        let stats = self.miners.entry(miner).or_default();
        stats.gpu_tasks_completed += 1;
        self.check_invariants(&miner);
    }

    /// Clear every counter for a new epoch. Atomic from the caller's view:
    /// there is no state in which some miners are reset and others are not.
    pub fn reset_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.miners.clear();
        self.total_tasks = 0;
        self.difficulty_sum_bps = 0;
        self.difficulty_samples = 0;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self, miner: &Address) -> MinerEpochStats {
        self.miners.get(miner).copied().unwrap_or_default()
    }

    /// All miners with activity this epoch, address-sorted
    pub fn miners(&self) -> impl Iterator<Item = (&Address, &MinerEpochStats)> {
        self.miners.iter()
    }

    pub fn tasks_this_epoch(&self) -> u64 {
        self.total_tasks
    }

    /// Mean task difficulty this epoch, in basis points
    pub fn avg_difficulty_bps(&self) -> u32 {
        if self.difficulty_samples == 0 {
            return 0;
        }
        (self.difficulty_sum_bps / self.difficulty_samples as u128) as u32
    }

    fn check_invariants(&self, miner: &Address) {
        if let Some(stats) = self.miners.get(miner) {
            assert!(
                stats.gpu_tasks_completed <= stats.tasks_completed,
                "scoring invariant violated for {}: gpu {} > tasks {}",
                miner,
                stats.gpu_tasks_completed,
                stats.tasks_completed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn miner(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        Address::new(bytes)
    }

    #[test]
    fn test_task_counters() {
        let mut ledger = ScoringLedger::new();
        ledger.record_task(miner(1), 80, 5_000);
        ledger.record_gpu_task(miner(1), 90, 8_000);

        let stats = ledger.stats(&miner(1));
        assert_eq!(stats.tasks_completed, 2);
        assert_eq!(stats.gpu_tasks_completed, 1);
        assert_eq!(stats.cpu_tasks(), 1);
        assert_eq!(stats.cumulative_quality, 170);
        assert_eq!(ledger.tasks_this_epoch(), 2);
    }

    #[test]
    fn test_gpu_fraction() {
        let mut ledger = ScoringLedger::new();
        ledger.record_task(miner(1), 0, 0);
        ledger.record_gpu_task(miner(1), 0, 0);
        ledger.record_gpu_task(miner(1), 0, 0);
        ledger.record_gpu_task(miner(1), 0, 0);

        // 3 GPU out of 4 total
        assert_eq!(ledger.stats(&miner(1)).gpu_fraction_bps(), 7_500);
        assert_eq!(ledger.stats(&miner(2)).gpu_fraction_bps(), 0);
    }

    #[test]
    fn test_avg_difficulty() {
        let mut ledger = ScoringLedger::new();
        ledger.record_task(miner(1), 0, 4_000);
        ledger.record_task(miner(2), 0, 8_000);
        assert_eq!(ledger.avg_difficulty_bps(), 6_000);

        // out-of-range difficulty is clamped at 10_000
        ledger.record_task(miner(3), 0, 60_000);
        assert_eq!(ledger.avg_difficulty_bps(), (4_000 + 8_000 + 10_000) / 3);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ledger = ScoringLedger::new();
        ledger.record_gpu_task(miner(1), 10, 1_000);
        ledger.record_task(miner(2), 10, 1_000);

        ledger.reset_epoch(5);

        assert_eq!(ledger.epoch(), 5);
        assert_eq!(ledger.tasks_this_epoch(), 0);
        assert_eq!(ledger.avg_difficulty_bps(), 0);
        assert_eq!(ledger.miners().count(), 0);
        assert_eq!(ledger.stats(&miner(1)).tasks_completed, 0);
    }

    #[test]
    fn test_iteration_is_address_sorted() {
        let mut ledger = ScoringLedger::new();
        ledger.record_task(miner(9), 0, 0);
        ledger.record_task(miner(1), 0, 0);
        ledger.record_task(miner(5), 0, 0);

        let order: Vec<Address> = ledger.miners().map(|(a, _)| *a).collect();
        assert_eq!(order, vec![miner(1), miner(5), miner(9)]);
    }
}
