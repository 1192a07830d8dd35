// Commit-reveal weight consensus
// Two-phase, stake-weighted aggregation of validator score vectors.
//
// Flow per epoch:
// 1. Commit window: validators submit keccak256(encode(vector) || salt)
// 2. Reveal window: validators disclose (vector, salt), checked against the
//    commit hash
// 3. Aggregation: per miner, outliers beyond 2.5 sigma are replaced by the
//    survivors' median, then the canonical score is the weighted median
//
// Windows are measured in blocks. All iteration is over address-sorted maps
// and all arithmetic is integer, so aggregation is bit-identical across
// nodes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tensorium_core::constants::consensus::{COMMIT_BLOCKS, REVEAL_BLOCKS};
use tensorium_core::constants::weights::OUTLIER_SIGMA_BPS;
use tensorium_core::types::{Address, Hash};
use tensorium_crypto::keccak256_concat;
use tracing::{debug, info, warn};

use crate::emission::{QUALITY_MAX_BPS, QUALITY_MIN_BPS, QUALITY_NEUTRAL_BPS};
use crate::error::{ConsensusError, Result};

/// Phases of one commit-reveal round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochPhase {
    Idle,
    Committing,
    Revealing,
    Aggregating,
    Finalized,
}

/// Weight consensus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightConsensusConfig {
    pub commit_blocks: u64,
    pub reveal_blocks: u64,
    /// Outlier threshold in basis points of sigma (25_000 = 2.5 sigma)
    pub outlier_sigma_bps: u128,
    /// Slope of the quality multiplier: bps of quality lost per full-scale
    /// mean deviation. Governance-tunable; fixes only the shape.
    pub quality_slope_bps: u32,
}

impl Default for WeightConsensusConfig {
    fn default() -> Self {
        Self {
            commit_blocks: COMMIT_BLOCKS,
            reveal_blocks: REVEAL_BLOCKS,
            outlier_sigma_bps: OUTLIER_SIGMA_BPS,
            quality_slope_bps: 8_000,
        }
    }
}

/// A validator's sealed commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightCommit {
    pub validator: Address,
    pub commit_hash: Hash,
    pub submitted_at_block: u64,
}

/// A disclosed weight vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightReveal {
    pub validator: Address,
    pub scores: BTreeMap<Address, u16>,
    pub salt: [u8; 32],
}

/// Result of aggregating one epoch's reveals
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub epoch: u64,
    /// Canonical consensus score per miner, basis points
    pub canonical: BTreeMap<Address, u16>,
    /// Quality multiplier fed to the emission controller
    pub quality_bps: u32,
    /// Mean absolute deviation per revealing validator (drives trust)
    pub validator_deviation_bps: BTreeMap<Address, u32>,
    /// Validators that committed but never revealed
    pub non_revealers: Vec<Address>,
    pub revealed_count: usize,
}

/// Canonical encoding of a weight vector: entries sorted by miner address,
/// each as `address || score_bps` big-endian.
pub fn encode_weight_vector(scores: &BTreeMap<Address, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(scores.len() * 22);
    for (miner, score) in scores {
        out.extend_from_slice(miner.as_bytes());
        out.extend_from_slice(&score.to_be_bytes());
    }
    out
}

/// Commit digest: `keccak256(encode(vector) || salt)`
pub fn commit_digest(scores: &BTreeMap<Address, u16>, salt: &[u8; 32]) -> Hash {
    keccak256_concat(&encode_weight_vector(scores), salt)
}

/// Fresh 32-byte salt for a commitment. Client-side helper; consensus only
/// ever checks the digest.
pub fn generate_salt() -> [u8; 32] {
    use rand::Rng;
    let mut salt = [0u8; 32];
    rand::thread_rng().fill(&mut salt);
    salt
}

/// State of the current epoch's round
#[derive(Debug, Clone)]
pub struct EpochWeights {
    pub epoch: u64,
    pub phase: EpochPhase,
    pub commit_start: u64,
    commits: BTreeMap<Address, WeightCommit>,
    reveals: BTreeMap<Address, WeightReveal>,
}

/// Manager for the commit-reveal rounds
#[derive(Debug, Clone, Default)]
pub struct WeightConsensus {
    config: WeightConsensusConfig,
    current: Option<EpochWeights>,
}

impl WeightConsensus {
    pub fn new(config: WeightConsensusConfig) -> Self {
        Self { config, current: None }
    }

    /// Begin a round at the epoch's first block
    pub fn open_epoch(&mut self, epoch: u64, start_block: u64) {
        self.current = Some(EpochWeights {
            epoch,
            phase: EpochPhase::Committing,
            commit_start: start_block,
            commits: BTreeMap::new(),
            reveals: BTreeMap::new(),
        });
        info!(epoch, start_block, "commit window open");
    }

    /// The phase a given block height falls into
    pub fn phase_at(&self, height: u64) -> EpochPhase {
        let Some(state) = &self.current else { return EpochPhase::Idle };
        let reveal_start = state.commit_start + self.config.commit_blocks;
        let reveal_end = reveal_start + self.config.reveal_blocks;
        if state.phase == EpochPhase::Finalized {
            EpochPhase::Finalized
        } else if height < state.commit_start {
            EpochPhase::Idle
        } else if height < reveal_start {
            EpochPhase::Committing
        } else if height < reveal_end {
            EpochPhase::Revealing
        } else {
            EpochPhase::Aggregating
        }
    }

    /// Advance the stored phase to match a block height
    pub fn advance(&mut self, height: u64) {
        let phase = self.phase_at(height);
        if let Some(state) = &mut self.current {
            if state.phase != EpochPhase::Finalized {
                state.phase = phase;
            }
        }
    }

    /// Accept a commitment during the commit window. One per validator.
    pub fn submit_commit(
        &mut self,
        validator: Address,
        commit_hash: Hash,
        height: u64,
    ) -> Result<()> {
        let phase = self.phase_at(height);
        if phase != EpochPhase::Committing {
            return Err(ConsensusError::WindowExpired { phase: EpochPhase::Committing, height });
        }
        let state = self.current.as_mut().expect("phase implies open epoch");
        if state.commits.contains_key(&validator) {
            return Err(ConsensusError::DuplicateCommit(validator));
        }
        state
            .commits
            .insert(validator, WeightCommit { validator, commit_hash, submitted_at_block: height });
        debug!(%validator, hash = %hex::encode(&commit_hash[..8]), height, "commit accepted");
        Ok(())
    }

    /// Accept a reveal during the reveal window, checked against the commit
    pub fn submit_reveal(
        &mut self,
        validator: Address,
        scores: BTreeMap<Address, u16>,
        salt: [u8; 32],
        height: u64,
    ) -> Result<()> {
        let phase = self.phase_at(height);
        if phase != EpochPhase::Revealing {
            return Err(ConsensusError::WindowExpired { phase: EpochPhase::Revealing, height });
        }
        let state = self.current.as_mut().expect("phase implies open epoch");
        let commit = state
            .commits
            .get(&validator)
            .ok_or(ConsensusError::NoCommit(validator))?;
        if state.reveals.contains_key(&validator) {
            return Err(ConsensusError::DuplicateReveal(validator));
        }
        if commit_digest(&scores, &salt) != commit.commit_hash {
            warn!(%validator, "reveal does not match commitment");
            return Err(ConsensusError::CommitMismatch(validator));
        }
        state.reveals.insert(validator, WeightReveal { validator, scores, salt });
        debug!(%validator, height, "reveal accepted");
        Ok(())
    }

    pub fn has_committed(&self, validator: &Address) -> bool {
        self.current.as_ref().map_or(false, |s| s.commits.contains_key(validator))
    }

    pub fn has_revealed(&self, validator: &Address) -> bool {
        self.current.as_ref().map_or(false, |s| s.reveals.contains_key(validator))
    }

    pub fn commit_count(&self) -> usize {
        self.current.as_ref().map_or(0, |s| s.commits.len())
    }

    /// Aggregate the epoch's accepted reveals into canonical scores.
    ///
    /// `validator_weights` maps each revealing validator to its effective
    /// stake (log_stake x trust). Commits without reveals are reported as
    /// non-revealers and discarded.
    pub fn aggregate(
        &mut self,
        validator_weights: &BTreeMap<Address, u128>,
    ) -> AggregationOutcome {
        let mut state = self.current.take().expect("aggregate without open epoch");
        state.phase = EpochPhase::Finalized;

        let non_revealers: Vec<Address> = state
            .commits
            .keys()
            .filter(|v| !state.reveals.contains_key(*v))
            .copied()
            .collect();

        let all_miners: BTreeSet<Address> = state
            .reveals
            .values()
            .flat_map(|r| r.scores.keys().copied())
            .collect();

        let mut canonical = BTreeMap::new();
        // (sum of |score - canonical|, miner count) per validator
        let mut deviation_acc: BTreeMap<Address, (u64, u64)> = BTreeMap::new();
        let mut outlier_validators: BTreeSet<Address> = BTreeSet::new();

        for miner in &all_miners {
            let entries: Vec<(u128, u128, Address)> = state
                .reveals
                .values()
                .filter_map(|reveal| {
                    reveal.scores.get(miner).map(|score| {
                        let weight =
                            validator_weights.get(&reveal.validator).copied().unwrap_or(0).max(1);
                        (*score as u128, weight, reveal.validator)
                    })
                })
                .collect();
            if entries.is_empty() {
                continue;
            }

            let (score, outliers) = aggregate_miner(&entries, self.config.outlier_sigma_bps);
            canonical.insert(*miner, score);
            outlier_validators.extend(outliers);

            for (orig_score, _, validator) in &entries {
                let d = orig_score.abs_diff(score as u128) as u64;
                let acc = deviation_acc.entry(*validator).or_insert((0, 0));
                acc.0 += d;
                acc.1 += 1;
            }
        }

        let validator_deviation_bps: BTreeMap<Address, u32> = deviation_acc
            .iter()
            .map(|(v, (sum, count))| (*v, (*sum / (*count).max(1)) as u32))
            .collect();

        let quality_bps = self.quality_from_deviations(&validator_deviation_bps, &outlier_validators);

        info!(
            epoch = state.epoch,
            miners = canonical.len(),
            revealed = state.reveals.len(),
            missing = non_revealers.len(),
            quality_bps,
            "epoch weights aggregated"
        );

        let outcome = AggregationOutcome {
            epoch: state.epoch,
            canonical,
            quality_bps,
            validator_deviation_bps,
            non_revealers,
            revealed_count: state.reveals.len(),
        };
        self.current = Some(state);
        outcome
    }

    // Quality multiplier from the mean deviation of non-outlier validators:
    // full agreement maps to the 1.4 ceiling, saturated disagreement to the
    // 0.6 floor, and an epoch with no reveals at all stays neutral.
    fn quality_from_deviations(
        &self,
        deviations: &BTreeMap<Address, u32>,
        outliers: &BTreeSet<Address>,
    ) -> u32 {
        let clean: Vec<u64> = deviations
            .iter()
            .filter(|(v, _)| !outliers.contains(*v))
            .map(|(_, d)| *d as u64)
            .collect();
        let considered: Vec<u64> = if clean.is_empty() {
            deviations.values().map(|d| *d as u64).collect()
        } else {
            clean
        };
        if considered.is_empty() {
            return QUALITY_NEUTRAL_BPS;
        }
        let mean_dev = considered.iter().sum::<u64>() / considered.len() as u64;
        let penalty = self.config.quality_slope_bps as u64 * mean_dev.min(10_000) / 10_000;
        (QUALITY_MAX_BPS as u64).saturating_sub(penalty).clamp(
            QUALITY_MIN_BPS as u64,
            QUALITY_MAX_BPS as u64,
        ) as u32
    }

    pub fn config(&self) -> &WeightConsensusConfig {
        &self.config
    }

    pub fn current_epoch(&self) -> Option<u64> {
        self.current.as_ref().map(|s| s.epoch)
    }
}

/// Aggregate one miner's entries `(score, weight, validator)`.
///
/// Returns the canonical score and the validators whose entries were
/// removed as outliers.
fn aggregate_miner(
    entries: &[(u128, u128, Address)],
    outlier_sigma_bps: u128,
) -> (u16, Vec<Address>) {
    let total_w: u128 = entries.iter().map(|(_, w, _)| w).sum();
    let mean = entries.iter().map(|(s, w, _)| s * w).sum::<u128>() / total_w;
    let variance = entries
        .iter()
        .map(|(s, w, _)| w * s.abs_diff(mean) * s.abs_diff(mean))
        .sum::<u128>()
        / total_w;

    // |score - mean| > 2.5 sigma, compared in squares to stay in integers
    let is_outlier = |score: u128| {
        let d = score.abs_diff(mean);
        d * d * 10_000 * 10_000 > outlier_sigma_bps * outlier_sigma_bps * variance
    };

    let mut survivors: Vec<(u128, u128)> = Vec::with_capacity(entries.len());
    let mut removed: Vec<(u128, Address)> = Vec::new();
    if variance == 0 {
        survivors.extend(entries.iter().map(|(s, w, _)| (*s, *w)));
    } else {
        for (s, w, v) in entries {
            if is_outlier(*s) {
                removed.push((*w, *v));
            } else {
                survivors.push((*s, *w));
            }
        }
        if survivors.is_empty() {
            // Degenerate spread: removal would erase the whole set
            survivors.extend(entries.iter().map(|(s, w, _)| (*s, *w)));
            removed.clear();
        }
    }

    // Removed entries are replaced by the survivors' median (midpoint form),
    // keeping the weight budget constant.
    let replacement = weighted_median_midpoint(&survivors);
    let mut cleaned = survivors;
    for (w, _) in &removed {
        cleaned.push((replacement, *w));
    }

    let canonical = weighted_median_lower(&cleaned);
    (canonical as u16, removed.into_iter().map(|(_, v)| v).collect())
}

// Smallest x with cumulative weight >= half the total; ties resolve to the
// smaller score.
fn weighted_median_lower(entries: &[(u128, u128)]) -> u128 {
    let mut sorted: Vec<(u128, u128)> = entries.to_vec();
    sorted.sort_by_key(|(s, _)| *s);
    let total: u128 = sorted.iter().map(|(_, w)| w).sum();

    let mut cum = 0u128;
    let mut i = 0;
    while i < sorted.len() {
        let score = sorted[i].0;
        // fold equal scores together before testing the threshold
        while i < sorted.len() && sorted[i].0 == score {
            cum += sorted[i].1;
            i += 1;
        }
        if 2 * cum >= total {
            return score;
        }
    }
    sorted.last().map(|(s, _)| *s).unwrap_or(0)
}

// Median used for outlier replacement: when the lower median's cumulative
// weight lands exactly on half, average it with the next distinct score.
fn weighted_median_midpoint(entries: &[(u128, u128)]) -> u128 {
    let mut sorted: Vec<(u128, u128)> = entries.to_vec();
    sorted.sort_by_key(|(s, _)| *s);
    let total: u128 = sorted.iter().map(|(_, w)| w).sum();

    let mut cum = 0u128;
    let mut i = 0;
    while i < sorted.len() {
        let score = sorted[i].0;
        while i < sorted.len() && sorted[i].0 == score {
            cum += sorted[i].1;
            i += 1;
        }
        if 2 * cum > total {
            return score;
        }
        if 2 * cum == total {
            let next = sorted.get(i).map(|(s, _)| *s).unwrap_or(score);
            return (score + next) / 2;
        }
    }
    sorted.last().map(|(s, _)| *s).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        Address::new(bytes)
    }

    fn vector(entries: &[(u8, u16)]) -> BTreeMap<Address, u16> {
        entries.iter().map(|(m, s)| (addr(*m), *s)).collect()
    }

    fn weights(entries: &[(u8, u128)]) -> BTreeMap<Address, u128> {
        entries.iter().map(|(v, w)| (addr(*v), *w)).collect()
    }

    #[test]
    fn test_encoding_is_canonical() {
        // BTreeMap construction order does not affect the encoding
        let a = vector(&[(1, 100), (2, 200)]);
        let b = vector(&[(2, 200), (1, 100)]);
        assert_eq!(encode_weight_vector(&a), encode_weight_vector(&b));

        let salt = [42u8; 32];
        assert_eq!(commit_digest(&a, &salt), commit_digest(&b, &salt));
        assert_ne!(commit_digest(&a, &salt), commit_digest(&a, &[43u8; 32]));
    }

    #[test]
    fn test_commit_reveal_flow() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(1, 32);

        let scores = vector(&[(10, 8000)]);
        let salt = [9u8; 32];
        let digest = commit_digest(&scores, &salt);

        wc.submit_commit(addr(1), digest, 35).unwrap();

        // second commit rejected
        assert_eq!(
            wc.submit_commit(addr(1), digest, 36),
            Err(ConsensusError::DuplicateCommit(addr(1)))
        );

        // reveal during commit window rejected
        assert!(matches!(
            wc.submit_reveal(addr(1), scores.clone(), salt, 40),
            Err(ConsensusError::WindowExpired { .. })
        ));

        // reveal in window accepted
        wc.submit_reveal(addr(1), scores.clone(), salt, 48).unwrap();
        assert_eq!(
            wc.submit_reveal(addr(1), scores, salt, 49),
            Err(ConsensusError::DuplicateReveal(addr(1)))
        );
    }

    #[test]
    fn test_commit_outside_window_rejected() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(1, 32);

        let digest = [1u8; 32];
        // before the epoch start and after the commit window
        assert!(wc.submit_commit(addr(1), digest, 31).is_err());
        assert!(wc.submit_commit(addr(1), digest, 48).is_err());
    }

    #[test]
    fn test_reveal_without_commit_rejected() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(1, 32);

        let scores = vector(&[(10, 8000)]);
        assert_eq!(
            wc.submit_reveal(addr(1), scores, [0u8; 32], 48),
            Err(ConsensusError::NoCommit(addr(1)))
        );
    }

    #[test]
    fn test_tampered_reveal_rejected() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(1, 32);

        let committed = vector(&[(10, 8000)]);
        let salt = [9u8; 32];
        wc.submit_commit(addr(1), commit_digest(&committed, &salt), 35).unwrap();

        let tampered = vector(&[(10, 9999)]);
        assert_eq!(
            wc.submit_reveal(addr(1), tampered, salt, 48),
            Err(ConsensusError::CommitMismatch(addr(1)))
        );
    }

    #[test]
    fn test_agreeing_validators_median() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(0, 0);

        let scores = vector(&[(10, 8000)]);
        for v in [1u8, 2] {
            let salt = [v; 32];
            wc.submit_commit(addr(v), commit_digest(&scores, &salt), 2).unwrap();
        }
        for v in [1u8, 2] {
            wc.submit_reveal(addr(v), scores.clone(), [v; 32], 20).unwrap();
        }

        // weights 1:2 (stakes 100 vs 400 after the sqrt curve)
        let outcome = wc.aggregate(&weights(&[(1, 10), (2, 20)]));

        assert_eq!(outcome.canonical.get(&addr(10)), Some(&8000));
        assert_eq!(outcome.quality_bps, QUALITY_MAX_BPS);
        assert!(outcome.non_revealers.is_empty());
    }

    #[test]
    fn test_outlier_is_replaced_not_dropped() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(0, 0);

        let reveals = [(1u8, 8000u16, 100u128), (2, 8200, 100), (3, 100, 1)];
        for (v, score, _) in &reveals {
            let scores = vector(&[(10, *score)]);
            let salt = [*v; 32];
            wc.submit_commit(addr(*v), commit_digest(&scores, &salt), 2).unwrap();
        }
        for (v, score, _) in &reveals {
            wc.submit_reveal(addr(*v), vector(&[(10, *score)]), [*v; 32], 20).unwrap();
        }

        let w = weights(&[(1, 100), (2, 100), (3, 1)]);
        let outcome = wc.aggregate(&w);

        // C's 100 is far outside 2.5 sigma of the weighted distribution;
        // it is replaced by the survivors' median 8100, which then carries
        // the canonical weighted median to 8100.
        assert_eq!(outcome.canonical.get(&addr(10)), Some(&8100));
        // the outlier still earns a large personal deviation
        assert!(outcome.validator_deviation_bps[&addr(3)] > 7_000);
        assert!(outcome.validator_deviation_bps[&addr(1)] <= 100);
    }

    #[test]
    fn test_non_revealers_reported() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(0, 0);

        let scores = vector(&[(10, 5000)]);
        let salt = [1u8; 32];
        wc.submit_commit(addr(1), commit_digest(&scores, &salt), 2).unwrap();
        wc.submit_commit(addr(2), [7u8; 32], 3).unwrap();

        wc.submit_reveal(addr(1), scores, salt, 20).unwrap();

        let outcome = wc.aggregate(&weights(&[(1, 10)]));
        assert_eq!(outcome.non_revealers, vec![addr(2)]);
        // the discarded commit contributes nothing to the canonical scores
        assert_eq!(outcome.canonical.len(), 1);
    }

    #[test]
    fn test_no_reveals_neutral_quality() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(0, 0);

        let outcome = wc.aggregate(&BTreeMap::new());
        assert!(outcome.canonical.is_empty());
        assert_eq!(outcome.quality_bps, QUALITY_NEUTRAL_BPS);
    }

    #[test]
    fn test_disagreement_lowers_quality() {
        let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
        wc.open_epoch(0, 0);

        let reveals = [(1u8, 2000u16), (2, 8000)];
        for (v, score) in &reveals {
            let scores = vector(&[(10, *score)]);
            wc.submit_commit(addr(*v), commit_digest(&scores, &[*v; 32]), 2).unwrap();
        }
        for (v, score) in &reveals {
            wc.submit_reveal(addr(*v), vector(&[(10, *score)]), [*v; 32], 20).unwrap();
        }

        let outcome = wc.aggregate(&weights(&[(1, 10), (2, 10)]));
        assert!(outcome.quality_bps < QUALITY_MAX_BPS);
        assert!(outcome.quality_bps >= QUALITY_MIN_BPS);
    }

    #[test]
    fn test_aggregation_determinism() {
        let run = || {
            let mut wc = WeightConsensus::new(WeightConsensusConfig::default());
            wc.open_epoch(0, 0);
            for v in 1u8..=5 {
                let scores = vector(&[(10, 7000 + v as u16 * 100), (11, 4000)]);
                wc.submit_commit(addr(v), commit_digest(&scores, &[v; 32]), 2).unwrap();
                wc.submit_reveal(addr(v), scores, [v; 32], 20).unwrap();
            }
            wc.aggregate(&weights(&[(1, 7), (2, 13), (3, 5), (4, 40), (5, 2)]))
        };
        let a = run();
        let b = run();
        assert_eq!(a.canonical, b.canonical);
        assert_eq!(a.quality_bps, b.quality_bps);
    }

    #[test]
    fn test_weighted_median_definitions() {
        // lower median breaks the exact-half tie downward
        assert_eq!(weighted_median_lower(&[(8000, 1), (8200, 1)]), 8000);
        // midpoint form averages the straddle
        assert_eq!(weighted_median_midpoint(&[(8000, 1), (8200, 1)]), 8100);
        // a dominant weight owns the median in both forms
        assert_eq!(weighted_median_lower(&[(100, 10), (9000, 1)]), 100);
        assert_eq!(weighted_median_midpoint(&[(100, 10), (9000, 1)]), 100);
    }
}
