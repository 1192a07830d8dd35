// Tensorium consensus and tokenomics core
//
// The crate couples three subsystems around a shared supply ledger and
// validator set: the adaptive emission schedule, the commit-reveal weight
// consensus, and the epoch reward distribution. The epoch orchestrator in
// `epoch` is the single mutation point; every other module exposes pure or
// locally-owned state.

pub mod burn;
pub mod delegation;
pub mod emission;
pub mod epoch;
pub mod error;
pub mod halving;
pub mod rewards;
pub mod scoring;
pub mod slashing;
pub mod stake;
pub mod supply;
pub mod validator_set;
pub mod weights;

pub use burn::{BurnManager, BurnReason};
pub use delegation::{Delegation, DelegationSet, LockPeriod};
pub use emission::{EmissionController, EpochEmission, UtilityInputs};
pub use epoch::{BlockEvent, CoreTransaction, EngineConfig, EpochEngine, EpochOutcome};
pub use error::{ConsensusError, Result};
pub use halving::HalvingSchedule;
pub use rewards::{RewardCategory, RewardDistributor, RewardIntent};
pub use scoring::ScoringLedger;
pub use slashing::{Offense, Slasher};
pub use stake::{log_stake, NodeTier};
pub use supply::{SupplyLedger, SupplyState};
pub use validator_set::{ValidatorRecord, ValidatorSet};
pub use weights::{commit_digest, generate_salt, EpochPhase, WeightConsensus};
