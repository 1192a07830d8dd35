use tensorium_core::types::Address;
use thiserror::Error;

use crate::weights::EpochPhase;

/// Recoverable consensus rejections.
///
/// Every variant here is recovered at the component boundary: the offending
/// submission is dropped and the block remains valid. Invariant violations
/// are not represented as errors — they panic and halt the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("submission outside the {phase:?} window at block {height}")]
    WindowExpired { phase: EpochPhase, height: u64 },

    #[error("validator {0} already committed this epoch")]
    DuplicateCommit(Address),

    #[error("validator {0} already revealed this epoch")]
    DuplicateReveal(Address),

    #[error("reveal from {0} does not match its commit hash")]
    CommitMismatch(Address),

    #[error("no commit found for validator {0} this epoch")]
    NoCommit(Address),

    #[error("unknown validator {0}")]
    UnknownValidator(Address),

    #[error("validator {0} already registered")]
    ValidatorExists(Address),

    #[error("insufficient stake: provided {provided}, required {required}")]
    InsufficientStake { provided: u128, required: u128 },

    #[error("epoch is in phase {actual:?}, expected {expected:?}")]
    NotInPhase { expected: EpochPhase, actual: EpochPhase },

    #[error("submission targets epoch {submitted}, current epoch is {current}")]
    WrongEpoch { submitted: u64, current: u64 },

    #[error("no delegation from {delegator} to {validator}")]
    DelegationNotFound { delegator: Address, validator: Address },

    #[error("delegation is locked until epoch {0}")]
    LockActive(u64),

    #[error("validator {0} is unbonding")]
    Unbonding(Address),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
