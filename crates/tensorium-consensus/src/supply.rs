// Supply ledger: the single source of truth for minted, burned and
// circulating amounts. Every mint and burn in the system writes through here.

use serde::{Deserialize, Serialize};
use tensorium_core::constants::tokenomics::{PREMINTED_SUPPLY, TOTAL_SUPPLY};
use tracing::debug;

/// Read-only view of the supply at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyState {
    pub total_cap: u128,
    pub preminted: u128,
    pub minted_from_pool: u128,
    pub burned: u128,
}

impl SupplyState {
    /// preminted + minted_from_pool − burned
    pub fn circulating(&self) -> u128 {
        self.preminted
            .checked_add(self.minted_from_pool)
            .and_then(|issued| issued.checked_sub(self.burned))
            .expect("supply invariant violated: burned exceeds issued")
    }

    /// total_cap − preminted − minted_from_pool
    pub fn remaining_pool(&self) -> u128 {
        self.total_cap
            .checked_sub(self.preminted)
            .and_then(|pool| pool.checked_sub(self.minted_from_pool))
            .expect("supply invariant violated: issuance exceeds cap")
    }
}

/// The supply ledger. `minted_from_pool` and `burned` are monotonic; the
/// cap is enforced by clamping, never by failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyLedger {
    state: SupplyState,
}

impl SupplyLedger {
    pub fn new(total_cap: u128, preminted: u128) -> Self {
        assert!(preminted <= total_cap, "premint exceeds total cap");
        Self {
            state: SupplyState { total_cap, preminted, minted_from_pool: 0, burned: 0 },
        }
    }

    /// Ledger at genesis: 21M cap with the 55% TGE premint outstanding
    pub fn genesis() -> Self {
        Self::new(TOTAL_SUPPLY, PREMINTED_SUPPLY)
    }

    /// Mint from the emission pool, clamped to what remains.
    ///
    /// Returns the amount actually credited, which may be less than
    /// requested (silent clamping — supply exhaustion is not an error).
    pub fn credit_mint(&mut self, amount: u128) -> u128 {
        let minted = amount.min(self.state.remaining_pool());
        self.state.minted_from_pool = self.state.minted_from_pool.saturating_add(minted);
        if minted < amount {
            debug!(requested = amount, minted, "emission pool exhausted, mint clamped");
        }
        self.verify_invariants();
        minted
    }

    /// Record a burn. Over-burning (more than is circulating) is a
    /// programming error upstream, not a runtime condition.
    pub fn record_burn(&mut self, amount: u128) {
        debug_assert!(
            amount <= self.state.circulating(),
            "burn of {} exceeds circulating {}",
            amount,
            self.state.circulating()
        );
        self.state.burned = self.state.burned.saturating_add(amount);
        self.verify_invariants();
    }

    /// Read-only snapshot
    pub fn snapshot(&self) -> SupplyState {
        self.state
    }

    // Invariants from the data model. A violation here means consensus state
    // is corrupt; the node must halt rather than advance.
    fn verify_invariants(&self) {
        let s = &self.state;
        assert!(
            s.preminted.saturating_add(s.minted_from_pool) <= s.total_cap,
            "supply invariant violated: issuance {} + {} exceeds cap {}",
            s.preminted,
            s.minted_from_pool,
            s.total_cap
        );
        // circulating() and remaining_pool() panic internally on underflow
        let _ = s.circulating();
        let _ = s.remaining_pool();
    }
}

impl Default for SupplyLedger {
    fn default() -> Self {
        Self::genesis()
    }
}
