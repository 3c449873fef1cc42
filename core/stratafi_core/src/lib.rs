//! # Stratafi Core
//!
//! The fundraising, distribution and vesting engine behind Stratafi's
//! strategy tokens. A creator sets a fundraising target, investors contribute
//! stablecoin, and a successful campaign distributes tokens under a vesting
//! schedule.
//!
//! | Phase        | Entry Point(s)                                              |
//! |--------------|-------------------------------------------------------------|
//! | Creation     | [`validate_fundraising_period`]                             |
//! | Funding      | [`draft_contribution`], [`credit_raise`], [`settle`]        |
//! | Status       | [`compute_fundraising_status`], [`next_status`], [`next_lifecycle_status`] |
//! | Finalization | [`finalize`], [`compute_distribution`], [`compute_vesting_schedule`], [`allocate_tokens`], [`plan_refunds`] |
//! | Trading      | [`activate_trading`], [`transfer_tokens`]                   |
//! | Vesting      | [`calculate_vested_amount`], [`release_vested_tokens`], [`unlock_remaining`] |
//!
//! ## Architecture
//!
//! Every function is pure and synchronous: it takes a snapshot of the records
//! involved plus the current instant and returns a computed result. Nothing
//! here performs I/O or holds state. Callers must apply results in the same
//! transaction that re-reads and re-validates the snapshot.
//!
//! Tunable rules (minimum raise, supply split, vesting horizon, window bounds)
//! come from [`Policy`].

pub mod contributions;
pub mod distribution;
pub mod errors;
pub mod fundraising;
pub mod policy;
pub mod transfers;
pub mod types;
pub mod vesting;

#[cfg(test)]
mod test_fundraising;
#[cfg(test)]
mod test_vesting;

pub use contributions::{
    credit_raise, draft_contribution, plan_refunds, settle, ContributionDraft, Refund, RefundPlan,
};
pub use distribution::{
    allocate_tokens, compute_distribution, compute_vesting_schedule, Allocation, Distribution,
};
pub use errors::{CoreError, PeriodError, Result};
pub use fundraising::{
    activate_trading, compute_fundraising_status, finalize, next_lifecycle_status, next_status,
    validate_fundraising_period, Finalization, FundraisingStatus,
};
pub use policy::Policy;
pub use transfers::{transfer_tokens, TransferOutcome};
pub use types::{
    Amount, Campaign, CampaignStatus, Contribution, ReleaseFrequency, SettlementStatus, Timestamp,
    TokenTransfer, TokenWallet, TransferType, VestingSchedule,
};
pub use vesting::{
    calculate_vested_amount, next_release_date, release_amount_per_period, release_vested_tokens,
    unlock_remaining, NextRelease, VestingCalculation, VestingRelease,
};
