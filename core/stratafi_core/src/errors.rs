//! Engine-wide error types.

use thiserror::Error;

use crate::types::{CampaignStatus, SettlementStatus};

/// Why a proposed fundraising window was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("start date must be in the future")]
    StartInPast,

    #[error("fundraising period must be at least {min_days} days")]
    TooShort { min_days: i64 },

    #[error("fundraising period cannot exceed {max_days} days")]
    TooLong { max_days: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid fundraising period: {0}")]
    InvalidPeriod(#[from] PeriodError),

    #[error("No tokens available for release")]
    NothingToRelease,

    #[error("Invalid campaign: {0}")]
    InvalidCampaign(String),

    #[error("Invalid vesting schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    #[error("Fundraising cannot be finalized yet")]
    NotFinalizable,

    #[error("Campaign is not accepting contributions")]
    NotAcceptingContributions,

    #[error("Contribution is already {0}")]
    ContributionSettled(SettlementStatus),

    #[error("A contribution can only settle to completed or failed")]
    InvalidSettlement,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Arithmetic overflow")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, CoreError>;
