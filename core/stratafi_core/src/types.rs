//! # Types
//!
//! Shared data structures used across all modules of the Stratafi engine.
//!
//! ## Design decisions
//!
//! ### Snapshots, not handles
//!
//! Every record here is a plain value. The engine receives a snapshot of a
//! [`Campaign`], [`Contribution`] or [`TokenWallet`], and hands back computed
//! values (a new status, new balances, a [`TokenTransfer`] to record). The
//! persistence layer owns the records and applies results atomically.
//!
//! ### Status as a Finite-State Machine
//!
//! [`CampaignStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Pending ──► Fundraising ──► Completed ──► Trading
//!                  └────────► Failed
//! ```
//!
//! `Completed → Trading` is triggered externally; everything else is derived
//! by [`crate::fundraising`].
//!
//! ### Money
//!
//! All amounts are [`Amount`] (`rust_decimal::Decimal`) in whole stablecoin
//! or token units. Conversion to on-chain base units happens outside the engine.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Months, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Decimal quantity of stablecoin or campaign tokens.
pub type Amount = Decimal;

/// A UTC instant.
pub type Timestamp = DateTime<Utc>;

/// Lifecycle status of a campaign.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// Created; fundraising window has not opened yet.
    Pending,
    /// Accepting contributions.
    Fundraising,
    /// Finalized with at least the minimum raise; tokens distributed.
    Completed,
    /// Post-finalization trading is live.
    Trading,
    /// Finalized below the minimum raise; contributions refunded.
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fundraising => "fundraising",
            Self::Completed => "completed",
            Self::Trading => "trading",
            Self::Failed => "failed",
        }
    }

    /// `true` for statuses that never change again through the engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Trading | Self::Failed)
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fundraising)
                | (Self::Fundraising, Self::Completed)
                | (Self::Fundraising, Self::Failed)
                | (Self::Completed, Self::Trading)
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "fundraising" => Ok(Self::Fundraising),
            "completed" => Ok(Self::Completed),
            "trading" => Ok(Self::Trading),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Status shared by contributions and transfers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Completed,
    Failed,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettlementStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// One fundraising effort tied to a tokenized strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    /// Identity that created the campaign and may finalize it.
    pub creator: String,
    /// Wallet that holds raised stablecoin.
    pub treasury: String,
    pub target_raise: Amount,
    pub amount_raised: Amount,
    /// Offer price used to size contributions.
    pub price_per_token: Amount,
    pub initial_supply: Amount,
    pub fundraising_start: Timestamp,
    pub fundraising_end: Timestamp,
    pub status: CampaignStatus,
    /// Set at finalization.
    pub tradeable_tokens: Option<Amount>,
    /// Set at finalization.
    pub locked_tokens: Option<Amount>,
    /// Realized price (`amount_raised / initial_supply`), set at finalization.
    pub clearing_price: Option<Amount>,
}

/// An attempted stablecoin payment toward a [`Campaign`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: i64,
    pub campaign_id: i64,
    pub contributor: String,
    pub amount: Amount,
    pub token_amount: Amount,
    pub status: SettlementStatus,
    pub tx_ref: Option<String>,
    pub created_at: Timestamp,
}

/// How often a vesting schedule releases a tranche.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl ReleaseFrequency {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Self::Daily => 365,
            Self::Weekly => 52,
            Self::Monthly => 12,
        }
    }

    /// Advance `from` by one period. Months are calendar months; a day past
    /// the end of the target month clamps to its last day.
    pub fn step(&self, from: Timestamp) -> Option<Timestamp> {
        match self {
            Self::Daily => from.checked_add_signed(TimeDelta::days(1)),
            Self::Weekly => from.checked_add_signed(TimeDelta::days(7)),
            Self::Monthly => from.checked_add_months(Months::new(1)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl FromStr for ReleaseFrequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(CoreError::InvalidSchedule(format!(
                "unknown release frequency `{other}`"
            ))),
        }
    }
}

/// Vesting terms attached to a [`TokenWallet`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VestingSchedule {
    /// Nothing vests before this instant.
    pub cliff_date: Timestamp,
    /// Everything is vested at or after this instant.
    pub end_date: Timestamp,
    pub release_frequency: ReleaseFrequency,
    /// Percent of the locked balance released per year (8.33 ≈ 100 / 12).
    pub release_percentage: Decimal,
}

impl VestingSchedule {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cliff_date > self.end_date {
            return Err(CoreError::InvalidSchedule(
                "cliff date must not be after end date".to_string(),
            ));
        }
        if self.release_percentage.is_sign_negative() {
            return Err(CoreError::InvalidSchedule(
                "release percentage must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A holder's balance record for one campaign.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenWallet {
    pub campaign_id: i64,
    pub holder: String,
    /// Liquid, tradeable balance.
    pub balance: Amount,
    /// Balance subject to vesting.
    pub locked_balance: Amount,
    pub vesting_schedule: Option<VestingSchedule>,
    pub vesting_start: Option<Timestamp>,
    pub vesting_end: Option<Timestamp>,
    /// Earliest instant the next tranche may be released. Set by each release.
    #[serde(default)]
    pub next_release_at: Option<Timestamp>,
}

impl TokenWallet {
    /// A zero-balance wallet with no vesting terms.
    pub fn empty(campaign_id: i64, holder: impl Into<String>) -> Self {
        Self {
            campaign_id,
            holder: holder.into(),
            balance: Decimal::ZERO,
            locked_balance: Decimal::ZERO,
            vesting_schedule: None,
            vesting_start: None,
            vesting_end: None,
            next_release_at: None,
        }
    }
}

/// Kind of token movement recorded in the transfer ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// Liquid balance moved between two holders.
    Transfer,
    /// Scheduled vesting tranche moved from locked to liquid.
    Vest,
    /// Remaining locked balance unlocked after the schedule ended.
    Unlock,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Vest => "vest",
            Self::Unlock => "unlock",
        }
    }
}

impl FromStr for TransferType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(Self::Transfer),
            "vest" => Ok(Self::Vest),
            "unlock" => Ok(Self::Unlock),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// A token movement the caller must record alongside the balance change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub campaign_id: i64,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub transfer_type: TransferType,
    pub status: SettlementStatus,
}
