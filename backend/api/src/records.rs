//! Row shapes as stored in / read from SQLite, and their conversion into
//! engine types.
//!
//! Decimal quantities are persisted as TEXT and instants as epoch
//! milliseconds, so every read goes through a fallible conversion.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stratafi_core::{
    Campaign, CampaignStatus, Contribution, SettlementStatus, Timestamp, TokenWallet,
    VestingSchedule,
};

use crate::errors::{ApiError, Result};

/// A record paired with the optimistic-concurrency version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub creator: String,
    pub treasury: String,
    pub target_raise: String,
    pub amount_raised: String,
    pub price_per_token: String,
    pub initial_supply: String,
    pub fundraising_start: i64,
    pub fundraising_end: i64,
    pub status: String,
    pub tradeable_tokens: Option<String>,
    pub locked_tokens: Option<String>,
    pub clearing_price: Option<String>,
    pub version: i64,
}

impl TryFrom<CampaignRow> for Versioned<Campaign> {
    type Error = ApiError;

    fn try_from(row: CampaignRow) -> Result<Self> {
        let campaign = Campaign {
            id: row.id,
            target_raise: decimal("target_raise", &row.target_raise)?,
            amount_raised: decimal("amount_raised", &row.amount_raised)?,
            price_per_token: decimal("price_per_token", &row.price_per_token)?,
            initial_supply: decimal("initial_supply", &row.initial_supply)?,
            fundraising_start: instant("fundraising_start", row.fundraising_start)?,
            fundraising_end: instant("fundraising_end", row.fundraising_end)?,
            status: CampaignStatus::from_str(&row.status)
                .map_err(|e| ApiError::Decode(e.to_string()))?,
            tradeable_tokens: optional_decimal("tradeable_tokens", row.tradeable_tokens)?,
            locked_tokens: optional_decimal("locked_tokens", row.locked_tokens)?,
            clearing_price: optional_decimal("clearing_price", row.clearing_price)?,
            name: row.name,
            symbol: row.symbol,
            description: row.description,
            creator: row.creator,
            treasury: row.treasury,
        };
        Ok(Versioned {
            record: campaign,
            version: row.version,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContributionRow {
    pub id: i64,
    pub campaign_id: i64,
    pub contributor: String,
    pub amount: String,
    pub token_amount: String,
    pub status: String,
    pub tx_ref: Option<String>,
    pub created_at: i64,
}

impl TryFrom<ContributionRow> for Contribution {
    type Error = ApiError;

    fn try_from(row: ContributionRow) -> Result<Self> {
        Ok(Contribution {
            id: row.id,
            campaign_id: row.campaign_id,
            amount: decimal("amount", &row.amount)?,
            token_amount: decimal("token_amount", &row.token_amount)?,
            status: SettlementStatus::from_str(&row.status)
                .map_err(|e| ApiError::Decode(e.to_string()))?,
            created_at: instant("created_at", row.created_at)?,
            contributor: row.contributor,
            tx_ref: row.tx_ref,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WalletRow {
    pub campaign_id: i64,
    pub holder: String,
    pub balance: String,
    pub locked_balance: String,
    /// JSON-encoded [`VestingSchedule`].
    pub vesting_schedule: Option<String>,
    pub vesting_start: Option<i64>,
    pub vesting_end: Option<i64>,
    pub next_release_at: Option<i64>,
    pub version: i64,
}

impl TryFrom<WalletRow> for Versioned<TokenWallet> {
    type Error = ApiError;

    fn try_from(row: WalletRow) -> Result<Self> {
        let vesting_schedule = row
            .vesting_schedule
            .as_deref()
            .map(serde_json::from_str::<VestingSchedule>)
            .transpose()?;
        let wallet = TokenWallet {
            campaign_id: row.campaign_id,
            balance: decimal("balance", &row.balance)?,
            locked_balance: decimal("locked_balance", &row.locked_balance)?,
            vesting_schedule,
            vesting_start: row
                .vesting_start
                .map(|ms| instant("vesting_start", ms))
                .transpose()?,
            vesting_end: row
                .vesting_end
                .map(|ms| instant("vesting_end", ms))
                .transpose()?,
            next_release_at: row
                .next_release_at
                .map(|ms| instant("next_release_at", ms))
                .transpose()?,
            holder: row.holder,
        };
        Ok(Versioned {
            record: wallet,
            version: row.version,
        })
    }
}

/// A transfer ledger entry as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRecord {
    pub id: i64,
    pub campaign_id: i64,
    pub from_holder: String,
    pub to_holder: String,
    pub amount: String,
    pub transfer_type: String,
    pub status: String,
    pub tx_ref: Option<String>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

// ─────────────────────────────────────────────────────────
// Field conversions
// ─────────────────────────────────────────────────────────

pub fn decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| ApiError::Decode(format!("{field} `{raw}`: {e}")))
}

fn optional_decimal(field: &str, raw: Option<String>) -> Result<Option<Decimal>> {
    raw.map(|v| decimal(field, &v)).transpose()
}

pub fn instant(field: &str, millis: i64) -> Result<Timestamp> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ApiError::Decode(format!("{field} out of range: {millis}")))
}

pub fn millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}
