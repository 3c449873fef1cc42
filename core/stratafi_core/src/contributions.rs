//! Contribution lifecycle and refunds.
//!
//! A contribution is created `Pending` and settles exactly once, to
//! `Completed` or `Failed`. Only completed contributions count toward a
//! campaign's raise, its token allocation, and its refunds.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::fundraising::compute_fundraising_status;
use crate::policy::Policy;
use crate::types::{Amount, Campaign, CampaignStatus, Contribution, SettlementStatus, Timestamp};

/// A contribution accepted by the engine but not yet stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContributionDraft {
    pub campaign_id: i64,
    pub contributor: String,
    pub amount: Amount,
    /// `amount / price_per_token` at the campaign's offer price.
    pub token_amount: Amount,
    pub status: SettlementStatus,
    pub tx_ref: Option<String>,
}

/// Accept a contribution of `amount` toward `campaign` at `now`.
///
/// The campaign must be actively fundraising and the amount positive.
pub fn draft_contribution(
    campaign: &Campaign,
    contributor: &str,
    amount: Amount,
    tx_ref: Option<String>,
    now: Timestamp,
    policy: &Policy,
) -> Result<ContributionDraft> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(
            "contribution must be greater than 0".to_string(),
        ));
    }
    if contributor.trim().is_empty() {
        return Err(CoreError::InvalidAmount(
            "contributor identity is required".to_string(),
        ));
    }
    if campaign.price_per_token <= Decimal::ZERO {
        return Err(CoreError::InvalidCampaign(format!(
            "campaign {} has non-positive price per token",
            campaign.id
        )));
    }

    let status = compute_fundraising_status(campaign, now, policy)?;
    if !status.is_active {
        return Err(CoreError::NotAcceptingContributions);
    }

    let token_amount = amount
        .checked_div(campaign.price_per_token)
        .ok_or(CoreError::Overflow)?;

    Ok(ContributionDraft {
        campaign_id: campaign.id,
        contributor: contributor.to_string(),
        amount,
        token_amount,
        status: SettlementStatus::Pending,
        tx_ref,
    })
}

/// New `amount_raised` after crediting a completed contribution.
pub fn credit_raise(campaign: &Campaign, amount: Amount) -> Result<Amount> {
    if campaign.status != CampaignStatus::Fundraising {
        return Err(CoreError::NotAcceptingContributions);
    }
    campaign
        .amount_raised
        .checked_add(amount)
        .ok_or(CoreError::Overflow)
}

/// Settle a pending contribution. Settled contributions never change again.
pub fn settle(contribution: &Contribution, outcome: SettlementStatus) -> Result<Contribution> {
    if contribution.status != SettlementStatus::Pending {
        return Err(CoreError::ContributionSettled(contribution.status));
    }
    if outcome == SettlementStatus::Pending {
        return Err(CoreError::InvalidSettlement);
    }
    Ok(Contribution {
        status: outcome,
        ..contribution.clone()
    })
}

/// Stablecoin owed back to one contributor of a failed campaign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Refund {
    pub contributor: String,
    pub amount: Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefundPlan {
    /// Per-contributor totals of completed contributions, ordered by contributor.
    pub refunds: Vec<Refund>,
    /// Pending contributions to settle as `Failed`.
    pub voided: Vec<i64>,
}

impl RefundPlan {
    pub fn total(&self) -> Amount {
        self.refunds.iter().map(|r| r.amount).sum()
    }
}

pub fn plan_refunds(contributions: &[Contribution]) -> Result<RefundPlan> {
    let mut owed: BTreeMap<&str, Amount> = BTreeMap::new();
    let mut voided = Vec::new();

    for c in contributions {
        match c.status {
            SettlementStatus::Completed => {
                let entry = owed.entry(c.contributor.as_str()).or_insert(Decimal::ZERO);
                *entry = entry.checked_add(c.amount).ok_or(CoreError::Overflow)?;
            }
            SettlementStatus::Pending => voided.push(c.id),
            SettlementStatus::Failed => {}
        }
    }

    Ok(RefundPlan {
        refunds: owed
            .into_iter()
            .map(|(contributor, amount)| Refund {
                contributor: contributor.to_string(),
                amount,
            })
            .collect(),
        voided,
    })
}
