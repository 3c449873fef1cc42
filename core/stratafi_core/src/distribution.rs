//! # Distribution Calculator
//!
//! Splits a completed campaign's supply into a tradeable pool and a locked
//! pool, derives the realized clearing price, and shares both pools among
//! contributors pro rata. All rounding is floor.

use std::collections::BTreeMap;

use chrono::Months;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::policy::Policy;
use crate::types::{Amount, Campaign, Contribution, SettlementStatus, Timestamp, VestingSchedule};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub tradeable_tokens: Amount,
    pub locked_tokens: Amount,
    /// Realized price: `amount_raised / initial_supply`. Distinct from the
    /// campaign's offer `price_per_token`.
    pub token_price: Amount,
}

pub fn compute_distribution(campaign: &Campaign, policy: &Policy) -> Result<Distribution> {
    let supply = campaign.initial_supply;
    if supply <= Decimal::ZERO {
        return Err(CoreError::InvalidCampaign(format!(
            "campaign {} has non-positive initial supply ({supply})",
            campaign.id
        )));
    }

    let tradeable_tokens = supply
        .checked_mul(policy.tradeable_share)
        .ok_or(CoreError::Overflow)?
        .floor();
    let locked_tokens = supply
        .checked_mul(policy.locked_share)
        .ok_or(CoreError::Overflow)?
        .floor();
    let token_price = campaign
        .amount_raised
        .checked_div(supply)
        .ok_or(CoreError::Overflow)?;

    Ok(Distribution {
        tradeable_tokens,
        locked_tokens,
        token_price,
    })
}

/// Default vesting terms for the locked pool, anchored at `now`.
pub fn compute_vesting_schedule(now: Timestamp, policy: &Policy) -> Result<VestingSchedule> {
    let cliff_date = now
        .checked_add_months(Months::new(policy.cliff_months))
        .ok_or(CoreError::Overflow)?;
    let end_date = now
        .checked_add_months(Months::new(policy.vesting_months))
        .ok_or(CoreError::Overflow)?;

    let schedule = VestingSchedule {
        cliff_date,
        end_date,
        release_frequency: policy.release_frequency,
        release_percentage: policy.release_percentage,
    };
    schedule.validate()?;
    Ok(schedule)
}

/// One contributor's share of a completed campaign.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub holder: String,
    pub contributed: Amount,
    pub tradeable: Amount,
    pub locked: Amount,
}

/// Share both pools of `distribution` across the completed contributions.
///
/// Contributions from the same contributor are merged. Pending and failed
/// contributions are ignored. Output is ordered by holder.
pub fn allocate_tokens(
    distribution: &Distribution,
    contributions: &[Contribution],
) -> Result<Vec<Allocation>> {
    let mut totals: BTreeMap<&str, Amount> = BTreeMap::new();
    for c in contributions
        .iter()
        .filter(|c| c.status == SettlementStatus::Completed)
    {
        let entry = totals.entry(c.contributor.as_str()).or_insert(Decimal::ZERO);
        *entry = entry.checked_add(c.amount).ok_or(CoreError::Overflow)?;
    }

    let mut raised = Decimal::ZERO;
    for amount in totals.values() {
        raised = raised.checked_add(*amount).ok_or(CoreError::Overflow)?;
    }
    if raised <= Decimal::ZERO {
        return Ok(Vec::new());
    }

    totals
        .into_iter()
        .map(|(holder, contributed)| {
            Ok(Allocation {
                holder: holder.to_string(),
                contributed,
                tradeable: pro_rata(distribution.tradeable_tokens, contributed, raised)?,
                locked: pro_rata(distribution.locked_tokens, contributed, raised)?,
            })
        })
        .collect()
}

fn pro_rata(pool: Amount, part: Amount, whole: Amount) -> Result<Amount> {
    Ok(pool
        .checked_mul(part)
        .and_then(|v| v.checked_div(whole))
        .ok_or(CoreError::Overflow)?
        .floor())
}
