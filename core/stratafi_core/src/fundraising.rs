//! # Fundraising State Engine
//!
//! Derives a campaign's lifecycle position from its snapshot and the current
//! instant. Nothing here mutates the campaign; callers persist the returned
//! status in the same transaction that re-reads the snapshot.
//!
//! The decision point for finalization is [`next_status`]: once a campaign
//! can be finalized it resolves to `Completed` when the minimum raise was
//! reached and to `Failed` otherwise. [`finalize`] bundles that decision with
//! the distribution and vesting terms a successful campaign needs.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::distribution::{compute_distribution, compute_vesting_schedule, Distribution};
use crate::errors::{CoreError, PeriodError, Result};
use crate::policy::Policy;
use crate::types::{Amount, Campaign, CampaignStatus, Timestamp, VestingSchedule};

/// Point-in-time view of a campaign's fundraising window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FundraisingStatus {
    pub is_started: bool,
    pub is_ended: bool,
    pub is_active: bool,
    pub is_completed: bool,
    pub is_failed: bool,
    /// Milliseconds until the window closes; `None` outside the window.
    pub remaining_time_ms: Option<i64>,
    /// `amount_raised / target_raise`, unbounded above.
    pub progress: Decimal,
    pub minimum_reached: bool,
    pub can_finalize: bool,
}

/// Compute the fundraising status of `campaign` at `now`.
///
/// Fails with [`CoreError::InvalidCampaign`] when the target is not positive
/// or the raised amount is negative.
pub fn compute_fundraising_status(
    campaign: &Campaign,
    now: Timestamp,
    policy: &Policy,
) -> Result<FundraisingStatus> {
    let progress = raise_progress(campaign)?;

    let is_started = now >= campaign.fundraising_start;
    let is_ended = now >= campaign.fundraising_end;
    let is_fundraising = campaign.status == CampaignStatus::Fundraising;

    let remaining_time_ms = if is_started && !is_ended {
        Some((campaign.fundraising_end - now).num_milliseconds())
    } else {
        None
    };

    Ok(FundraisingStatus {
        is_started,
        is_ended,
        is_active: is_started && !is_ended && is_fundraising,
        is_completed: campaign.status == CampaignStatus::Completed,
        is_failed: campaign.status == CampaignStatus::Failed,
        remaining_time_ms,
        progress,
        minimum_reached: progress >= policy.minimum_raise_ratio,
        can_finalize: (is_ended || progress >= Decimal::ONE) && is_fundraising,
    })
}

fn raise_progress(campaign: &Campaign) -> Result<Amount> {
    if campaign.target_raise <= Decimal::ZERO {
        return Err(CoreError::InvalidCampaign(format!(
            "campaign {} has non-positive target raise ({})",
            campaign.id, campaign.target_raise
        )));
    }
    if campaign.amount_raised.is_sign_negative() {
        return Err(CoreError::InvalidCampaign(format!(
            "campaign {} has negative amount raised ({})",
            campaign.id, campaign.amount_raised
        )));
    }
    campaign
        .amount_raised
        .checked_div(campaign.target_raise)
        .ok_or(CoreError::Overflow)
}

/// The status `campaign` should hold at `now`.
///
/// `Completed` and `Failed` never change here; `Completed → Trading` is
/// handled by [`activate_trading`].
pub fn next_status(campaign: &Campaign, now: Timestamp, policy: &Policy) -> Result<CampaignStatus> {
    let status = compute_fundraising_status(campaign, now, policy)?;

    if status.is_completed {
        return Ok(CampaignStatus::Completed);
    }

    if status.can_finalize {
        return Ok(if status.minimum_reached {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Failed
        });
    }

    if status.is_active {
        return Ok(CampaignStatus::Fundraising);
    }

    Ok(campaign.status)
}

/// Like [`next_status`], but also opens the window of a `Pending` campaign
/// whose start has passed.
pub fn next_lifecycle_status(
    campaign: &Campaign,
    now: Timestamp,
    policy: &Policy,
) -> Result<CampaignStatus> {
    if campaign.status == CampaignStatus::Pending && now >= campaign.fundraising_start {
        return Ok(CampaignStatus::Fundraising);
    }
    next_status(campaign, now, policy)
}

/// Check a proposed fundraising window before a campaign may enter
/// `Fundraising`.
pub fn validate_fundraising_period(
    start: Timestamp,
    end: Timestamp,
    now: Timestamp,
    policy: &Policy,
) -> Result<()> {
    if start < now {
        return Err(PeriodError::StartInPast.into());
    }

    let duration = end - start;

    if duration < policy.min_period() {
        return Err(PeriodError::TooShort {
            min_days: policy.min_period_days,
        }
        .into());
    }

    if duration > policy.max_period() {
        return Err(PeriodError::TooLong {
            max_days: policy.max_period_days,
        }
        .into());
    }

    Ok(())
}

/// `Completed → Trading`. Any other starting status is rejected.
pub fn activate_trading(campaign: &Campaign) -> Result<CampaignStatus> {
    let to = CampaignStatus::Trading;
    if !campaign.status.can_transition_to(to) {
        return Err(CoreError::InvalidTransition {
            from: campaign.status,
            to,
        });
    }
    Ok(to)
}

/// Outcome of finalizing a campaign.
#[derive(Clone, Debug, PartialEq)]
pub enum Finalization {
    /// Minimum raise reached: distribute tokens under `schedule`.
    Completed {
        distribution: Distribution,
        schedule: VestingSchedule,
    },
    /// Minimum raise missed: contributions are refunded.
    Failed,
}

impl Finalization {
    pub fn status(&self) -> CampaignStatus {
        match self {
            Self::Completed { .. } => CampaignStatus::Completed,
            Self::Failed => CampaignStatus::Failed,
        }
    }
}

/// Decide how `campaign` finalizes at `now`.
///
/// Fails with [`CoreError::NotFinalizable`] while the window is open and the
/// target has not been met, or when the campaign is not fundraising.
pub fn finalize(campaign: &Campaign, now: Timestamp, policy: &Policy) -> Result<Finalization> {
    let status = compute_fundraising_status(campaign, now, policy)?;
    if !status.can_finalize {
        return Err(CoreError::NotFinalizable);
    }

    match next_status(campaign, now, policy)? {
        CampaignStatus::Completed => Ok(Finalization::Completed {
            distribution: compute_distribution(campaign, policy)?,
            schedule: compute_vesting_schedule(now, policy)?,
        }),
        _ => Ok(Finalization::Failed),
    }
}
