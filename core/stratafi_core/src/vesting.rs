//! # Vesting Schedule Engine
//!
//! Computes how much of a wallet's locked balance has vested at a given
//! instant, and which tranche is released next.
//!
//! Two computations coexist and are not reconciled:
//!
//! - `total_vested` interpolates linearly over `vesting_start..vesting_end`.
//! - The next-release preview ([`release_amount_per_period`]) takes a fixed
//!   fraction of the locked balance per period, assuming a one-year horizon.
//!
//! A release moves exactly the preview amount, so repeated releases track the
//! per-period rule rather than the linear total. Each release stamps the
//! wallet's `next_release_at` with the date the preview pointed at, and no
//! further tranche moves before then.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::types::{
    Amount, SettlementStatus, Timestamp, TokenTransfer, TokenWallet, TransferType, VestingSchedule,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NextRelease {
    pub amount: Amount,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VestingCalculation {
    pub total_vested: Amount,
    pub next_release: Option<NextRelease>,
    pub remaining_locked: Amount,
}

/// Vesting position of `wallet` at `now`.
///
/// Rules, in priority order:
/// 1. No schedule, start or end: nothing vests.
/// 2. Before the cliff: nothing vested; the next release lands on the cliff.
/// 3. At or after the schedule's end date: fully vested.
/// 4. Otherwise: linear in elapsed time since `vesting_start`.
pub fn calculate_vested_amount(wallet: &TokenWallet, now: Timestamp) -> Result<VestingCalculation> {
    let (schedule, start, end) = match (
        wallet.vesting_schedule.as_ref(),
        wallet.vesting_start,
        wallet.vesting_end,
    ) {
        (Some(schedule), Some(start), Some(end)) => (schedule, start, end),
        _ => {
            return Ok(VestingCalculation {
                total_vested: Decimal::ZERO,
                next_release: None,
                remaining_locked: wallet.locked_balance,
            })
        }
    };
    schedule.validate()?;
    if wallet.locked_balance.is_sign_negative() {
        return Err(CoreError::InvalidAmount(format!(
            "wallet {} has negative locked balance",
            wallet.holder
        )));
    }

    if now < schedule.cliff_date {
        return Ok(VestingCalculation {
            total_vested: Decimal::ZERO,
            next_release: Some(NextRelease {
                amount: release_amount_per_period(wallet, schedule)?,
                date: schedule.cliff_date,
            }),
            remaining_locked: wallet.locked_balance,
        });
    }

    if now >= schedule.end_date {
        return Ok(VestingCalculation {
            total_vested: wallet.locked_balance,
            next_release: None,
            remaining_locked: Decimal::ZERO,
        });
    }

    let total_ms = (end - start).num_milliseconds();
    if total_ms <= 0 {
        return Err(CoreError::InvalidSchedule(
            "vesting end must be after vesting start".to_string(),
        ));
    }
    // Clamped so a cliff before the start or an end date past `vesting_end`
    // cannot vest less than nothing or more than everything.
    let elapsed_ms = (now - start).num_milliseconds().clamp(0, total_ms);

    let total_vested = wallet
        .locked_balance
        .checked_mul(Decimal::from(elapsed_ms))
        .and_then(|v| v.checked_div(Decimal::from(total_ms)))
        .ok_or(CoreError::Overflow)?
        .floor();
    let remaining_locked = wallet.locked_balance - total_vested;

    let next_release = match next_release_date(now, schedule) {
        Some(date) => Some(NextRelease {
            amount: release_amount_per_period(wallet, schedule)?,
            date,
        }),
        None => None,
    };

    Ok(VestingCalculation {
        total_vested,
        next_release,
        remaining_locked,
    })
}

/// When the next tranche is due, or `None` once the schedule has ended.
pub fn next_release_date(now: Timestamp, schedule: &VestingSchedule) -> Option<Timestamp> {
    if now >= schedule.end_date {
        return None;
    }
    if now < schedule.cliff_date {
        return Some(schedule.cliff_date);
    }

    let stepped = schedule
        .release_frequency
        .step(now)
        .unwrap_or(schedule.end_date);
    Some(stepped.min(schedule.end_date))
}

/// `floor(locked_balance * release_percentage / 100 / periods_per_year)`.
pub fn release_amount_per_period(wallet: &TokenWallet, schedule: &VestingSchedule) -> Result<Amount> {
    let periods = Decimal::from(schedule.release_frequency.periods_per_year());
    Ok(wallet
        .locked_balance
        .checked_mul(schedule.release_percentage)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .and_then(|v| v.checked_div(periods))
        .ok_or(CoreError::Overflow)?
        .floor())
}

/// Result of moving tokens out of a wallet's locked balance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VestingRelease {
    pub amount: Amount,
    /// The wallet with balances already moved.
    pub wallet: TokenWallet,
    pub transfer: TokenTransfer,
    /// Release date the preview pointed at.
    pub release_date: Timestamp,
}

/// Release the next tranche of `wallet` at `now`.
///
/// Moves exactly `next_release.amount` (bounded by the locked balance) from
/// `locked_balance` to `balance`, and sets `next_release_at` to the preview
/// date. Fails with [`CoreError::NothingToRelease`] when there is no positive
/// next release, or while `now` is before the wallet's `next_release_at`.
pub fn release_vested_tokens(wallet: &TokenWallet, now: Timestamp) -> Result<VestingRelease> {
    if matches!(wallet.next_release_at, Some(due) if now < due) {
        return Err(CoreError::NothingToRelease);
    }
    let calculation = calculate_vested_amount(wallet, now)?;

    let next = match calculation.next_release {
        Some(next) if next.amount > Decimal::ZERO => next,
        _ => return Err(CoreError::NothingToRelease),
    };
    let amount = next.amount.min(wallet.locked_balance);
    if amount <= Decimal::ZERO {
        return Err(CoreError::NothingToRelease);
    }

    let mut updated = move_locked_to_liquid(wallet, amount)?;
    updated.next_release_at = Some(next.date);

    Ok(VestingRelease {
        amount,
        wallet: updated,
        transfer: self_transfer(wallet, amount, TransferType::Vest),
        release_date: next.date,
    })
}

/// After the schedule's end date, unlock whatever is still locked.
///
/// Fails with [`CoreError::NothingToRelease`] before the end date or when the
/// locked balance is already zero.
pub fn unlock_remaining(wallet: &TokenWallet, now: Timestamp) -> Result<VestingRelease> {
    let schedule = wallet
        .vesting_schedule
        .as_ref()
        .ok_or(CoreError::NothingToRelease)?;
    if now < schedule.end_date || wallet.locked_balance <= Decimal::ZERO {
        return Err(CoreError::NothingToRelease);
    }

    let amount = wallet.locked_balance;
    Ok(VestingRelease {
        amount,
        wallet: move_locked_to_liquid(wallet, amount)?,
        transfer: self_transfer(wallet, amount, TransferType::Unlock),
        release_date: schedule.end_date,
    })
}

fn move_locked_to_liquid(wallet: &TokenWallet, amount: Amount) -> Result<TokenWallet> {
    let mut updated = wallet.clone();
    updated.locked_balance = wallet
        .locked_balance
        .checked_sub(amount)
        .ok_or(CoreError::Overflow)?;
    updated.balance = wallet
        .balance
        .checked_add(amount)
        .ok_or(CoreError::Overflow)?;
    Ok(updated)
}

fn self_transfer(wallet: &TokenWallet, amount: Amount, transfer_type: TransferType) -> TokenTransfer {
    TokenTransfer {
        campaign_id: wallet.campaign_id,
        from: wallet.holder.clone(),
        to: wallet.holder.clone(),
        amount,
        transfer_type,
        status: SettlementStatus::Completed,
    }
}
