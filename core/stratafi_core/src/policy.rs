//! Fundraising and vesting policy.
//!
//! Every tunable rule of the engine lives in [`Policy`] and is passed in by the
//! caller. [`Policy::default`] reproduces the production rules:
//!
//! | Rule                     | Default          |
//! |--------------------------|------------------|
//! | Minimum viable raise     | 50% of target    |
//! | Tradeable / locked split | 75% / 25%        |
//! | Cliff                    | 3 months         |
//! | Vesting horizon          | 12 months        |
//! | Release cadence          | monthly, 8.33%   |
//! | Fundraising window       | 7 to 21 days     |

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};
use crate::types::ReleaseFrequency;

pub const DEFAULT_CLIFF_MONTHS: u32 = 3;
pub const DEFAULT_VESTING_MONTHS: u32 = 12;
pub const DEFAULT_MIN_PERIOD_DAYS: i64 = 7;
pub const DEFAULT_MAX_PERIOD_DAYS: i64 = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Fraction of `target_raise` that must be reached for a campaign to
    /// complete rather than fail.
    pub minimum_raise_ratio: Decimal,
    /// Fraction of `initial_supply` distributed as liquid tokens.
    pub tradeable_share: Decimal,
    /// Fraction of `initial_supply` distributed as locked tokens.
    pub locked_share: Decimal,
    pub cliff_months: u32,
    pub vesting_months: u32,
    pub release_frequency: ReleaseFrequency,
    pub release_percentage: Decimal,
    pub min_period_days: i64,
    pub max_period_days: i64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            minimum_raise_ratio: Decimal::new(5, 1),
            tradeable_share: Decimal::new(75, 2),
            locked_share: Decimal::new(25, 2),
            cliff_months: DEFAULT_CLIFF_MONTHS,
            vesting_months: DEFAULT_VESTING_MONTHS,
            release_frequency: ReleaseFrequency::Monthly,
            release_percentage: Decimal::new(833, 2),
            min_period_days: DEFAULT_MIN_PERIOD_DAYS,
            max_period_days: DEFAULT_MAX_PERIOD_DAYS,
        }
    }
}

impl Policy {
    /// Reject policies that would break the engine's invariants.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_raise_ratio <= Decimal::ZERO || self.minimum_raise_ratio > Decimal::ONE {
            return Err(CoreError::InvalidPolicy(
                "minimum raise ratio must be in (0, 1]".to_string(),
            ));
        }
        if self.tradeable_share.is_sign_negative() || self.locked_share.is_sign_negative() {
            return Err(CoreError::InvalidPolicy(
                "distribution shares must not be negative".to_string(),
            ));
        }
        if self.tradeable_share + self.locked_share > Decimal::ONE {
            return Err(CoreError::InvalidPolicy(
                "distribution shares must not exceed the supply".to_string(),
            ));
        }
        if self.cliff_months > self.vesting_months {
            return Err(CoreError::InvalidPolicy(
                "cliff must not be longer than the vesting horizon".to_string(),
            ));
        }
        if self.release_percentage.is_sign_negative() {
            return Err(CoreError::InvalidPolicy(
                "release percentage must not be negative".to_string(),
            ));
        }
        if self.min_period_days < 0 || self.min_period_days > self.max_period_days {
            return Err(CoreError::InvalidPolicy(
                "fundraising window bounds are inverted".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_period(&self) -> TimeDelta {
        TimeDelta::days(self.min_period_days)
    }

    pub fn max_period(&self) -> TimeDelta {
        TimeDelta::days(self.max_period_days)
    }
}
