use chrono::{TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::CoreError;
use crate::invariants::{assert_release_conserves, assert_vesting_monotonic};
use crate::types::{
    Amount, ReleaseFrequency, SettlementStatus, Timestamp, TokenWallet, TransferType,
    VestingSchedule,
};
use crate::vesting::{
    calculate_vested_amount, next_release_date, release_amount_per_period, release_vested_tokens,
    unlock_remaining, NextRelease,
};

fn at(y: i32, m: u32, d: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn schedule(frequency: ReleaseFrequency) -> VestingSchedule {
    VestingSchedule {
        cliff_date: at(2024, 4, 1),
        end_date: at(2025, 1, 1),
        release_frequency: frequency,
        release_percentage: dec!(8.33),
    }
}

/// Scenario C wallet: 12 000 locked, vesting over calendar 2024, cliff in April.
fn vesting_wallet(locked: Amount) -> TokenWallet {
    TokenWallet {
        campaign_id: 9,
        holder: "investor".to_string(),
        balance: dec!(500),
        locked_balance: locked,
        vesting_schedule: Some(schedule(ReleaseFrequency::Monthly)),
        vesting_start: Some(at(2024, 1, 1)),
        vesting_end: Some(at(2025, 1, 1)),
        next_release_at: None,
    }
}

#[test]
fn test_scenario_c_half_way() {
    let wallet = vesting_wallet(dec!(12000));

    // 2024 is a leap year: the exact midpoint of the window is 2 July.
    let mid = calculate_vested_amount(&wallet, at(2024, 7, 2)).unwrap();
    assert_eq!(mid.total_vested, dec!(6000));
    assert_eq!(mid.remaining_locked, dec!(6000));

    // 1 July is 182 of 366 days in.
    let first_of_july = calculate_vested_amount(&wallet, at(2024, 7, 1)).unwrap();
    assert_eq!(first_of_july.total_vested, dec!(5967));
    assert_eq!(first_of_july.remaining_locked, dec!(6033));
    assert_eq!(
        first_of_july.next_release,
        Some(NextRelease {
            amount: dec!(83),
            date: at(2024, 8, 1),
        })
    );
}

#[test]
fn test_no_schedule_vests_nothing() {
    let wallet = TokenWallet {
        locked_balance: dec!(400),
        ..TokenWallet::empty(9, "holder")
    };
    let calc = calculate_vested_amount(&wallet, at(2024, 6, 1)).unwrap();
    assert_eq!(calc.total_vested, Decimal::ZERO);
    assert_eq!(calc.next_release, None);
    assert_eq!(calc.remaining_locked, dec!(400));

    let partial = TokenWallet {
        vesting_end: None,
        ..vesting_wallet(dec!(400))
    };
    assert_eq!(
        calculate_vested_amount(&partial, at(2024, 6, 1)).unwrap().total_vested,
        Decimal::ZERO
    );
}

#[test]
fn test_before_cliff_previews_cliff_release() {
    let wallet = vesting_wallet(dec!(12000));
    let just_before = at(2024, 4, 1) - TimeDelta::milliseconds(1);

    let calc = calculate_vested_amount(&wallet, just_before).unwrap();
    assert_eq!(calc.total_vested, Decimal::ZERO);
    assert_eq!(calc.remaining_locked, dec!(12000));
    assert_eq!(
        calc.next_release,
        Some(NextRelease {
            amount: dec!(83),
            date: at(2024, 4, 1),
        })
    );
}

#[test]
fn test_cliff_and_end_boundaries() {
    let wallet = vesting_wallet(dec!(12000));

    // At the cliff the linear share since vesting_start becomes available.
    let at_cliff = calculate_vested_amount(&wallet, at(2024, 4, 1)).unwrap();
    assert_eq!(at_cliff.total_vested, dec!(2983));

    let at_end = calculate_vested_amount(&wallet, at(2025, 1, 1)).unwrap();
    assert_eq!(at_end.total_vested, dec!(12000));
    assert_eq!(at_end.remaining_locked, Decimal::ZERO);
    assert_eq!(at_end.next_release, None);
}

#[test]
fn test_vested_amount_is_monotonic() {
    let wallet = vesting_wallet(dec!(12345));
    let mut now = at(2023, 12, 1);
    let mut previous = Decimal::ZERO;
    while now <= at(2025, 2, 1) {
        let vested = calculate_vested_amount(&wallet, now).unwrap().total_vested;
        assert_vesting_monotonic(previous, vested);
        assert!(vested <= wallet.locked_balance);
        previous = vested;
        now += TimeDelta::hours(13);
    }
    assert_eq!(previous, dec!(12345));
}

#[test]
fn test_schedule_end_past_vesting_end_never_overvests() {
    let mut wallet = vesting_wallet(dec!(1000));
    wallet.vesting_end = Some(at(2024, 6, 1));
    let calc = calculate_vested_amount(&wallet, at(2024, 9, 1)).unwrap();
    assert_eq!(calc.total_vested, dec!(1000));
    assert_eq!(calc.remaining_locked, Decimal::ZERO);
}

#[test]
fn test_inverted_schedule_is_rejected() {
    let mut wallet = vesting_wallet(dec!(1000));
    if let Some(s) = wallet.vesting_schedule.as_mut() {
        s.cliff_date = at(2025, 6, 1);
    }
    assert!(matches!(
        calculate_vested_amount(&wallet, at(2024, 6, 1)),
        Err(CoreError::InvalidSchedule(_))
    ));
}

// ── Release helpers ──────────────────────────────────────────────────

#[test]
fn test_next_release_date_steps_by_frequency() {
    let now = at(2024, 5, 10);
    assert_eq!(
        next_release_date(now, &schedule(ReleaseFrequency::Daily)),
        Some(at(2024, 5, 11))
    );
    assert_eq!(
        next_release_date(now, &schedule(ReleaseFrequency::Weekly)),
        Some(at(2024, 5, 17))
    );
    assert_eq!(
        next_release_date(now, &schedule(ReleaseFrequency::Monthly)),
        Some(at(2024, 6, 10))
    );
}

#[test]
fn test_next_release_date_clamps_and_ends() {
    let monthly = schedule(ReleaseFrequency::Monthly);
    assert_eq!(next_release_date(at(2024, 12, 20), &monthly), Some(at(2025, 1, 1)));
    assert_eq!(next_release_date(at(2025, 1, 1), &monthly), None);
    assert_eq!(next_release_date(at(2024, 2, 1), &monthly), Some(at(2024, 4, 1)));
}

#[test]
fn test_release_amount_per_frequency() {
    let wallet = vesting_wallet(dec!(12000));
    let cases = [
        (ReleaseFrequency::Daily, dec!(2)),
        (ReleaseFrequency::Weekly, dec!(19)),
        (ReleaseFrequency::Monthly, dec!(83)),
    ];
    for (frequency, expected) in cases {
        assert_eq!(
            release_amount_per_period(&wallet, &schedule(frequency)).unwrap(),
            expected
        );
    }
}

/// The per-period preview assumes a one-year horizon while `total_vested`
/// interpolates over the wallet's own window, so the two disagree.
#[test]
fn test_preview_differs_from_linear_increment() {
    let wallet = vesting_wallet(dec!(12000));
    let now = at(2024, 7, 2);

    let calc = calculate_vested_amount(&wallet, now).unwrap();
    let next = calc.next_release.clone().unwrap();
    let later = calculate_vested_amount(&wallet, next.date).unwrap();
    let linear_increment = later.total_vested - calc.total_vested;

    assert_eq!(next.amount, dec!(83));
    assert_eq!(linear_increment, dec!(1016));
    assert_ne!(next.amount, linear_increment);
}

// ── Release ──────────────────────────────────────────────────────────

#[test]
fn test_release_moves_preview_amount() {
    let wallet = vesting_wallet(dec!(12000));
    let release = release_vested_tokens(&wallet, at(2024, 7, 2)).unwrap();

    assert_eq!(release.amount, dec!(83));
    assert_eq!(release.wallet.balance, dec!(583));
    assert_eq!(release.wallet.locked_balance, dec!(11917));
    assert_eq!(release.release_date, at(2024, 8, 2));
    assert_eq!(release.transfer.transfer_type, TransferType::Vest);
    assert_eq!(release.transfer.status, SettlementStatus::Completed);
    assert_eq!(release.transfer.from, release.transfer.to);
    assert_eq!(release.transfer.amount, dec!(83));
    assert_eq!(release.wallet.next_release_at, Some(at(2024, 8, 2)));
    assert_release_conserves(&wallet, &release.wallet);
}

#[test]
fn test_release_waits_for_next_release_date() {
    let wallet = vesting_wallet(dec!(12000));
    let now = at(2024, 7, 2);
    let first = release_vested_tokens(&wallet, now).unwrap();

    // Same instant, and any time before the stamped date, moves nothing more.
    assert_eq!(
        release_vested_tokens(&first.wallet, now),
        Err(CoreError::NothingToRelease)
    );
    assert_eq!(
        release_vested_tokens(&first.wallet, at(2024, 8, 2) - TimeDelta::milliseconds(1)),
        Err(CoreError::NothingToRelease)
    );

    let second = release_vested_tokens(&first.wallet, at(2024, 8, 2)).unwrap();
    assert_eq!(second.amount, dec!(82));
    assert_eq!(second.wallet.locked_balance, dec!(11835));
    assert_eq!(second.wallet.next_release_at, Some(at(2024, 9, 2)));
    assert_release_conserves(&first.wallet, &second.wallet);
}

#[test]
fn test_repeated_release_never_outruns_schedule() {
    let wallet = vesting_wallet(dec!(12000));
    let now = at(2024, 7, 2);

    let mut current = wallet.clone();
    let mut released = Decimal::ZERO;
    for _ in 0..50 {
        match release_vested_tokens(&current, now) {
            Ok(release) => {
                released += release.amount;
                current = release.wallet;
            }
            Err(e) => assert_eq!(e, CoreError::NothingToRelease),
        }
    }
    assert_eq!(released, dec!(83));
    assert_eq!(current.locked_balance, dec!(11917));
}

#[test]
fn test_release_before_cliff_moves_cliff_tranche() {
    let wallet = vesting_wallet(dec!(12000));
    let release = release_vested_tokens(&wallet, at(2024, 3, 1)).unwrap();

    assert_eq!(release.amount, dec!(83));
    assert_eq!(release.release_date, at(2024, 4, 1));
    assert_eq!(release.wallet.next_release_at, Some(at(2024, 4, 1)));
    assert_eq!(
        release_vested_tokens(&release.wallet, at(2024, 3, 15)),
        Err(CoreError::NothingToRelease)
    );
    assert!(release_vested_tokens(&release.wallet, at(2024, 4, 1)).is_ok());
}

#[test]
fn test_release_after_end_is_rejected() {
    let wallet = vesting_wallet(dec!(12000));
    assert_eq!(
        release_vested_tokens(&wallet, at(2025, 2, 1)),
        Err(CoreError::NothingToRelease)
    );
}

#[test]
fn test_release_of_dust_is_rejected() {
    // floor(10 * 8.33 / 100 / 12) == 0
    let wallet = vesting_wallet(dec!(10));
    assert_eq!(
        release_vested_tokens(&wallet, at(2024, 7, 2)),
        Err(CoreError::NothingToRelease)
    );
}

#[test]
fn test_release_without_schedule_is_rejected() {
    let wallet = TokenWallet {
        locked_balance: dec!(1000),
        ..TokenWallet::empty(9, "holder")
    };
    assert_eq!(
        release_vested_tokens(&wallet, at(2024, 7, 2)),
        Err(CoreError::NothingToRelease)
    );
}

#[test]
fn test_unlock_remaining_after_end() {
    let wallet = vesting_wallet(dec!(4321));
    assert_eq!(
        unlock_remaining(&wallet, at(2024, 12, 31)),
        Err(CoreError::NothingToRelease)
    );

    let unlocked = unlock_remaining(&wallet, at(2025, 1, 1)).unwrap();
    assert_eq!(unlocked.amount, dec!(4321));
    assert_eq!(unlocked.wallet.locked_balance, Decimal::ZERO);
    assert_eq!(unlocked.wallet.balance, dec!(4821));
    assert_eq!(unlocked.transfer.transfer_type, TransferType::Unlock);
    assert_release_conserves(&wallet, &unlocked.wallet);

    assert_eq!(
        unlock_remaining(&unlocked.wallet, at(2025, 1, 2)),
        Err(CoreError::NothingToRelease)
    );
}
