use chrono::{TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::{CoreError, PeriodError};
use crate::fundraising::{
    activate_trading, compute_fundraising_status, finalize, next_lifecycle_status, next_status,
    validate_fundraising_period, Finalization,
};
use crate::invariants::{assert_all_campaign_invariants, assert_valid_status_transition};
use crate::policy::Policy;
use crate::types::{Amount, Campaign, CampaignStatus, Timestamp};

fn at(y: i32, m: u32, d: u32) -> Timestamp {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn campaign(target: Amount, raised: Amount, status: CampaignStatus) -> Campaign {
    Campaign {
        id: 1,
        name: "Momentum Alpha".to_string(),
        symbol: "MOMA".to_string(),
        description: None,
        creator: "creator".to_string(),
        treasury: "treasury".to_string(),
        target_raise: target,
        amount_raised: raised,
        price_per_token: dec!(1),
        initial_supply: dec!(1000000),
        fundraising_start: at(2024, 3, 1),
        fundraising_end: at(2024, 3, 15),
        status,
        tradeable_tokens: None,
        locked_tokens: None,
        clearing_price: None,
    }
}

#[test]
fn test_scenario_a_ended_above_minimum_completes() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(60000), CampaignStatus::Fundraising);
    assert_all_campaign_invariants(&c);
    let now = at(2024, 4, 1);

    let status = compute_fundraising_status(&c, now, &policy).unwrap();
    assert!(status.is_started);
    assert!(status.is_ended);
    assert_eq!(status.progress, dec!(0.6));
    assert!(status.minimum_reached);
    assert!(status.can_finalize);
    assert!(!status.is_active);
    assert_eq!(status.remaining_time_ms, None);

    assert_eq!(next_status(&c, now, &policy).unwrap(), CampaignStatus::Completed);
}

#[test]
fn test_scenario_b_ended_below_minimum_fails() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(30000), CampaignStatus::Fundraising);
    let now = at(2024, 4, 1);

    let status = compute_fundraising_status(&c, now, &policy).unwrap();
    assert_eq!(status.progress, dec!(0.3));
    assert!(!status.minimum_reached);
    assert!(status.can_finalize);

    assert_eq!(next_status(&c, now, &policy).unwrap(), CampaignStatus::Failed);
}

#[test]
fn test_status_is_deterministic() {
    let policy = Policy::default();
    let c = campaign(dec!(5000), dec!(1234.56), CampaignStatus::Fundraising);
    let now = at(2024, 3, 7);

    let first = compute_fundraising_status(&c, now, &policy).unwrap();
    let second = compute_fundraising_status(&c, now, &policy).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_active_window_reports_remaining_time() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(10000), CampaignStatus::Fundraising);
    let now = at(2024, 3, 14);

    let status = compute_fundraising_status(&c, now, &policy).unwrap();
    assert!(status.is_active);
    assert!(!status.can_finalize);
    assert_eq!(
        status.remaining_time_ms,
        Some(TimeDelta::days(1).num_milliseconds())
    );
    assert_eq!(next_status(&c, now, &policy).unwrap(), CampaignStatus::Fundraising);
}

#[test]
fn test_full_target_can_finalize_before_window_closes() {
    let policy = Policy::default();
    let now = at(2024, 3, 5);
    for raised in [dec!(100000), dec!(100000.01), dec!(250000)] {
        let c = campaign(dec!(100000), raised, CampaignStatus::Fundraising);
        let status = compute_fundraising_status(&c, now, &policy).unwrap();
        assert!(!status.is_ended);
        assert!(status.can_finalize, "raised {raised} should be finalizable");
        assert_eq!(next_status(&c, now, &policy).unwrap(), CampaignStatus::Completed);
    }
}

#[test]
fn test_minimum_reached_matches_ratio() {
    let policy = Policy::default();
    let now = at(2024, 3, 5);
    let cases = [
        (dec!(0), false),
        (dec!(49999.99), false),
        (dec!(50000), true),
        (dec!(50000.01), true),
        (dec!(99999), true),
    ];
    for (raised, expected) in cases {
        let c = campaign(dec!(100000), raised, CampaignStatus::Fundraising);
        let status = compute_fundraising_status(&c, now, &policy).unwrap();
        assert_eq!(status.minimum_reached, expected, "raised {raised}");
        assert_eq!(status.minimum_reached, raised / dec!(100000) >= dec!(0.5));
    }
}

#[test]
fn test_terminal_statuses_never_change() {
    let policy = Policy::default();
    let instants = [at(2024, 2, 1), at(2024, 3, 10), at(2024, 3, 15), at(2030, 1, 1)];
    for status in [CampaignStatus::Completed, CampaignStatus::Failed] {
        for raised in [dec!(0), dec!(30000), dec!(100000)] {
            let c = campaign(dec!(100000), raised, status);
            for now in instants {
                assert_eq!(next_status(&c, now, &policy).unwrap(), status);
                let s = compute_fundraising_status(&c, now, &policy).unwrap();
                assert!(!s.can_finalize);
                assert!(!s.is_active);
            }
        }
    }
}

#[test]
fn test_pending_waits_for_external_activation() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(0), CampaignStatus::Pending);

    assert_eq!(next_status(&c, at(2024, 3, 5), &policy).unwrap(), CampaignStatus::Pending);
    assert_eq!(
        next_lifecycle_status(&c, at(2024, 2, 1), &policy).unwrap(),
        CampaignStatus::Pending
    );

    let opened = next_lifecycle_status(&c, at(2024, 3, 1), &policy).unwrap();
    assert_eq!(opened, CampaignStatus::Fundraising);
    assert_valid_status_transition(c.status, opened);
}

#[test]
fn test_zero_target_is_rejected() {
    let policy = Policy::default();
    let c = campaign(Decimal::ZERO, dec!(10), CampaignStatus::Fundraising);
    assert!(matches!(
        compute_fundraising_status(&c, at(2024, 3, 5), &policy),
        Err(CoreError::InvalidCampaign(_))
    ));
    assert!(next_status(&c, at(2024, 3, 5), &policy).is_err());
}

#[test]
fn test_custom_minimum_ratio() {
    let policy = Policy {
        minimum_raise_ratio: dec!(0.8),
        ..Policy::default()
    };
    let c = campaign(dec!(100000), dec!(60000), CampaignStatus::Fundraising);
    assert_eq!(next_status(&c, at(2024, 4, 1), &policy).unwrap(), CampaignStatus::Failed);
}

// ── Fundraising window validation ────────────────────────────────────

#[test]
fn test_period_bounds() {
    let policy = Policy::default();
    let now = at(2024, 1, 1);
    let start = at(2024, 1, 2);

    let too_short = start + TimeDelta::days(6) + TimeDelta::hours(23);
    assert_eq!(
        validate_fundraising_period(start, too_short, now, &policy),
        Err(CoreError::InvalidPeriod(PeriodError::TooShort { min_days: 7 }))
    );

    assert!(validate_fundraising_period(start, start + TimeDelta::days(7), now, &policy).is_ok());
    assert!(validate_fundraising_period(start, start + TimeDelta::days(21), now, &policy).is_ok());

    let too_long = start + TimeDelta::days(21) + TimeDelta::milliseconds(1);
    assert_eq!(
        validate_fundraising_period(start, too_long, now, &policy),
        Err(CoreError::InvalidPeriod(PeriodError::TooLong { max_days: 21 }))
    );
}

#[test]
fn test_period_must_start_in_future() {
    let policy = Policy::default();
    let now = at(2024, 1, 10);
    let start = at(2024, 1, 9);
    assert_eq!(
        validate_fundraising_period(start, start + TimeDelta::days(10), now, &policy),
        Err(CoreError::InvalidPeriod(PeriodError::StartInPast))
    );
    // Starting exactly now is allowed.
    assert!(validate_fundraising_period(now, now + TimeDelta::days(10), now, &policy).is_ok());
}

// ── Activation and finalization ──────────────────────────────────────

#[test]
fn test_activate_trading_only_from_completed() {
    let completed = campaign(dec!(100), dec!(100), CampaignStatus::Completed);
    assert_eq!(activate_trading(&completed).unwrap(), CampaignStatus::Trading);

    for status in [
        CampaignStatus::Pending,
        CampaignStatus::Fundraising,
        CampaignStatus::Failed,
        CampaignStatus::Trading,
    ] {
        let c = campaign(dec!(100), dec!(100), status);
        assert_eq!(
            activate_trading(&c),
            Err(CoreError::InvalidTransition {
                from: status,
                to: CampaignStatus::Trading
            })
        );
    }
}

#[test]
fn test_finalize_open_window_is_rejected() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(70000), CampaignStatus::Fundraising);
    assert_eq!(finalize(&c, at(2024, 3, 5), &policy), Err(CoreError::NotFinalizable));

    let done = campaign(dec!(100000), dec!(70000), CampaignStatus::Completed);
    assert_eq!(finalize(&done, at(2024, 4, 1), &policy), Err(CoreError::NotFinalizable));
}

#[test]
fn test_finalize_success_carries_distribution_and_schedule() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(60000), CampaignStatus::Fundraising);
    let now = at(2024, 4, 1);

    match finalize(&c, now, &policy).unwrap() {
        Finalization::Completed {
            distribution,
            schedule,
        } => {
            assert_eq!(distribution.tradeable_tokens, dec!(750000));
            assert_eq!(distribution.locked_tokens, dec!(250000));
            assert_eq!(distribution.token_price, dec!(0.06));
            assert_eq!(schedule.cliff_date, at(2024, 7, 1));
            assert_eq!(schedule.end_date, at(2025, 4, 1));
        }
        Finalization::Failed => panic!("expected completion"),
    }
}

#[test]
fn test_finalize_failure() {
    let policy = Policy::default();
    let c = campaign(dec!(100000), dec!(30000), CampaignStatus::Fundraising);
    let outcome = finalize(&c, at(2024, 4, 1), &policy).unwrap();
    assert_eq!(outcome, Finalization::Failed);
    assert_eq!(outcome.status(), CampaignStatus::Failed);
    assert_valid_status_transition(c.status, outcome.status());
}
