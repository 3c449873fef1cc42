//! Database layer: migrations, queries and versioned writes.
//!
//! Every write to a campaign or wallet is a compare-and-swap on its `version`
//! column. A write that matches no row means another request changed the
//! record since it was read, and surfaces as [`ApiError::Conflict`].

use sqlx::{sqlite::SqlitePoolOptions, SqliteConnection, SqlitePool};
use stratafi_core::{
    Campaign, CampaignStatus, Contribution, ContributionDraft, Distribution, SettlementStatus,
    Timestamp, TokenTransfer, TokenWallet,
};
use tracing::info;

use crate::errors::{ApiError, Result};
use crate::records::{
    millis, CampaignRow, ContributionRow, TransferRecord, Versioned, WalletRow,
};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    init_pool_with(database_url, 5).await
}

pub async fn init_pool_with(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Make sure the file is created if it doesn't exist yet.
    let url = if url.contains('?') || url.contains(":memory:") {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

fn expect_one(rows_affected: u64, what: &'static str) -> Result<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(ApiError::Conflict(what))
    }
}

// ─────────────────────────────────────────────────────────
// Campaigns
// ─────────────────────────────────────────────────────────

const CAMPAIGN_COLUMNS: &str = r#"
    id, name, symbol, description, creator, treasury, target_raise, amount_raised,
    price_per_token, initial_supply, fundraising_start, fundraising_end, status,
    tradeable_tokens, locked_tokens, clearing_price, version
"#;

/// Insert a new campaign; the `id` field of `campaign` is ignored.
pub async fn insert_campaign(
    conn: &mut SqliteConnection,
    campaign: &Campaign,
    created_at: Timestamp,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO campaigns
            (name, symbol, description, creator, treasury, target_raise, amount_raised,
             price_per_token, initial_supply, fundraising_start, fundraising_end, status,
             created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&campaign.name)
    .bind(&campaign.symbol)
    .bind(&campaign.description)
    .bind(&campaign.creator)
    .bind(&campaign.treasury)
    .bind(campaign.target_raise.to_string())
    .bind(campaign.amount_raised.to_string())
    .bind(campaign.price_per_token.to_string())
    .bind(campaign.initial_supply.to_string())
    .bind(millis(campaign.fundraising_start))
    .bind(millis(campaign.fundraising_end))
    .bind(campaign.status.as_str())
    .bind(millis(created_at))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn get_campaign(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Versioned<Campaign>>> {
    let row = sqlx::query_as::<_, CampaignRow>(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Versioned::try_from).transpose()
}

/// Campaigns ordered newest first, optionally filtered by status.
pub async fn list_campaigns(
    conn: &mut SqliteConnection,
    status: Option<CampaignStatus>,
) -> Result<Vec<Campaign>> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, CampaignRow>(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = ?1 ORDER BY id DESC"
            ))
            .bind(status.as_str())
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, CampaignRow>(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY id DESC"
            ))
            .fetch_all(&mut *conn)
            .await?
        }
    };
    rows.into_iter()
        .map(|row| Versioned::<Campaign>::try_from(row).map(|v| v.record))
        .collect()
}

/// IDs of campaigns the lifecycle sweeper may need to advance.
pub async fn open_campaign_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT id FROM campaigns WHERE status IN ('pending', 'fundraising') ORDER BY id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn update_campaign_status(
    conn: &mut SqliteConnection,
    id: i64,
    expected_version: i64,
    status: CampaignStatus,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE campaigns SET status = ?1, version = version + 1 WHERE id = ?2 AND version = ?3",
    )
    .bind(status.as_str())
    .bind(id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    expect_one(result.rows_affected(), "campaign")
}

pub async fn update_amount_raised(
    conn: &mut SqliteConnection,
    id: i64,
    expected_version: i64,
    amount_raised: &rust_decimal::Decimal,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns SET amount_raised = ?1, version = version + 1
        WHERE  id = ?2 AND version = ?3 AND status = 'fundraising'
        "#,
    )
    .bind(amount_raised.to_string())
    .bind(id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    expect_one(result.rows_affected(), "campaign")
}

/// Record a finalization outcome. `distribution` is present for completed
/// campaigns only.
pub async fn record_finalization(
    conn: &mut SqliteConnection,
    id: i64,
    expected_version: i64,
    status: CampaignStatus,
    distribution: Option<&Distribution>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET    status = ?1, tradeable_tokens = ?2, locked_tokens = ?3, clearing_price = ?4,
               version = version + 1
        WHERE  id = ?5 AND version = ?6 AND status = 'fundraising'
        "#,
    )
    .bind(status.as_str())
    .bind(distribution.map(|d| d.tradeable_tokens.to_string()))
    .bind(distribution.map(|d| d.locked_tokens.to_string()))
    .bind(distribution.map(|d| d.token_price.to_string()))
    .bind(id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    expect_one(result.rows_affected(), "campaign")
}

// ─────────────────────────────────────────────────────────
// Contributions
// ─────────────────────────────────────────────────────────

pub async fn insert_contribution(
    conn: &mut SqliteConnection,
    draft: &ContributionDraft,
    created_at: Timestamp,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO contributions
            (campaign_id, contributor, amount, token_amount, status, tx_ref, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(draft.campaign_id)
    .bind(&draft.contributor)
    .bind(draft.amount.to_string())
    .bind(draft.token_amount.to_string())
    .bind(draft.status.as_str())
    .bind(&draft.tx_ref)
    .bind(millis(created_at))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Settle a pending contribution. Already-settled rows are left untouched.
pub async fn settle_contribution(
    conn: &mut SqliteConnection,
    id: i64,
    outcome: SettlementStatus,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE contributions SET status = ?1 WHERE id = ?2 AND status = 'pending'",
    )
    .bind(outcome.as_str())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    expect_one(result.rows_affected(), "contribution")
}

/// All contributions for a campaign, oldest first.
pub async fn get_contributions(
    conn: &mut SqliteConnection,
    campaign_id: i64,
) -> Result<Vec<Contribution>> {
    let rows = sqlx::query_as::<_, ContributionRow>(
        r#"
        SELECT id, campaign_id, contributor, amount, token_amount, status, tx_ref, created_at
        FROM   contributions
        WHERE  campaign_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Contribution::try_from).collect()
}

// ─────────────────────────────────────────────────────────
// Wallets
// ─────────────────────────────────────────────────────────

pub async fn get_wallet(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    holder: &str,
) -> Result<Option<Versioned<TokenWallet>>> {
    let row = sqlx::query_as::<_, WalletRow>(
        r#"
        SELECT campaign_id, holder, balance, locked_balance, vesting_schedule,
               vesting_start, vesting_end, next_release_at, version
        FROM   token_wallets
        WHERE  campaign_id = ?1 AND holder = ?2
        "#,
    )
    .bind(campaign_id)
    .bind(holder)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Versioned::try_from).transpose()
}

pub async fn insert_wallet(
    conn: &mut SqliteConnection,
    wallet: &TokenWallet,
    now: Timestamp,
) -> Result<()> {
    let schedule = wallet
        .vesting_schedule
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    sqlx::query(
        r#"
        INSERT INTO token_wallets
            (campaign_id, holder, balance, locked_balance, vesting_schedule,
             vesting_start, vesting_end, next_release_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(wallet.campaign_id)
    .bind(&wallet.holder)
    .bind(wallet.balance.to_string())
    .bind(wallet.locked_balance.to_string())
    .bind(schedule)
    .bind(wallet.vesting_start.map(millis))
    .bind(wallet.vesting_end.map(millis))
    .bind(wallet.next_release_at.map(millis))
    .bind(millis(now))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_wallet(
    conn: &mut SqliteConnection,
    wallet: &TokenWallet,
    expected_version: i64,
    now: Timestamp,
) -> Result<()> {
    let schedule = wallet
        .vesting_schedule
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let result = sqlx::query(
        r#"
        UPDATE token_wallets
        SET    balance = ?1, locked_balance = ?2, vesting_schedule = ?3,
               vesting_start = ?4, vesting_end = ?5, next_release_at = ?6,
               updated_at = ?7, version = version + 1
        WHERE  campaign_id = ?8 AND holder = ?9 AND version = ?10
        "#,
    )
    .bind(wallet.balance.to_string())
    .bind(wallet.locked_balance.to_string())
    .bind(schedule)
    .bind(wallet.vesting_start.map(millis))
    .bind(wallet.vesting_end.map(millis))
    .bind(wallet.next_release_at.map(millis))
    .bind(millis(now))
    .bind(wallet.campaign_id)
    .bind(&wallet.holder)
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    expect_one(result.rows_affected(), "wallet")
}

// ─────────────────────────────────────────────────────────
// Transfers
// ─────────────────────────────────────────────────────────

pub async fn insert_transfer(
    conn: &mut SqliteConnection,
    transfer: &TokenTransfer,
    now: Timestamp,
) -> Result<i64> {
    let completed_at = match transfer.status {
        SettlementStatus::Pending => None,
        _ => Some(millis(now)),
    };
    let id = sqlx::query(
        r#"
        INSERT INTO token_transfers
            (campaign_id, from_holder, to_holder, amount, transfer_type, status,
             created_at, completed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(transfer.campaign_id)
    .bind(&transfer.from)
    .bind(&transfer.to)
    .bind(transfer.amount.to_string())
    .bind(transfer.transfer_type.as_str())
    .bind(transfer.status.as_str())
    .bind(millis(now))
    .bind(completed_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Transfers into or out of a holder's wallet, oldest first.
pub async fn get_transfers_for_holder(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    holder: &str,
) -> Result<Vec<TransferRecord>> {
    let rows = sqlx::query_as::<_, TransferRecord>(
        r#"
        SELECT id, campaign_id, from_holder, to_holder, amount, transfer_type, status,
               tx_ref, created_at, completed_at
        FROM   token_transfers
        WHERE  campaign_id = ?1 AND (from_holder = ?2 OR to_holder = ?2)
        ORDER  BY id ASC
        "#,
    )
    .bind(campaign_id)
    .bind(holder)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
