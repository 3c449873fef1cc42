//! Campaign operations applied against the database.
//!
//! Each mutating operation opens one transaction, re-reads the records it
//! touches, hands them to `stratafi_core`, and writes the result back with
//! versioned updates before committing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use stratafi_core::{
    activate_trading, allocate_tokens, calculate_vested_amount, compute_fundraising_status,
    credit_raise, draft_contribution, finalize, next_lifecycle_status, plan_refunds,
    release_vested_tokens, settle, transfer_tokens, unlock_remaining, validate_fundraising_period,
    Allocation, Amount, Campaign, CampaignStatus, Contribution, Distribution, Finalization,
    FundraisingStatus, Policy, RefundPlan, SettlementStatus, Timestamp, TokenTransfer,
    TokenWallet, TransferOutcome, TransferType, VestingCalculation, VestingRelease,
    VestingSchedule,
};
use tracing::{debug, info, warn};

use crate::db;
use crate::errors::{ApiError, Result};
use crate::records::{TransferRecord, Versioned};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_SYMBOL_LEN: usize = 10;
/// Smallest fundraising target accepted, in USDC.
pub const MIN_TARGET_RAISE: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone)]
pub struct Service {
    pool: SqlitePool,
    policy: Policy,
    treasury: String,
}

// ─────────────────────────────────────────────────────────
// Inputs and views
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_raise: Amount,
    pub price_per_token: Amount,
    pub initial_supply: Amount,
    pub fundraising_start: Timestamp,
    pub fundraising_end: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    pub campaign: Campaign,
    pub fundraising: FundraisingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub wallet: TokenWallet,
    pub vesting: VestingCalculation,
    pub transfers: Vec<TransferRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FinalizeOutcome {
    Completed {
        distribution: Distribution,
        schedule: VestingSchedule,
        allocations: Vec<Allocation>,
    },
    Failed {
        refunds: RefundPlan,
    },
}

/// What a lifecycle pass did to one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Unchanged,
    Opened,
    Finalized(CampaignStatus),
}

impl Service {
    pub fn new(pool: SqlitePool, policy: Policy, treasury: impl Into<String>) -> Self {
        Self {
            pool,
            policy,
            treasury: treasury.into(),
        }
    }

    // ─────────────────────────────────────────────────────
    // Campaigns
    // ─────────────────────────────────────────────────────

    pub async fn create_campaign(
        &self,
        creator: &str,
        input: NewCampaign,
        now: Timestamp,
    ) -> Result<Campaign> {
        let name = input.name.trim();
        let symbol = input.symbol.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::BadRequest(format!(
                "name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
        if symbol.is_empty() || symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(ApiError::BadRequest(format!(
                "symbol must be 1 to {MAX_SYMBOL_LEN} characters"
            )));
        }
        if input.target_raise < MIN_TARGET_RAISE {
            return Err(ApiError::BadRequest(format!(
                "target raise must be at least {MIN_TARGET_RAISE} USDC"
            )));
        }
        if input.price_per_token <= Decimal::ZERO || input.initial_supply <= Decimal::ZERO {
            return Err(ApiError::BadRequest(
                "price per token and initial supply must be greater than 0".to_string(),
            ));
        }
        validate_fundraising_period(
            input.fundraising_start,
            input.fundraising_end,
            now,
            &self.policy,
        )?;

        let mut campaign = Campaign {
            id: 0,
            name: name.to_string(),
            symbol: symbol.to_uppercase(),
            description: input.description,
            creator: creator.to_string(),
            treasury: self.treasury.clone(),
            target_raise: input.target_raise,
            amount_raised: Decimal::ZERO,
            price_per_token: input.price_per_token,
            initial_supply: input.initial_supply,
            fundraising_start: input.fundraising_start,
            fundraising_end: input.fundraising_end,
            status: CampaignStatus::Pending,
            tradeable_tokens: None,
            locked_tokens: None,
            clearing_price: None,
        };
        campaign.status = next_lifecycle_status(&campaign, now, &self.policy)?;

        let mut tx = self.pool.begin().await?;
        campaign.id = db::insert_campaign(&mut tx, &campaign, now).await?;
        tx.commit().await?;

        info!(
            "Created campaign {} ({}) for {}, window {} to {}",
            campaign.id,
            campaign.symbol,
            campaign.creator,
            campaign.fundraising_start,
            campaign.fundraising_end
        );
        Ok(campaign)
    }

    pub async fn campaign_view(&self, id: i64, now: Timestamp) -> Result<CampaignView> {
        let mut conn = self.pool.acquire().await?;
        let campaign = load_campaign(&mut conn, id).await?.record;
        let fundraising = compute_fundraising_status(&campaign, now, &self.policy)?;
        Ok(CampaignView {
            campaign,
            fundraising,
        })
    }

    pub async fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        let mut conn = self.pool.acquire().await?;
        db::list_campaigns(&mut conn, status).await
    }

    /// Move a completed campaign into trading. Only its creator may do so.
    pub async fn activate(&self, id: i64, caller: &str) -> Result<Campaign> {
        let mut tx = self.pool.begin().await?;
        let Versioned {
            record: mut campaign,
            version,
        } = load_campaign(&mut tx, id).await?;
        if campaign.creator != caller {
            return Err(ApiError::Forbidden(
                "Only the campaign creator can activate trading",
            ));
        }

        let status = activate_trading(&campaign)?;
        db::update_campaign_status(&mut tx, id, version, status).await?;
        tx.commit().await?;

        info!("Campaign {id} is now trading");
        campaign.status = status;
        Ok(campaign)
    }

    // ─────────────────────────────────────────────────────
    // Contributions
    // ─────────────────────────────────────────────────────

    pub async fn contribute(
        &self,
        id: i64,
        contributor: &str,
        amount: Amount,
        tx_ref: Option<String>,
        now: Timestamp,
    ) -> Result<Contribution> {
        let mut tx = self.pool.begin().await?;
        let Versioned {
            record: mut campaign,
            mut version,
        } = load_campaign(&mut tx, id).await?;

        // The sweeper may not have opened the window yet.
        if campaign.status == CampaignStatus::Pending
            && next_lifecycle_status(&campaign, now, &self.policy)? == CampaignStatus::Fundraising
        {
            db::update_campaign_status(&mut tx, id, version, CampaignStatus::Fundraising).await?;
            campaign.status = CampaignStatus::Fundraising;
            version += 1;
        }

        let draft = draft_contribution(&campaign, contributor, amount, tx_ref, now, &self.policy)?;
        let contribution_id = db::insert_contribution(&mut tx, &draft, now).await?;
        let pending = Contribution {
            id: contribution_id,
            campaign_id: draft.campaign_id,
            contributor: draft.contributor,
            amount: draft.amount,
            token_amount: draft.token_amount,
            status: draft.status,
            tx_ref: draft.tx_ref,
            created_at: now,
        };

        let raised = credit_raise(&campaign, pending.amount)?;
        let contribution = settle(&pending, SettlementStatus::Completed)?;
        db::update_amount_raised(&mut tx, id, version, &raised).await?;
        db::settle_contribution(&mut tx, contribution.id, contribution.status).await?;
        tx.commit().await?;

        debug!(
            "Campaign {id}: {} contributed {} (raised {raised} of {})",
            contribution.contributor, contribution.amount, campaign.target_raise
        );
        Ok(contribution)
    }

    pub async fn contributions(&self, id: i64) -> Result<Vec<Contribution>> {
        let mut conn = self.pool.acquire().await?;
        load_campaign(&mut conn, id).await?;
        db::get_contributions(&mut conn, id).await
    }

    // ─────────────────────────────────────────────────────
    // Finalization
    // ─────────────────────────────────────────────────────

    /// Finalize a campaign. With `Some(caller)`, only the creator may do so;
    /// `None` is used by the lifecycle sweeper.
    pub async fn finalize(
        &self,
        id: i64,
        caller: Option<&str>,
        now: Timestamp,
    ) -> Result<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;
        let Versioned {
            record: campaign,
            version,
        } = load_campaign(&mut tx, id).await?;
        if let Some(caller) = caller {
            if campaign.creator != caller {
                return Err(ApiError::Forbidden(
                    "Only the campaign creator can finalize",
                ));
            }
        }

        let decision = finalize(&campaign, now, &self.policy)?;
        let status = decision.status();
        let contributions = db::get_contributions(&mut tx, id).await?;
        let plan = plan_refunds(&contributions)?;
        for contribution_id in &plan.voided {
            db::settle_contribution(&mut tx, *contribution_id, SettlementStatus::Failed).await?;
        }

        let outcome = match decision {
            Finalization::Completed {
                distribution,
                schedule,
            } => {
                let allocations = allocate_tokens(&distribution, &contributions)?;
                for allocation in &allocations {
                    credit_allocation(&mut tx, &campaign, allocation, &schedule, now).await?;
                }
                db::record_finalization(&mut tx, id, version, status, Some(&distribution))
                    .await?;
                info!(
                    "Campaign {id} completed: {} tradeable / {} locked across {} holders",
                    distribution.tradeable_tokens,
                    distribution.locked_tokens,
                    allocations.len()
                );
                FinalizeOutcome::Completed {
                    distribution,
                    schedule,
                    allocations,
                }
            }
            Finalization::Failed => {
                db::record_finalization(&mut tx, id, version, status, None).await?;
                warn!(
                    "Campaign {id} failed: refunding {} USDC to {} contributors",
                    plan.total(),
                    plan.refunds.len()
                );
                FinalizeOutcome::Failed { refunds: plan }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Open or finalize `id` if its window says so. Used by the sweeper.
    pub async fn advance_lifecycle(&self, id: i64, now: Timestamp) -> Result<Advance> {
        let next = {
            let mut tx = self.pool.begin().await?;
            let Versioned { record, version } = load_campaign(&mut tx, id).await?;
            let next = next_lifecycle_status(&record, now, &self.policy)?;
            if record.status == CampaignStatus::Pending && next == CampaignStatus::Fundraising {
                db::update_campaign_status(&mut tx, id, version, next).await?;
                tx.commit().await?;
                info!("Campaign {id} opened for fundraising");
                return Ok(Advance::Opened);
            }
            if record.status != CampaignStatus::Fundraising
                || !compute_fundraising_status(&record, now, &self.policy)?.is_ended
            {
                return Ok(Advance::Unchanged);
            }
            next
        };

        debug!("Campaign {id} window ended, finalizing as {next}");
        let outcome = self.finalize(id, None, now).await?;
        Ok(Advance::Finalized(match outcome {
            FinalizeOutcome::Completed { .. } => CampaignStatus::Completed,
            FinalizeOutcome::Failed { .. } => CampaignStatus::Failed,
        }))
    }

    pub async fn open_campaigns(&self) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        db::open_campaign_ids(&mut conn).await
    }

    // ─────────────────────────────────────────────────────
    // Wallets
    // ─────────────────────────────────────────────────────

    pub async fn wallet_view(&self, id: i64, holder: &str, now: Timestamp) -> Result<WalletView> {
        let mut conn = self.pool.acquire().await?;
        let wallet = load_wallet(&mut conn, id, holder).await?.record;
        let vesting = calculate_vested_amount(&wallet, now)?;
        let transfers = db::get_transfers_for_holder(&mut conn, id, holder).await?;
        Ok(WalletView {
            wallet,
            vesting,
            transfers,
        })
    }

    /// Release the next vesting tranche into the holder's liquid balance.
    pub async fn release(&self, id: i64, holder: &str, now: Timestamp) -> Result<VestingRelease> {
        let mut tx = self.pool.begin().await?;
        let Versioned { record, version } = load_wallet(&mut tx, id, holder).await?;
        let release = release_vested_tokens(&record, now)?;
        db::update_wallet(&mut tx, &release.wallet, version, now).await?;
        db::insert_transfer(&mut tx, &release.transfer, now).await?;
        tx.commit().await?;

        info!(
            "Campaign {id}: released {} to {holder}, {} still locked",
            release.amount, release.wallet.locked_balance
        );
        Ok(release)
    }

    /// Unlock everything still locked once the vesting schedule has ended.
    pub async fn unlock(&self, id: i64, holder: &str, now: Timestamp) -> Result<VestingRelease> {
        let mut tx = self.pool.begin().await?;
        let Versioned { record, version } = load_wallet(&mut tx, id, holder).await?;
        let release = unlock_remaining(&record, now)?;
        db::update_wallet(&mut tx, &release.wallet, version, now).await?;
        db::insert_transfer(&mut tx, &release.transfer, now).await?;
        tx.commit().await?;

        info!("Campaign {id}: unlocked remaining {} for {holder}", release.amount);
        Ok(release)
    }

    pub async fn transfer(
        &self,
        id: i64,
        from: &str,
        to: &str,
        amount: Amount,
        now: Timestamp,
    ) -> Result<TransferOutcome> {
        let mut tx = self.pool.begin().await?;
        let sender = load_wallet(&mut tx, id, from).await?;
        let receiver = db::get_wallet(&mut tx, id, to).await?;
        let receiver_wallet = receiver
            .as_ref()
            .map(|r| r.record.clone())
            .unwrap_or_else(|| TokenWallet::empty(id, to));

        let outcome = transfer_tokens(&sender.record, &receiver_wallet, amount)?;
        db::update_wallet(&mut tx, &outcome.from, sender.version, now).await?;
        match receiver {
            Some(existing) => db::update_wallet(&mut tx, &outcome.to, existing.version, now).await?,
            None => db::insert_wallet(&mut tx, &outcome.to, now).await?,
        }
        db::insert_transfer(&mut tx, &outcome.transfer, now).await?;
        tx.commit().await?;

        debug!("Campaign {id}: {from} sent {amount} to {to}");
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

async fn load_campaign(conn: &mut SqliteConnection, id: i64) -> Result<Versioned<Campaign>> {
    db::get_campaign(conn, id)
        .await?
        .ok_or(ApiError::NotFound("Campaign"))
}

async fn load_wallet(
    conn: &mut SqliteConnection,
    campaign_id: i64,
    holder: &str,
) -> Result<Versioned<TokenWallet>> {
    db::get_wallet(conn, campaign_id, holder)
        .await?
        .ok_or(ApiError::NotFound("Wallet"))
}

/// Credit one contributor's share and attach the vesting schedule.
async fn credit_allocation(
    conn: &mut SqliteConnection,
    campaign: &Campaign,
    allocation: &Allocation,
    schedule: &VestingSchedule,
    now: Timestamp,
) -> Result<()> {
    let existing = db::get_wallet(conn, campaign.id, &allocation.holder).await?;
    let mut wallet = existing
        .as_ref()
        .map(|w| w.record.clone())
        .unwrap_or_else(|| TokenWallet::empty(campaign.id, allocation.holder.clone()));

    wallet.balance = wallet
        .balance
        .checked_add(allocation.tradeable)
        .ok_or(stratafi_core::CoreError::Overflow)?;
    wallet.locked_balance = wallet
        .locked_balance
        .checked_add(allocation.locked)
        .ok_or(stratafi_core::CoreError::Overflow)?;
    wallet.vesting_schedule = Some(schedule.clone());
    wallet.vesting_start = Some(now);
    wallet.vesting_end = Some(schedule.end_date);
    wallet.next_release_at = None;

    match existing {
        Some(w) => db::update_wallet(conn, &wallet, w.version, now).await?,
        None => db::insert_wallet(conn, &wallet, now).await?,
    }

    let distribution = TokenTransfer {
        campaign_id: campaign.id,
        from: campaign.treasury.clone(),
        to: allocation.holder.clone(),
        amount: allocation.tradeable + allocation.locked,
        transfer_type: TransferType::Transfer,
        status: SettlementStatus::Completed,
    };
    db::insert_transfer(conn, &distribution, now).await?;
    Ok(())
}
