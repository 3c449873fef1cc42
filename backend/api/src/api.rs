//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stratafi_core::{Amount, Campaign, CampaignStatus, Contribution};

use crate::errors::{ApiError, Result};
use crate::service::{NewCampaign, Service};

/// Header carrying the caller's wallet address.
pub const CALLER_HEADER: &str = "x-wallet-address";

#[derive(Clone)]
pub struct ApiState {
    pub service: Service,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ContributeRequest {
    pub amount: Amount,
    #[serde(default)]
    pub tx_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to: String,
    pub amount: Amount,
}

#[derive(Serialize)]
pub struct CampaignsResponse {
    pub count: usize,
    pub campaigns: Vec<Campaign>,
}

#[derive(Serialize)]
pub struct ContributionsResponse {
    pub campaign_id: i64,
    pub count: usize,
    pub contributions: Vec<Contribution>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

fn caller(headers: &HeaderMap) -> Result<String> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)
}

/// The caller may only move tokens out of their own wallet.
fn wallet_owner(headers: &HeaderMap, holder: &str) -> Result<String> {
    let caller = caller(headers)?;
    if caller != holder {
        return Err(ApiError::Forbidden("Only the wallet owner can move its tokens"));
    }
    Ok(caller)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /campaigns`
pub async fn create_campaign(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<NewCampaign>,
) -> Result<impl IntoResponse> {
    let creator = caller(&headers)?;
    let campaign = state
        .service
        .create_campaign(&creator, body, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `GET /campaigns?status=`
pub async fn list_campaigns(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let campaigns = state.service.list_campaigns(query.status).await?;
    Ok(Json(CampaignsResponse {
        count: campaigns.len(),
        campaigns,
    }))
}

/// `GET /campaigns/:id`
///
/// Returns the campaign together with its fundraising status as of now.
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.service.campaign_view(id, Utc::now()).await?))
}

/// `POST /campaigns/:id/contributions`
pub async fn contribute(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<ContributeRequest>,
) -> Result<impl IntoResponse> {
    let contributor = caller(&headers)?;
    let contribution = state
        .service
        .contribute(id, &contributor, body.amount, body.tx_ref, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(contribution)))
}

/// `GET /campaigns/:id/contributions`
pub async fn get_contributions(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let contributions = state.service.contributions(id).await?;
    Ok(Json(ContributionsResponse {
        campaign_id: id,
        count: contributions.len(),
        contributions,
    }))
}

/// `POST /campaigns/:id/finalize`
///
/// Creator only. Distributes tokens when the minimum raise was reached,
/// otherwise returns the refunds owed.
pub async fn finalize(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let creator = caller(&headers)?;
    let outcome = state
        .service
        .finalize(id, Some(&creator), Utc::now())
        .await?;
    Ok(Json(outcome))
}

/// `POST /campaigns/:id/activate`
pub async fn activate(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let creator = caller(&headers)?;
    Ok(Json(state.service.activate(id, &creator).await?))
}

/// `GET /campaigns/:id/wallets/:holder`
pub async fn get_wallet(
    State(state): State<Arc<ApiState>>,
    Path((id, holder)): Path<(i64, String)>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.service.wallet_view(id, &holder, Utc::now()).await?))
}

/// `POST /campaigns/:id/wallets/:holder/release`
pub async fn release(
    State(state): State<Arc<ApiState>>,
    Path((id, holder)): Path<(i64, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let holder = wallet_owner(&headers, &holder)?;
    Ok(Json(state.service.release(id, &holder, Utc::now()).await?))
}

/// `POST /campaigns/:id/wallets/:holder/unlock`
pub async fn unlock(
    State(state): State<Arc<ApiState>>,
    Path((id, holder)): Path<(i64, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let holder = wallet_owner(&headers, &holder)?;
    Ok(Json(state.service.unlock(id, &holder, Utc::now()).await?))
}

/// `POST /campaigns/:id/wallets/:holder/transfer`
pub async fn transfer(
    State(state): State<Arc<ApiState>>,
    Path((id, holder)): Path<(i64, String)>,
    headers: HeaderMap,
    Json(body): Json<TransferRequest>,
) -> Result<impl IntoResponse> {
    let holder = wallet_owner(&headers, &holder)?;
    let outcome = state
        .service
        .transfer(id, &holder, body.to.trim(), body.amount, Utc::now())
        .await?;
    Ok(Json(outcome))
}
