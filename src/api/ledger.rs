//! Roster ledger endpoints.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::domain::{SeasonEntryId, Transaction, TransactionId, Week};
use crate::engine::QuotaUsage;
use crate::error::AppError;
use crate::ledger::{
    DropParams, PickupParams, RosterView, SwapParams, TeraSwapParams, TradeParams,
};

pub async fn pickup(
    State(state): State<AppState>,
    Json(params): Json<PickupParams>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.ledger.fa_pickup(params).await?))
}

pub async fn drop_unit(
    State(state): State<AppState>,
    Json(params): Json<DropParams>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.ledger.fa_drop(params).await?))
}

pub async fn swap(
    State(state): State<AppState>,
    Json(params): Json<SwapParams>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.ledger.fa_swap(params).await?))
}

pub async fn trade(
    State(state): State<AppState>,
    Json(params): Json<TradeParams>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.ledger.p2p_trade(params).await?))
}

pub async fn tera_swap(
    State(state): State<AppState>,
    Json(params): Json<TeraSwapParams>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.ledger.tera_swap(params).await?))
}

pub async fn undo_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.require_admin(&headers)?;
    let undone = state.ledger.undo(TransactionId::new(id)).await?;
    Ok(Json(json!({ "undone": undone.id })))
}

pub async fn get_quota(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QuotaUsage>, AppError> {
    Ok(Json(state.ledger.quota(SeasonEntryId::new(id)).await?))
}

pub async fn get_transactions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.ledger.transactions(SeasonEntryId::new(id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct RosterQuery {
    pub week: Option<i32>,
}

/// Lock state depends on the current week, so `week` is required.
pub async fn get_roster(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<RosterQuery>,
) -> Result<Json<Vec<RosterView>>, AppError> {
    let week = params
        .week
        .map(Week::new)
        .ok_or_else(|| AppError::BadRequest("week query parameter is required".to_string()))?;
    Ok(Json(state.ledger.roster(SeasonEntryId::new(id), week).await?))
}
