//! Administrative endpoints: league seeding, match results and the rating pass.
//!
//! Every handler checks the admin token first. Match writes hold the rating-pass gate so a
//! concurrent pass never replays a half-written result.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::datasource::{parse_battle_log, ParsedBattle};
use crate::db::{MatchResult, MatchStore, NewMatch, NewSeasonEntry};
use crate::domain::{
    Coach, Division, MatchId, MatchRecord, PriceEntry, RosterSlot, Season, SeasonEntry,
    SeasonEntryId, SeasonId, UnitName, UnitPerformance,
};
use crate::error::AppError;
use crate::ledger::DraftPickParams;
use crate::recompute::PassSummary;

pub async fn recompute_ratings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PassSummary>, AppError> {
    state.require_admin(&headers)?;
    Ok(Json(state.rating_pass.run().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateCoach {
    pub name: String,
}

pub async fn create_coach(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCoach>,
) -> Result<Json<Coach>, AppError> {
    state.require_admin(&headers)?;
    let name = non_blank(&body.name, "name")?;
    Ok(Json(state.repo.create_coach(name).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateSeason {
    pub ordinal: i32,
    pub name: String,
}

pub async fn create_season(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSeason>,
) -> Result<Json<Season>, AppError> {
    state.require_admin(&headers)?;
    let name = non_blank(&body.name, "name")?;
    Ok(Json(state.repo.create_season(body.ordinal, name).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDivision {
    pub season_id: SeasonId,
    pub name: String,
}

pub async fn create_division(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateDivision>,
) -> Result<Json<Division>, AppError> {
    state.require_admin(&headers)?;
    let name = non_blank(&body.name, "name")?;
    Ok(Json(state.repo.create_division(body.season_id, name).await?))
}

pub async fn create_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewSeasonEntry>,
) -> Result<Json<SeasonEntry>, AppError> {
    state.require_admin(&headers)?;
    non_blank(&body.team_name, "teamName")?;
    if body.budget < 0 {
        return Err(AppError::BadRequest("budget must not be negative".to_string()));
    }
    Ok(Json(state.repo.create_entry(&body).await?))
}

pub async fn replace_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<NewSeasonEntry>,
) -> Result<Json<SeasonEntry>, AppError> {
    state.require_admin(&headers)?;
    non_blank(&body.team_name, "teamName")?;
    let successor = state
        .repo
        .replace_entry(SeasonEntryId::new(id), &body)
        .await?;
    Ok(Json(successor))
}

pub async fn upsert_price(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PriceEntry>,
) -> Result<Json<PriceEntry>, AppError> {
    state.require_admin(&headers)?;
    non_blank(body.unit.as_str(), "unit")?;
    state.repo.upsert_price(&body).await?;
    Ok(Json(body))
}

pub async fn draft_pick(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DraftPickParams>,
) -> Result<Json<RosterSlot>, AppError> {
    state.require_admin(&headers)?;
    Ok(Json(state.ledger.draft_pick(body).await?))
}

pub async fn create_match(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewMatch>,
) -> Result<Json<MatchRecord>, AppError> {
    state.require_admin(&headers)?;
    let _gate = state.rating_pass.exclusive().await;
    Ok(Json(state.repo.insert_match(&body).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceLine {
    pub season_entry_id: SeasonEntryId,
    pub unit: UnitName,
    #[serde(default)]
    pub kills: i32,
    #[serde(default)]
    pub deaths: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResult {
    pub winner: SeasonEntryId,
    #[serde(default)]
    pub differential1: i32,
    #[serde(default)]
    pub differential2: i32,
    pub replay_url: Option<String>,
    pub played_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub performances: Vec<PerformanceLine>,
}

pub async fn record_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RecordResult>,
) -> Result<Json<MatchRecord>, AppError> {
    state.require_admin(&headers)?;
    let record = scheduled_match(&state, MatchId::new(id)).await?;

    let mut performances = Vec::with_capacity(body.performances.len());
    for line in body.performances {
        if line.season_entry_id != record.entry1 && line.season_entry_id != record.entry2 {
            return Err(AppError::BadRequest(format!(
                "entry {} did not play match {}",
                line.season_entry_id, record.id
            )));
        }
        performances.push(UnitPerformance {
            match_id: record.id,
            season_entry_id: line.season_entry_id,
            unit: line.unit,
            kills: line.kills,
            deaths: line.deaths,
        });
    }

    let result = MatchResult {
        winner: body.winner,
        differential1: body.differential1,
        differential2: body.differential2,
        replay_url: body.replay_url,
        played_at: body.played_at,
        performances,
    };

    let _gate = state.rating_pass.exclusive().await;
    Ok(Json(state.repo.record_match_result(record.id, &result).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReplay {
    pub replay_url: String,
    /// Set when the log's p1 played as the match's second entry.
    #[serde(default)]
    pub swap_sides: bool,
    pub played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedReplay {
    #[serde(rename = "match")]
    pub match_record: MatchRecord,
    pub battle: ParsedBattle,
}

/// Fetch a battle log, parse it and settle the match with its result.
pub async fn ingest_replay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<IngestReplay>,
) -> Result<Json<IngestedReplay>, AppError> {
    state.require_admin(&headers)?;
    let url = non_blank(&body.replay_url, "replayUrl")?.to_string();
    let record = scheduled_match(&state, MatchId::new(id)).await?;

    let log = state.replays.fetch_log(&url).await?;
    let battle = parse_battle_log(&log)?;
    let mut result = battle
        .clone()
        .into_result(&record, Some(url), body.swap_sides)?;
    result.played_at = body.played_at;

    let _gate = state.rating_pass.exclusive().await;
    let settled = state.repo.record_match_result(record.id, &result).await?;
    info!(
        match_id = %settled.id,
        winner = ?settled.winner,
        units = result.performances.len(),
        "Replay ingested"
    );

    Ok(Json(IngestedReplay {
        match_record: settled,
        battle,
    }))
}

async fn scheduled_match(state: &AppState, id: MatchId) -> Result<MatchRecord, AppError> {
    state
        .repo
        .get_match(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("match {}", id)))
}

fn non_blank<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::BadRequest(format!("{} must not be empty", field)))
    } else {
        Ok(trimmed)
    }
}
