//! Read-only league views: free agents, prices, standings, leaderboards, rating history.

use axum::extract::{Path, State};
use axum::Json;
use futures::future::try_join_all;
use serde::Serialize;

use crate::api::AppState;
use crate::db::{CoachStore, MatchStore, RatingStore, SeasonStore};
use crate::domain::{CoachId, DivisionId, PriceEntry, SeasonId, UnitName};
use crate::engine::{
    compute_standings, rating_leaderboard, unit_leaderboard, RatingHistoryEntry,
    RatingLeaderboardEntry, StandingRow, UnitLeaderboardEntry,
};
use crate::error::AppError;

pub async fn get_free_agents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PriceEntry>>, AppError> {
    Ok(Json(state.ledger.free_agents(SeasonId::new(id)).await?))
}

pub async fn get_price(
    State(state): State<AppState>,
    Path((id, unit)): Path<(i64, String)>,
) -> Result<Json<PriceEntry>, AppError> {
    let price = state
        .ledger
        .season_price(SeasonId::new(id), &UnitName::new(unit))
        .await?;
    Ok(Json(price))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionStandings {
    pub division_id: DivisionId,
    pub name: String,
    pub standings: Vec<StandingRow>,
}

async fn division_standings(
    state: &AppState,
    division: DivisionId,
) -> Result<Vec<StandingRow>, AppError> {
    let entries = state.repo.list_entries_in_division(division).await?;
    let matches = state.repo.list_division_matches(division).await?;
    Ok(compute_standings(&entries, &matches))
}

pub async fn get_division_standings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DivisionStandings>, AppError> {
    let division = state
        .repo
        .get_division(DivisionId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("division {}", id)))?;
    let standings = division_standings(&state, division.id).await?;
    Ok(Json(DivisionStandings {
        division_id: division.id,
        name: division.name,
        standings,
    }))
}

pub async fn get_season_standings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DivisionStandings>>, AppError> {
    let season = state
        .repo
        .get_season(SeasonId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("season {}", id)))?;
    let divisions = state.repo.list_divisions(season.id).await?;

    let tables = try_join_all(divisions.into_iter().map(|division| {
        let state = &state;
        async move {
            let standings = division_standings(state, division.id).await?;
            Ok::<_, AppError>(DivisionStandings {
                division_id: division.id,
                name: division.name,
                standings,
            })
        }
    }))
    .await?;
    Ok(Json(tables))
}

pub async fn get_rating_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<RatingLeaderboardEntry>>, AppError> {
    let coaches = state.repo.list_coaches().await?;
    Ok(Json(rating_leaderboard(&coaches)))
}

pub async fn get_unit_leaderboard(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UnitLeaderboardEntry>>, AppError> {
    let season = state
        .repo
        .get_season(SeasonId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("season {}", id)))?;
    let performances = state.repo.list_unit_performances(season.id).await?;
    Ok(Json(unit_leaderboard(&performances)))
}

pub async fn get_rating_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<RatingHistoryEntry>>, AppError> {
    let coach = state
        .repo
        .get_coach(CoachId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("coach {}", id)))?;
    Ok(Json(state.repo.rating_history(coach.id).await?))
}
