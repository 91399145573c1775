pub mod admin;
pub mod health;
pub mod league;
pub mod ledger;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::datasource::ReplaySource;
use crate::db::Repository;
use crate::error::AppError;
use crate::ledger::Ledger;
use crate::recompute::RatingPass;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ledger: Ledger,
    pub rating_pass: RatingPass,
    pub replays: Arc<dyn ReplaySource>,
}

impl AppState {
    /// Wire the ledger and rating pass over `repo`.
    pub fn new(repo: Arc<Repository>, config: Config, replays: Arc<dyn ReplaySource>) -> Self {
        let ledger = Ledger::new(repo.clone(), config.ledger_config());
        let rating_pass = RatingPass::new(repo.clone(), config.rating_model());
        Self {
            repo,
            config,
            ledger,
            rating_pass,
            replays,
        }
    }

    /// Admin routes are open when no token is configured.
    pub fn require_admin(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let Some(expected) = self.config.admin_token.as_deref() else {
            return Ok(());
        };
        match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            Some(given) if given == expected => Ok(()),
            Some(_) => Err(AppError::Unauthorized("invalid admin token".to_string())),
            None => Err(AppError::Unauthorized(format!(
                "missing {} header",
                ADMIN_TOKEN_HEADER
            ))),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        // Ledger
        .route("/v1/ledger/pickup", post(ledger::pickup))
        .route("/v1/ledger/drop", post(ledger::drop_unit))
        .route("/v1/ledger/swap", post(ledger::swap))
        .route("/v1/ledger/trade", post(ledger::trade))
        .route("/v1/ledger/tera-swap", post(ledger::tera_swap))
        .route(
            "/v1/ledger/transactions/:id/undo",
            post(ledger::undo_transaction),
        )
        .route("/v1/entries/:id/quota", get(ledger::get_quota))
        .route("/v1/entries/:id/transactions", get(ledger::get_transactions))
        .route("/v1/entries/:id/roster", get(ledger::get_roster))
        // League views
        .route("/v1/seasons/:id/free-agents", get(league::get_free_agents))
        .route("/v1/seasons/:id/prices/:unit", get(league::get_price))
        .route("/v1/seasons/:id/standings", get(league::get_season_standings))
        .route(
            "/v1/divisions/:id/standings",
            get(league::get_division_standings),
        )
        .route("/v1/leaderboard/ratings", get(league::get_rating_leaderboard))
        .route(
            "/v1/seasons/:id/leaderboard/units",
            get(league::get_unit_leaderboard),
        )
        .route(
            "/v1/coaches/:id/rating-history",
            get(league::get_rating_history),
        )
        // Administration
        .route("/v1/ratings/recompute", post(admin::recompute_ratings))
        .route("/v1/admin/coaches", post(admin::create_coach))
        .route("/v1/admin/seasons", post(admin::create_season))
        .route("/v1/admin/divisions", post(admin::create_division))
        .route("/v1/admin/entries", post(admin::create_entry))
        .route("/v1/admin/entries/:id/replace", post(admin::replace_entry))
        .route("/v1/admin/prices", post(admin::upsert_price))
        .route("/v1/admin/draft-picks", post(admin::draft_pick))
        .route("/v1/admin/matches", post(admin::create_match))
        .route("/v1/admin/matches/:id/result", post(admin::record_result))
        .route("/v1/admin/matches/:id/replay", post(admin::ingest_replay))
        .layer(cors)
        .with_state(state)
}
