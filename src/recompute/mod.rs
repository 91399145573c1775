//! Rating recomputation pass.
//!
//! This module provides:
//! - `RatingPass`: full rebuild of rating history and current ratings from match results
//! - A process-wide gate that serializes the pass with match-result writes
//!
//! The pass is idempotent: it discards prior history and replays every completed match
//! from an all-unplaced state.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::db::{LeagueStore, StoreError};
use crate::domain::MatchId;
use crate::engine::{RatingModel, RatingReplayer, SkipReason};

#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub matches_seen: usize,
    pub matches_applied: usize,
    pub skipped_missing_coach: Vec<MatchId>,
    pub skipped_same_coach: Vec<MatchId>,
    pub history_rows: usize,
    pub coaches_rated: usize,
}

/// Recomputes every coach rating from the complete match history.
#[derive(Clone)]
pub struct RatingPass {
    store: Arc<dyn LeagueStore>,
    model: RatingModel,
    gate: Arc<Mutex<()>>,
}

impl RatingPass {
    pub fn new(store: Arc<dyn LeagueStore>, model: RatingModel) -> Self {
        Self {
            store,
            model,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn model(&self) -> &RatingModel {
        &self.model
    }

    /// Hold this while writing match results so no pass observes a half-written result.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Run the pass to completion.
    ///
    /// Matches without coach linkage on both sides are skipped with a warning; coaches who
    /// never played keep their stored rating.
    ///
    /// # Errors
    ///
    /// Returns `PassError::Store` if reading matches or writing history fails. History is
    /// replaced atomically, so a failed pass leaves the previous history in place.
    pub async fn run(&self) -> Result<PassSummary, PassError> {
        let _guard = self.gate.lock().await;

        let matches = self.store.list_rated_matches().await?;
        let matches_seen = matches.len();

        let outcome = RatingReplayer::replay(&self.model, matches, Utc::now());
        self.store
            .replace_rating_history(&outcome.history, &outcome.final_ratings)
            .await?;

        let mut skipped_missing_coach = Vec::new();
        let mut skipped_same_coach = Vec::new();
        for skipped in &outcome.skipped {
            match skipped.reason {
                SkipReason::MissingCoach => skipped_missing_coach.push(skipped.match_id),
                SkipReason::SameCoach => skipped_same_coach.push(skipped.match_id),
            }
        }

        let summary = PassSummary {
            matches_seen,
            matches_applied: outcome.matches_applied,
            skipped_missing_coach,
            skipped_same_coach,
            history_rows: outcome.history.len(),
            coaches_rated: outcome.final_ratings.len(),
        };

        info!(
            matches_seen = summary.matches_seen,
            matches_applied = summary.matches_applied,
            skipped = outcome.skipped.len(),
            coaches_rated = summary.coaches_rated,
            "Rating pass complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CoachStore, MemoryStore, NewMatch, NewSeasonEntry, RatingStore};
    use crate::domain::{Coach, DivisionId, SeasonEntryId, Week};
    use crate::engine::rating::PlacementTable;

    fn entry(store: &MemoryStore, coach: Option<&Coach>, division: DivisionId) -> SeasonEntryId {
        store
            .add_entry(&NewSeasonEntry {
                coach_id: coach.map(|c| c.id),
                division_id: division,
                team_name: "Team".to_string(),
                team_abbreviation: "T".to_string(),
                budget: 100,
            })
            .id
    }

    fn result(division: DivisionId, week: i32, winner: SeasonEntryId, loser: SeasonEntryId) -> NewMatch {
        NewMatch {
            division_id: division,
            week: Week::new(week),
            entry1: winner,
            entry2: loser,
            winner: Some(winner),
            differential1: 2,
            differential2: -2,
            replay_url: None,
            played_at: None,
        }
    }

    fn pass(store: Arc<MemoryStore>) -> RatingPass {
        RatingPass::new(store, RatingModel::new(32.0, PlacementTable::default()))
    }

    #[tokio::test]
    async fn test_first_match_from_equal_placement() {
        let store = Arc::new(MemoryStore::new());
        let season = store.add_season(1, "Season 1");
        let division = store.add_division(season.id, "Premier");
        let ash = store.add_coach("ash");
        let gary = store.add_coach("gary");
        let idle = store.add_coach("idle");
        let a = entry(&store, Some(&ash), division.id);
        let g = entry(&store, Some(&gary), division.id);
        store.add_match(&result(division.id, 1, a, g)).unwrap();

        let summary = pass(store.clone()).run().await.unwrap();
        assert_eq!(summary.matches_applied, 1);
        assert_eq!(summary.history_rows, 2);

        let ash_rating = store.get_coach(ash.id).await.unwrap().unwrap().rating;
        let gary_rating = store.get_coach(gary.id).await.unwrap().unwrap().rating;
        assert_eq!(ash_rating, Some(1016.0));
        assert_eq!(gary_rating, Some(984.0));
        assert_eq!(store.get_coach(idle.id).await.unwrap().unwrap().rating, None);
    }

    #[tokio::test]
    async fn test_pass_is_idempotent_and_skips_unlinked() {
        let store = Arc::new(MemoryStore::new());
        let season = store.add_season(1, "Season 1");
        let division = store.add_division(season.id, "Premier");
        let coaches: Vec<Coach> = ["a", "b", "c"].iter().map(|n| store.add_coach(n)).collect();
        let e: Vec<SeasonEntryId> = coaches
            .iter()
            .map(|c| entry(&store, Some(c), division.id))
            .collect();
        let orphan = entry(&store, None, division.id);

        store.add_match(&result(division.id, 1, e[0], e[1])).unwrap();
        store.add_match(&result(division.id, 2, e[2], e[0])).unwrap();
        let skipped = store.add_match(&result(division.id, 3, orphan, e[1])).unwrap();

        let rating_pass = pass(store.clone());
        let first = rating_pass.run().await.unwrap();
        let ratings_first: Vec<Option<f64>> = store
            .list_coaches()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.rating)
            .collect();
        let second = rating_pass.run().await.unwrap();
        let ratings_second: Vec<Option<f64>> = store
            .list_coaches()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.rating)
            .collect();

        assert_eq!(first, second);
        assert_eq!(ratings_first, ratings_second);
        assert_eq!(first.skipped_missing_coach, vec![skipped.id]);
        assert_eq!(store.rating_history(coaches[0].id).await.unwrap().len(), 2);
    }
}
