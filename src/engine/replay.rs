use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::ordering::sort_matches_chronological;
use crate::domain::{CoachId, MatchId, RatedMatch};

use super::rating::RatingModel;
use super::RatingHistoryEntry;

/// Why a match was left out of the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// One side has no coach linkage.
    MissingCoach,
    /// Both sides resolve to the same coach.
    SameCoach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedMatch {
    pub match_id: MatchId,
    pub reason: SkipReason,
}

/// Result of replaying a full match history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayOutcome {
    pub history: Vec<RatingHistoryEntry>,
    /// Final rating of every coach that played at least one rated match.
    pub final_ratings: BTreeMap<CoachId, f64>,
    pub skipped: Vec<SkippedMatch>,
    pub matches_applied: usize,
}

/// Walks matches in order, placing coaches lazily and applying the rating model.
///
/// The rating map lives only as long as the replayer, so every replay starts from an
/// all-unplaced state.
pub struct RatingReplayer<'a> {
    model: &'a RatingModel,
    fallback_time: DateTime<Utc>,
    current: HashMap<CoachId, f64>,
    history: Vec<RatingHistoryEntry>,
    skipped: Vec<SkippedMatch>,
    matches_applied: usize,
}

impl<'a> RatingReplayer<'a> {
    /// `fallback_time` stamps history rows of matches with no recorded play time.
    pub fn new(model: &'a RatingModel, fallback_time: DateTime<Utc>) -> Self {
        Self {
            model,
            fallback_time,
            current: HashMap::new(),
            history: Vec::new(),
            skipped: Vec::new(),
            matches_applied: 0,
        }
    }

    /// Sort `matches` chronologically and replay all of them.
    pub fn replay(
        model: &RatingModel,
        mut matches: Vec<RatedMatch>,
        fallback_time: DateTime<Utc>,
    ) -> ReplayOutcome {
        sort_matches_chronological(&mut matches);
        let mut replayer = RatingReplayer::new(model, fallback_time);
        for m in &matches {
            replayer.process_match(m);
        }
        replayer.into_outcome()
    }

    /// Apply a single match. Callers must feed matches in chronological order.
    pub fn process_match(&mut self, m: &RatedMatch) {
        let Some((winner, loser)) = m.winner_and_loser() else {
            warn!(match_id = %m.match_id, "Skipping match without coach linkage");
            self.skipped.push(SkippedMatch {
                match_id: m.match_id,
                reason: SkipReason::MissingCoach,
            });
            return;
        };

        if winner == loser {
            warn!(match_id = %m.match_id, coach = %winner, "Skipping match with the same coach on both sides");
            self.skipped.push(SkippedMatch {
                match_id: m.match_id,
                reason: SkipReason::SameCoach,
            });
            return;
        }

        let winner_rating = self.current_or_place(winner, m);
        let loser_rating = self.current_or_place(loser, m);
        let (new_winner, new_loser) = self.model.apply_match(winner_rating, loser_rating);

        debug!(
            match_id = %m.match_id,
            winner = %winner,
            loser = %loser,
            winner_rating = new_winner,
            loser_rating = new_loser,
            "Applied match"
        );

        self.current.insert(winner, new_winner);
        self.current.insert(loser, new_loser);

        let recorded_at = m.played_at.unwrap_or(self.fallback_time);
        for (coach_id, rating) in [(winner, new_winner), (loser, new_loser)] {
            self.history.push(RatingHistoryEntry {
                coach_id,
                rating,
                match_id: Some(m.match_id),
                recorded_at,
            });
        }
        self.matches_applied += 1;
    }

    fn current_or_place(&mut self, coach: CoachId, m: &RatedMatch) -> f64 {
        *self.current.entry(coach).or_insert_with(|| {
            let seed = self
                .model
                .placement_rating(m.season_ordinal, &m.division_name);
            debug!(coach = %coach, seed, season = m.season_ordinal, division = %m.division_name, "Placed coach");
            seed
        })
    }

    pub fn current_rating(&self, coach: CoachId) -> Option<f64> {
        self.current.get(&coach).copied()
    }

    pub fn history(&self) -> &[RatingHistoryEntry] {
        &self.history
    }

    pub fn into_outcome(self) -> ReplayOutcome {
        ReplayOutcome {
            history: self.history,
            final_ratings: self.current.into_iter().collect(),
            skipped: self.skipped,
            matches_applied: self.matches_applied,
        }
    }
}
