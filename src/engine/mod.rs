//! Pure computation engine(s) for ratings, standings and roster accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CoachId, MatchId};

pub mod availability;
pub mod leaderboard;
pub mod quota;
pub mod rating;
pub mod replay;
pub mod standings;

pub use availability::available_free_agents;
pub use leaderboard::{rating_leaderboard, unit_leaderboard, RatingLeaderboardEntry, UnitLeaderboardEntry};
pub use quota::{compute_quota, QuotaLimits, QuotaUsage};
pub use rating::{expected_score, PlacementTable, RatingModel};
pub use replay::{RatingReplayer, ReplayOutcome, SkipReason, SkippedMatch};
pub use standings::{compute_standings, StandingRow};

/// A coach's rating after one completed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingHistoryEntry {
    pub coach_id: CoachId,
    pub rating: f64,
    pub match_id: Option<MatchId>,
    pub recorded_at: DateTime<Utc>,
}
