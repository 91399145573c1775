//! Match results supplied by the match-result source.

use crate::domain::{CoachId, DivisionId, MatchId, SeasonEntryId, SeasonId, UnitName, Week};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled or completed match between two season entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub id: MatchId,
    pub season_id: SeasonId,
    pub division_id: DivisionId,
    pub week: Week,
    pub entry1: SeasonEntryId,
    pub entry2: SeasonEntryId,
    /// `None` until the result is known.
    pub winner: Option<SeasonEntryId>,
    pub differential1: i32,
    pub differential2: i32,
    pub replay_url: Option<String>,
    pub played_at: Option<DateTime<Utc>>,
}

impl MatchRecord {
    pub fn is_completed(&self) -> bool {
        self.winner.is_some()
    }

    /// Differential credited to `entry`, if it played this match.
    pub fn differential_for(&self, entry: SeasonEntryId) -> Option<i32> {
        if entry == self.entry1 {
            Some(self.differential1)
        } else if entry == self.entry2 {
            Some(self.differential2)
        } else {
            None
        }
    }
}

/// Which participant of a match won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSide {
    First,
    Second,
}

/// A completed match projected onto coach identities, as consumed by the rating pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedMatch {
    pub match_id: MatchId,
    pub season_ordinal: i32,
    pub division_name: String,
    pub week: Week,
    pub coach1: Option<CoachId>,
    pub coach2: Option<CoachId>,
    pub winner: MatchSide,
    pub played_at: Option<DateTime<Utc>>,
}

impl RatedMatch {
    /// (winner, loser) coach ids when both sides are linked to a coach.
    pub fn winner_and_loser(&self) -> Option<(CoachId, CoachId)> {
        let (c1, c2) = (self.coach1?, self.coach2?);
        Some(match self.winner {
            MatchSide::First => (c1, c2),
            MatchSide::Second => (c2, c1),
        })
    }
}

/// Per-unit kill/death line for one side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitPerformance {
    pub match_id: MatchId,
    pub season_entry_id: SeasonEntryId,
    pub unit: UnitName,
    pub kills: i32,
    pub deaths: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_and_loser_requires_both_coaches() {
        let mut m = RatedMatch {
            match_id: MatchId::new(1),
            season_ordinal: 1,
            division_name: "Premier".to_string(),
            week: Week::new(1),
            coach1: Some(CoachId::new(1)),
            coach2: Some(CoachId::new(2)),
            winner: MatchSide::Second,
            played_at: None,
        };
        assert_eq!(
            m.winner_and_loser(),
            Some((CoachId::new(2), CoachId::new(1)))
        );
        m.coach1 = None;
        assert_eq!(m.winner_and_loser(), None);
    }
}
