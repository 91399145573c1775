//! League structure: seasons, divisions, coaches and their season entries.

use crate::domain::{CoachId, DivisionId, Points, SeasonEntryId, SeasonId};
use serde::{Deserialize, Serialize};

/// A league season. `ordinal` gives chronological order independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: SeasonId,
    pub ordinal: i32,
    pub name: String,
}

/// A division (tier) within one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Division {
    pub id: DivisionId,
    pub season_id: SeasonId,
    pub name: String,
}

/// A league participant with a persistent skill rating.
///
/// `rating` is `None` until the coach's first rated match has been replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coach {
    pub id: CoachId,
    pub name: String,
    pub rating: Option<f64>,
}

/// A coach's roster/budget context within one division of one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonEntry {
    pub id: SeasonEntryId,
    /// Absent on legacy rows that were never linked to a coach.
    pub coach_id: Option<CoachId>,
    pub division_id: DivisionId,
    pub team_name: String,
    pub team_abbreviation: String,
    pub remaining_budget: Points,
    pub is_active: bool,
    /// Successor after a mid-season coach change.
    pub replaced_by: Option<SeasonEntryId>,
}

impl SeasonEntry {
    pub fn can_afford(&self, cost: Points) -> bool {
        self.remaining_budget >= cost
    }
}
