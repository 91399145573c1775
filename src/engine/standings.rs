//! Regular-season standings for one division.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::domain::{CoachId, MatchRecord, SeasonEntry, SeasonEntryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingRow {
    pub rank: i64,
    pub season_entry_id: SeasonEntryId,
    pub coach_id: Option<CoachId>,
    pub team_name: String,
    pub team_abbreviation: String,
    pub wins: i64,
    pub losses: i64,
    pub differential: i64,
}

/// Follow `replaced_by` links from `start` to the active entry that now owns its record.
///
/// Returns `None` when the chain ends on an inactive entry or loops.
pub fn resolve_active_successor(
    start: SeasonEntryId,
    entries: &HashMap<SeasonEntryId, &SeasonEntry>,
) -> Option<SeasonEntryId> {
    let mut visited = HashSet::new();
    let mut current = start;
    loop {
        if !visited.insert(current) {
            warn!(entry = %start, "Successor chain loops; record not attributed");
            return None;
        }
        let entry = entries.get(&current)?;
        if entry.is_active {
            return Some(current);
        }
        current = entry.replaced_by?;
    }
}

/// Sum wins, losses and differential per active entry over regular-season matches.
///
/// Results of replaced entries are credited to their active successor. Playoff weeks and
/// matches without a winner are ignored. Sorted by wins desc, differential desc, then
/// team name for a stable order.
pub fn compute_standings(entries: &[SeasonEntry], matches: &[MatchRecord]) -> Vec<StandingRow> {
    let by_id: HashMap<SeasonEntryId, &SeasonEntry> = entries.iter().map(|e| (e.id, e)).collect();

    let mut rows: HashMap<SeasonEntryId, StandingRow> = entries
        .iter()
        .filter(|e| e.is_active)
        .map(|e| {
            (
                e.id,
                StandingRow {
                    rank: 0,
                    season_entry_id: e.id,
                    coach_id: e.coach_id,
                    team_name: e.team_name.clone(),
                    team_abbreviation: e.team_abbreviation.clone(),
                    wins: 0,
                    losses: 0,
                    differential: 0,
                },
            )
        })
        .collect();

    let mut head_cache: HashMap<SeasonEntryId, Option<SeasonEntryId>> = HashMap::new();

    for m in matches
        .iter()
        .filter(|m| m.week.is_regular_season() && m.is_completed())
    {
        for (entry, differential) in [(m.entry1, m.differential1), (m.entry2, m.differential2)] {
            let head = *head_cache
                .entry(entry)
                .or_insert_with(|| resolve_active_successor(entry, &by_id));
            let Some(row) = head.and_then(|h| rows.get_mut(&h)) else {
                continue;
            };
            if m.winner == Some(entry) {
                row.wins += 1;
            } else {
                row.losses += 1;
            }
            row.differential += i64::from(differential);
        }
    }

    let mut standings: Vec<StandingRow> = rows.into_values().collect();
    standings.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then_with(|| b.differential.cmp(&a.differential))
            .then_with(|| a.team_name.cmp(&b.team_name))
            .then_with(|| a.season_entry_id.cmp(&b.season_entry_id))
    });
    for (idx, row) in standings.iter_mut().enumerate() {
        row.rank = (idx + 1) as i64;
    }
    standings
}
