//! Rating and unit leaderboards.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::{Coach, CoachId, UnitName, UnitPerformance};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingLeaderboardEntry {
    pub rank: i64,
    pub coach_id: CoachId,
    pub name: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitLeaderboardEntry {
    pub rank: i64,
    pub unit: UnitName,
    pub kills: i64,
    pub deaths: i64,
    pub games: i64,
}

/// Rated coaches by rating desc, name asc. Unrated coaches are left out.
pub fn rating_leaderboard(coaches: &[Coach]) -> Vec<RatingLeaderboardEntry> {
    let mut rated: Vec<(&Coach, f64)> = coaches
        .iter()
        .filter_map(|c| c.rating.map(|r| (c, r)))
        .collect();

    rated.sort_by(|(a, ra), (b, rb)| {
        rb.total_cmp(ra)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });

    rated
        .into_iter()
        .enumerate()
        .map(|(idx, (coach, rating))| RatingLeaderboardEntry {
            rank: (idx + 1) as i64,
            coach_id: coach.id,
            name: coach.name.clone(),
            rating,
        })
        .collect()
}

/// Per-unit totals by kills desc, deaths asc, unit name asc.
pub fn unit_leaderboard(performances: &[UnitPerformance]) -> Vec<UnitLeaderboardEntry> {
    let mut totals: HashMap<&UnitName, (i64, i64, i64)> = HashMap::new();
    for p in performances {
        let t = totals.entry(&p.unit).or_default();
        t.0 += i64::from(p.kills);
        t.1 += i64::from(p.deaths);
        t.2 += 1;
    }

    let mut rows: Vec<UnitLeaderboardEntry> = totals
        .into_iter()
        .map(|(unit, (kills, deaths, games))| UnitLeaderboardEntry {
            rank: 0,
            unit: unit.clone(),
            kills,
            deaths,
            games,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.kills
            .cmp(&a.kills)
            .then_with(|| a.deaths.cmp(&b.deaths))
            .then_with(|| a.unit.cmp(&b.unit))
    });
    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = (idx + 1) as i64;
    }
    rows
}
