//! Chronological match ordering for deterministic replay.

use crate::domain::RatedMatch;

/// Stable ordering key for matches.
///
/// Ordering: season ordinal -> week -> match id. Raw ids alone are not chronological
/// because seasons and matches may be entered out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchOrderingKey {
    pub season_ordinal: i32,
    pub week: i32,
    pub match_id: i64,
}

impl MatchOrderingKey {
    pub fn from_match(m: &RatedMatch) -> Self {
        MatchOrderingKey {
            season_ordinal: m.season_ordinal,
            week: m.week.as_i32(),
            match_id: m.match_id.as_i64(),
        }
    }
}

/// Sort matches chronologically.
pub fn sort_matches_chronological(matches: &mut [RatedMatch]) {
    matches.sort_by_key(MatchOrderingKey::from_match);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CoachId, MatchId, MatchSide, Week};

    fn make_match(id: i64, season_ordinal: i32, week: i32) -> RatedMatch {
        RatedMatch {
            match_id: MatchId::new(id),
            season_ordinal,
            division_name: "Premier".to_string(),
            week: Week::new(week),
            coach1: Some(CoachId::new(1)),
            coach2: Some(CoachId::new(2)),
            winner: MatchSide::First,
            played_at: None,
        }
    }

    #[test]
    fn test_season_ordinal_beats_match_id() {
        let mut matches = vec![make_match(1, 2, 1), make_match(50, 1, 9)];
        sort_matches_chronological(&mut matches);
        assert_eq!(matches[0].match_id, MatchId::new(50));
        assert_eq!(matches[1].match_id, MatchId::new(1));
    }

    #[test]
    fn test_week_then_id() {
        let mut matches = vec![
            make_match(7, 1, 3),
            make_match(5, 1, 3),
            make_match(9, 1, 2),
            make_match(1, 1, 102),
        ];
        sort_matches_chronological(&mut matches);
        let ids: Vec<i64> = matches.iter().map(|m| m.match_id.as_i64()).collect();
        assert_eq!(ids, vec![9, 5, 7, 1]);
    }
}
