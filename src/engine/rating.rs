//! ELO rating model: logistic match update plus cohort-seeded placement ratings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_K_FACTOR: f64 = 32.0;
pub const DEFAULT_PLACEMENT_BASE: f64 = 1000.0;
pub const DEFAULT_PLACEMENT_SEASON_STEP: f64 = 10.0;

/// Expected score of a player rated `rating` against `opponent`.
///
/// `E = 1 / (1 + 10^((opponent - rating) / 400))`
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// Seed ratings for a coach's first-ever match, keyed by (season ordinal, division).
///
/// `seed = base + season_step * (ordinal - 1) + division_bonus`. Unknown divisions get no
/// bonus; negative ordinals are clamped to the first season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementTable {
    pub base: f64,
    pub season_step: f64,
    /// (division name, bonus); matched case-insensitively.
    pub division_bonus: Vec<(String, f64)>,
}

impl PlacementTable {
    pub fn new(base: f64, season_step: f64, division_bonus: Vec<(String, f64)>) -> Self {
        Self {
            base,
            season_step,
            division_bonus,
        }
    }

    pub fn seed(&self, season_ordinal: i32, division_name: &str) -> f64 {
        let seasons_elapsed = f64::from((season_ordinal - 1).max(0));
        self.base + self.season_step * seasons_elapsed + self.bonus_for(division_name)
    }

    fn bonus_for(&self, division_name: &str) -> f64 {
        let name = division_name.trim();
        self.division_bonus
            .iter()
            .find(|(d, _)| d.eq_ignore_ascii_case(name))
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0.0)
    }
}

impl Default for PlacementTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PLACEMENT_BASE,
            DEFAULT_PLACEMENT_SEASON_STEP,
            Vec::new(),
        )
    }
}

/// Fixed-K logistic rating model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingModel {
    pub k_factor: f64,
    pub placement: PlacementTable,
}

impl RatingModel {
    pub fn new(k_factor: f64, placement: PlacementTable) -> Self {
        Self {
            k_factor,
            placement,
        }
    }

    pub fn placement_rating(&self, season_ordinal: i32, division_name: &str) -> f64 {
        self.placement.seed(season_ordinal, division_name)
    }

    /// Returns `(new_winner, new_loser)`. The winner gains exactly what the loser loses.
    pub fn apply_match(&self, winner_rating: f64, loser_rating: f64) -> (f64, f64) {
        let expected = expected_score(winner_rating, loser_rating);
        let delta = self.k_factor * (1.0 - expected);
        (winner_rating + delta, loser_rating - delta)
    }
}

impl Default for RatingModel {
    fn default() -> Self {
        Self::new(DEFAULT_K_FACTOR, PlacementTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn model() -> RatingModel {
        RatingModel::new(
            32.0,
            PlacementTable::new(
                1000.0,
                10.0,
                vec![("Premier".to_string(), 100.0), ("Challenger".to_string(), 50.0)],
            ),
        )
    }

    #[test]
    fn test_equal_ratings_k32() {
        let (w, l) = model().apply_match(1000.0, 1000.0);
        assert!((w - 1016.0).abs() < 1e-9);
        assert!((l - 984.0).abs() < 1e-9);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let m = model();
        let (fav_w, _) = m.apply_match(1200.0, 1000.0);
        let (dog_w, _) = m.apply_match(1000.0, 1200.0);
        assert!(dog_w - 1000.0 > fav_w - 1200.0);
    }

    #[test]
    fn test_expected_score_half_at_parity() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_placement_cohorts() {
        let m = model();
        assert_eq!(m.placement_rating(1, "Entry"), 1000.0);
        assert_eq!(m.placement_rating(1, "premier"), 1100.0);
        assert_eq!(m.placement_rating(3, "Challenger"), 1070.0);
        assert_eq!(m.placement_rating(-4, "Entry"), 1000.0);
    }

    proptest! {
        #[test]
        fn prop_apply_match_is_zero_sum(
            winner in 0.0f64..3000.0,
            loser in 0.0f64..3000.0
        ) {
            let (w, l) = model().apply_match(winner, loser);
            let gain = w - winner;
            let loss = loser - l;
            prop_assert!(gain > 0.0);
            prop_assert!((gain - loss).abs() < 1e-9);
        }

        #[test]
        fn prop_equal_ratings_symmetric(r in 0.0f64..3000.0) {
            let (w, l) = model().apply_match(r, r);
            prop_assert!(((w - r) - (r - l)).abs() < 1e-9);
            prop_assert!(((w - r) - 16.0).abs() < 1e-9);
        }

        #[test]
        fn prop_placement_monotonic_in_season(
            ordinal in 1i32..50,
            later in 0i32..10
        ) {
            let m = model();
            for division in ["Entry", "Challenger", "Premier"] {
                prop_assert!(
                    m.placement_rating(ordinal + later, division)
                        >= m.placement_rating(ordinal, division)
                );
            }
            prop_assert!(m.placement_rating(ordinal, "Premier") >= m.placement_rating(ordinal, "Entry"));
        }
    }
}
