use std::collections::HashSet;

use crate::domain::{PriceEntry, UnitName};

/// Free-agent pool: priced, non-banned units not held by an active entry of the season.
///
/// `held` is the set of units rostered by active entries across every division of the
/// season. A season without divisions has nobody to hold anything, so every non-negative
/// price is returned unfiltered. Sorted by price desc, then unit name.
pub fn available_free_agents(
    prices: &[PriceEntry],
    held: &HashSet<UnitName>,
    season_has_divisions: bool,
) -> Vec<PriceEntry> {
    let mut pool: Vec<PriceEntry> = prices
        .iter()
        .filter(|p| !p.is_banned())
        .filter(|p| !season_has_divisions || !held.contains(&p.unit))
        .cloned()
        .collect();

    pool.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.unit.cmp(&b.unit)));
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SeasonId, BANNED_PRICE};

    fn price(unit: &str, price: i64) -> PriceEntry {
        PriceEntry {
            season_id: SeasonId::new(1),
            unit: UnitName::new(unit),
            price,
            tera_banned: false,
            captain_surcharge: None,
            ban_reason: None,
        }
    }

    #[test]
    fn test_held_and_banned_units_removed() {
        let prices = vec![
            price("Zamazenta", BANNED_PRICE),
            price("Garganacl", 14),
            price("Corviknight", 12),
            price("Clodsire", 0),
        ];
        let held: HashSet<UnitName> = [UnitName::new("Corviknight")].into_iter().collect();
        let pool = available_free_agents(&prices, &held, true);
        let units: Vec<&str> = pool.iter().map(|p| p.unit.as_str()).collect();
        assert_eq!(units, vec!["Garganacl", "Clodsire"]);
    }

    #[test]
    fn test_bootstrap_season_without_divisions() {
        let prices = vec![price("Corviknight", 12), price("Zamazenta", BANNED_PRICE)];
        let held: HashSet<UnitName> = [UnitName::new("Corviknight")].into_iter().collect();
        let pool = available_free_agents(&prices, &held, false);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].unit.as_str(), "Corviknight");
    }
}
