//! Per-season unit pricing.

use crate::domain::{Points, SeasonId, UnitName};
use serde::{Deserialize, Serialize};

/// Price sentinel for banned / complex-ban units.
pub const BANNED_PRICE: Points = -1;

/// Price of one unit in one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub season_id: SeasonId,
    pub unit: UnitName,
    /// Base price; [`BANNED_PRICE`] means not draftable.
    pub price: Points,
    pub tera_banned: bool,
    pub captain_surcharge: Option<Points>,
    pub ban_reason: Option<String>,
}

impl PriceEntry {
    pub fn is_banned(&self) -> bool {
        self.price < 0
    }

    /// Cost to acquire this unit, with the captain surcharge when `as_captain` is set.
    pub fn acquisition_cost(&self, as_captain: bool) -> Points {
        if as_captain {
            self.price + self.captain_surcharge.unwrap_or(0)
        } else {
            self.price
        }
    }

    pub fn surcharge(&self) -> Points {
        self.captain_surcharge.unwrap_or(0)
    }
}
