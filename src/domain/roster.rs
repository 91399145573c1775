//! Roster slots and the post-acquisition trade lock.

use crate::domain::{Points, SeasonEntryId, SlotId, TransactionId, UnitName, Week};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weeks a non-drafted unit stays locked after it was acquired.
pub const DEFAULT_TRADE_LOCK_WEEKS: i32 = 2;

/// How a roster slot came to be owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionMethod {
    Draft,
    FaPickup,
    P2pTrade,
}

impl AcquisitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMethod::Draft => "DRAFT",
            AcquisitionMethod::FaPickup => "FA_PICKUP",
            AcquisitionMethod::P2pTrade => "P2P_TRADE",
        }
    }
}

impl fmt::Display for AcquisitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(AcquisitionMethod::Draft),
            "FA_PICKUP" => Ok(AcquisitionMethod::FaPickup),
            "P2P_TRADE" => Ok(AcquisitionMethod::P2pTrade),
            other => Err(format!("unknown acquisition method: {}", other)),
        }
    }
}

/// Ownership of one priced unit by one season entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSlot {
    pub id: SlotId,
    pub season_entry_id: SeasonEntryId,
    pub unit: UnitName,
    /// Price paid, captain surcharge included.
    pub price: Points,
    pub is_tera_captain: bool,
    /// Acquisition metadata; all `None` on draft-era rows.
    pub acquired_week: Option<Week>,
    pub acquired_via: Option<AcquisitionMethod>,
    pub acquired_transaction_id: Option<TransactionId>,
}

impl RosterSlot {
    /// Acquisition method, treating rows without metadata as drafted.
    pub fn acquisition_method(&self) -> AcquisitionMethod {
        self.acquired_via.unwrap_or(AcquisitionMethod::Draft)
    }

    /// Whether the slot is still inside its post-acquisition window at `current_week`.
    pub fn is_trade_locked(&self, current_week: Week, lock_weeks: i32) -> bool {
        if self.acquisition_method() == AcquisitionMethod::Draft {
            return false;
        }
        match self.acquired_week {
            Some(acquired) => current_week < acquired.plus(lock_weeks),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(via: Option<AcquisitionMethod>, week: Option<i32>) -> RosterSlot {
        RosterSlot {
            id: SlotId::new(1),
            season_entry_id: SeasonEntryId::new(1),
            unit: UnitName::new("Kingambit"),
            price: 10,
            is_tera_captain: false,
            acquired_week: week.map(Week::new),
            acquired_via: via,
            acquired_transaction_id: None,
        }
    }

    #[test]
    fn test_pickup_locked_for_two_weeks() {
        let s = slot(Some(AcquisitionMethod::FaPickup), Some(3));
        assert!(s.is_trade_locked(Week::new(3), DEFAULT_TRADE_LOCK_WEEKS));
        assert!(s.is_trade_locked(Week::new(4), DEFAULT_TRADE_LOCK_WEEKS));
        assert!(!s.is_trade_locked(Week::new(5), DEFAULT_TRADE_LOCK_WEEKS));
    }

    #[test]
    fn test_trade_acquisition_also_locked() {
        let s = slot(Some(AcquisitionMethod::P2pTrade), Some(6));
        assert!(s.is_trade_locked(Week::new(7), DEFAULT_TRADE_LOCK_WEEKS));
        assert!(!s.is_trade_locked(Week::new(8), DEFAULT_TRADE_LOCK_WEEKS));
    }

    #[test]
    fn test_draft_never_locked() {
        let s = slot(Some(AcquisitionMethod::Draft), Some(1));
        assert!(!s.is_trade_locked(Week::new(1), DEFAULT_TRADE_LOCK_WEEKS));
        let legacy = slot(None, None);
        assert!(!legacy.is_trade_locked(Week::new(0), DEFAULT_TRADE_LOCK_WEEKS));
    }

    #[test]
    fn test_acquisition_method_roundtrip_str() {
        for m in [
            AcquisitionMethod::Draft,
            AcquisitionMethod::FaPickup,
            AcquisitionMethod::P2pTrade,
        ] {
            assert_eq!(m.as_str().parse::<AcquisitionMethod>().unwrap(), m);
        }
        assert!("WAIVER".parse::<AcquisitionMethod>().is_err());
    }
}
