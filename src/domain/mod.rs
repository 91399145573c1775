//! Domain types for the draft league.
//!
//! This module provides:
//! - Entity ids, `Week` and `UnitName` primitives
//! - League structure (seasons, divisions, coaches, season entries)
//! - Roster slots with trade-lock rules and per-season pricing
//! - Ledger transaction records and match records
//! - Stable chronological ordering for rating replay

pub mod league;
pub mod matches;
pub mod ordering;
pub mod pricing;
pub mod primitives;
pub mod roster;
pub mod transaction;

pub use league::{Coach, Division, Season, SeasonEntry};
pub use matches::{MatchRecord, MatchSide, RatedMatch, UnitPerformance};
pub use ordering::MatchOrderingKey;
pub use pricing::{PriceEntry, BANNED_PRICE};
pub use primitives::{
    CoachId, DivisionId, MatchId, Points, SeasonEntryId, SeasonId, SlotId, TransactionId,
    UnitName, Week,
};
pub use roster::{AcquisitionMethod, RosterSlot, DEFAULT_TRADE_LOCK_WEEKS};
pub use transaction::{TradedSlot, Transaction, TransactionDraft, TransactionKind};
