//! Narrow per-entity storage contracts.
//!
//! The ledger, the rating pass and the read-side aggregations depend only on these traits.
//! `Repository` implements them over SQLite, `MemoryStore` in memory for tests.
//!
//! All ledger mutations go through [`LedgerWriter::apply`], which executes one
//! [`UnitOfWork`] atomically: ownership and budget guards are re-checked at write time, and
//! any guard miss aborts the whole unit without partial writes.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AcquisitionMethod, Coach, CoachId, Division, DivisionId, MatchId, MatchRecord, Points, PriceEntry,
    RatedMatch, RosterSlot, Season, SeasonEntry, SeasonEntryId, SeasonId, SlotId, Transaction,
    TransactionDraft, TransactionId, UnitName, UnitPerformance, Week,
};
use crate::engine::RatingHistoryEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    /// A write-time ownership or uniqueness guard failed.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{unit} is already rostered in season {season}")]
    UnitHeld { unit: UnitName, season: SeasonId },
    #[error("Budget of entry {entry} would fall {shortfall} points below zero")]
    BudgetFloor {
        entry: SeasonEntryId,
        shortfall: Points,
    },
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Which transaction a moved slot should reference afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionLink {
    /// The record appended by the same unit of work.
    Appended,
    /// An explicit (possibly absent) transaction id.
    Set(Option<TransactionId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotChange {
    /// New slot linked to the appended record, if any. Fails if an active entry of
    /// `season_id` already holds `unit`.
    Create {
        owner: SeasonEntryId,
        season_id: SeasonId,
        unit: UnitName,
        price: Points,
        is_tera_captain: bool,
        acquired_week: Option<Week>,
        acquired_via: AcquisitionMethod,
    },
    /// Remove a slot still owned by `owner`.
    Delete { slot_id: SlotId, owner: SeasonEntryId },
    /// Reassign a slot from `from` to `to`, overwriting its acquisition metadata.
    Move {
        slot_id: SlotId,
        from: SeasonEntryId,
        to: SeasonEntryId,
        acquired_week: Option<Week>,
        acquired_via: Option<AcquisitionMethod>,
        link: TransactionLink,
    },
    /// Set the captain flag and adjust the stored price by `price_delta`. Fails unless the
    /// slot's current flag still equals `was_tera_captain`.
    SetCaptain {
        slot_id: SlotId,
        owner: SeasonEntryId,
        was_tera_captain: bool,
        is_tera_captain: bool,
        price_delta: Points,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    Append(TransactionDraft),
    Remove(TransactionId),
    /// Unaudited mutation (draft seeding).
    None,
}

/// One atomic ledger mutation: slot changes, budget deltas and the audit record change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub slot_changes: Vec<SlotChange>,
    pub budget_changes: Vec<(SeasonEntryId, Points)>,
    pub record: RecordChange,
}

impl UnitOfWork {
    /// Budget deltas summed per entry, in entry order.
    pub fn net_budget_changes(&self) -> BTreeMap<SeasonEntryId, Points> {
        let mut net = BTreeMap::new();
        for (entry, delta) in &self.budget_changes {
            *net.entry(*entry).or_insert(0) += delta;
        }
        net
    }
}

#[async_trait]
pub trait CoachStore: Send + Sync {
    async fn get_coach(&self, id: CoachId) -> Result<Option<Coach>, StoreError>;
    async fn list_coaches(&self) -> Result<Vec<Coach>, StoreError>;
}

#[async_trait]
pub trait SeasonStore: Send + Sync {
    async fn get_season(&self, id: SeasonId) -> Result<Option<Season>, StoreError>;
    async fn get_division(&self, id: DivisionId) -> Result<Option<Division>, StoreError>;
    async fn list_divisions(&self, season: SeasonId) -> Result<Vec<Division>, StoreError>;
    async fn get_entry(&self, id: SeasonEntryId) -> Result<Option<SeasonEntry>, StoreError>;
    /// Every entry of the division, inactive ones included.
    async fn list_entries_in_division(
        &self,
        division: DivisionId,
    ) -> Result<Vec<SeasonEntry>, StoreError>;
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn get_price(
        &self,
        season: SeasonId,
        unit: &UnitName,
    ) -> Result<Option<PriceEntry>, StoreError>;
    async fn list_prices(&self, season: SeasonId) -> Result<Vec<PriceEntry>, StoreError>;
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn get_slot(&self, id: SlotId) -> Result<Option<RosterSlot>, StoreError>;
    async fn list_slots(&self, entry: SeasonEntryId) -> Result<Vec<RosterSlot>, StoreError>;
    /// Units rostered by active entries in any division of the season.
    async fn held_units(&self, season: SeasonId) -> Result<HashSet<UnitName>, StoreError>;
    async fn slots_acquired_by(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<RosterSlot>, StoreError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get_transaction(&self, id: TransactionId)
        -> Result<Option<Transaction>, StoreError>;
    /// Transactions where the entry is the actor or the trading partner, oldest first.
    async fn list_transactions_for_entry(
        &self,
        entry: SeasonEntryId,
    ) -> Result<Vec<Transaction>, StoreError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError>;
    /// Completed matches projected onto coaches, in no particular order.
    async fn list_rated_matches(&self) -> Result<Vec<RatedMatch>, StoreError>;
    async fn list_division_matches(
        &self,
        division: DivisionId,
    ) -> Result<Vec<MatchRecord>, StoreError>;
    async fn list_unit_performances(
        &self,
        season: SeasonId,
    ) -> Result<Vec<UnitPerformance>, StoreError>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Discard all rating history, write `history`, and set each listed coach's rating.
    async fn replace_rating_history(
        &self,
        history: &[RatingHistoryEntry],
        final_ratings: &BTreeMap<CoachId, f64>,
    ) -> Result<(), StoreError>;
    async fn rating_history(&self, coach: CoachId)
        -> Result<Vec<RatingHistoryEntry>, StoreError>;
}

#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Execute `work` atomically. Returns the appended transaction, if any.
    async fn apply(&self, work: UnitOfWork) -> Result<Option<Transaction>, StoreError>;
}

/// Everything the league services need from storage.
pub trait LeagueStore:
    CoachStore
    + SeasonStore
    + PriceStore
    + RosterStore
    + TransactionStore
    + MatchStore
    + RatingStore
    + LedgerWriter
{
}

impl<T> LeagueStore for T where
    T: CoachStore
        + SeasonStore
        + PriceStore
        + RosterStore
        + TransactionStore
        + MatchStore
        + RatingStore
        + LedgerWriter
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_budget_changes_merges_per_entry() {
        let work = UnitOfWork {
            slot_changes: Vec::new(),
            budget_changes: vec![
                (SeasonEntryId::new(2), -5),
                (SeasonEntryId::new(1), 10),
                (SeasonEntryId::new(2), 8),
            ],
            record: RecordChange::Remove(TransactionId::new(1)),
        };
        let net = work.net_budget_changes();
        assert_eq!(net.get(&SeasonEntryId::new(1)), Some(&10));
        assert_eq!(net.get(&SeasonEntryId::new(2)), Some(&3));
    }
}
