//! In-memory store for unit tests and offline tooling.
//!
//! Mirrors the guard semantics of the SQLite repository: `apply` works on a copy of the
//! state and swaps it in only when every change succeeded.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::repo::{MatchResult, NewMatch, NewSeasonEntry};
use super::store::{
    CoachStore, LedgerWriter, MatchStore, PriceStore, RatingStore, RecordChange, RosterStore,
    SeasonStore, SlotChange, StoreError, TransactionLink, TransactionStore, UnitOfWork,
};
use crate::domain::{
    AcquisitionMethod, Coach, CoachId, Division, DivisionId, MatchId, MatchRecord, MatchSide,
    Points, PriceEntry, RatedMatch, RosterSlot, Season, SeasonEntry, SeasonEntryId, SeasonId,
    SlotId, Transaction, TransactionId, UnitName, UnitPerformance,
};
use crate::engine::RatingHistoryEntry;

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    coaches: BTreeMap<CoachId, Coach>,
    seasons: BTreeMap<SeasonId, Season>,
    divisions: BTreeMap<DivisionId, Division>,
    entries: BTreeMap<SeasonEntryId, SeasonEntry>,
    prices: BTreeMap<(SeasonId, UnitName), PriceEntry>,
    slots: BTreeMap<SlotId, RosterSlot>,
    transactions: BTreeMap<TransactionId, Transaction>,
    matches: BTreeMap<MatchId, MatchRecord>,
    performances: Vec<UnitPerformance>,
    history: Vec<RatingHistoryEntry>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn season_of(&self, entry: &SeasonEntry) -> Option<SeasonId> {
        self.divisions.get(&entry.division_id).map(|d| d.season_id)
    }

    fn is_held(&self, season: SeasonId, unit: &UnitName) -> bool {
        self.slots.values().any(|slot| {
            &slot.unit == unit
                && self
                    .entries
                    .get(&slot.season_entry_id)
                    .filter(|e| e.is_active)
                    .and_then(|e| self.season_of(e))
                    == Some(season)
        })
    }

    fn owned_slot(
        &mut self,
        slot_id: SlotId,
        owner: SeasonEntryId,
    ) -> Result<&mut RosterSlot, StoreError> {
        match self.slots.get_mut(&slot_id) {
            Some(slot) if slot.season_entry_id == owner => Ok(slot),
            _ => Err(StoreError::Conflict(format!(
                "slot {} is not owned by entry {}",
                slot_id, owner
            ))),
        }
    }

    fn apply_slot_change(
        &mut self,
        change: SlotChange,
        appended: Option<TransactionId>,
    ) -> Result<(), StoreError> {
        match change {
            SlotChange::Create {
                owner,
                season_id,
                unit,
                price,
                is_tera_captain,
                acquired_week,
                acquired_via,
            } => {
                if self.is_held(season_id, &unit) {
                    return Err(StoreError::UnitHeld {
                        unit,
                        season: season_id,
                    });
                }
                let id = SlotId::new(self.next_id());
                self.slots.insert(
                    id,
                    RosterSlot {
                        id,
                        season_entry_id: owner,
                        unit,
                        price,
                        is_tera_captain,
                        acquired_week,
                        acquired_via: Some(acquired_via),
                        acquired_transaction_id: appended,
                    },
                );
            }
            SlotChange::Delete { slot_id, owner } => {
                self.owned_slot(slot_id, owner)?;
                self.slots.remove(&slot_id);
            }
            SlotChange::Move {
                slot_id,
                from,
                to,
                acquired_week,
                acquired_via,
                link,
            } => {
                let slot = self.owned_slot(slot_id, from)?;
                slot.season_entry_id = to;
                slot.acquired_week = acquired_week;
                slot.acquired_via = acquired_via;
                slot.acquired_transaction_id = match link {
                    TransactionLink::Appended => appended,
                    TransactionLink::Set(id) => id,
                };
            }
            SlotChange::SetCaptain {
                slot_id,
                owner,
                was_tera_captain,
                is_tera_captain,
                price_delta,
            } => {
                let slot = self.owned_slot(slot_id, owner)?;
                if slot.is_tera_captain != was_tera_captain {
                    return Err(StoreError::Conflict(format!(
                        "slot {} of entry {} changed captaincy concurrently",
                        slot_id, owner
                    )));
                }
                slot.is_tera_captain = is_tera_captain;
                slot.price += price_delta;
            }
        }
        Ok(())
    }

    fn apply_budget_change(&mut self, entry: SeasonEntryId, delta: Points) -> Result<(), StoreError> {
        let row = self
            .entries
            .get_mut(&entry)
            .ok_or_else(|| StoreError::NotFound(format!("season entry {}", entry)))?;
        let next = row.remaining_budget + delta;
        if next < 0 {
            return Err(StoreError::BudgetFloor {
                entry,
                shortfall: -next,
            });
        }
        row.remaining_budget = next;
        Ok(())
    }
}

/// Store backed by plain collections behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_coach(&self, name: &str) -> Coach {
        let mut state = self.lock();
        let coach = Coach {
            id: CoachId::new(state.next_id()),
            name: name.to_string(),
            rating: None,
        };
        state.coaches.insert(coach.id, coach.clone());
        coach
    }

    pub fn add_season(&self, ordinal: i32, name: &str) -> Season {
        let mut state = self.lock();
        let season = Season {
            id: SeasonId::new(state.next_id()),
            ordinal,
            name: name.to_string(),
        };
        state.seasons.insert(season.id, season.clone());
        season
    }

    pub fn add_division(&self, season_id: SeasonId, name: &str) -> Division {
        let mut state = self.lock();
        let division = Division {
            id: DivisionId::new(state.next_id()),
            season_id,
            name: name.to_string(),
        };
        state.divisions.insert(division.id, division.clone());
        division
    }

    pub fn add_entry(&self, new: &NewSeasonEntry) -> SeasonEntry {
        let mut state = self.lock();
        let entry = SeasonEntry {
            id: SeasonEntryId::new(state.next_id()),
            coach_id: new.coach_id,
            division_id: new.division_id,
            team_name: new.team_name.clone(),
            team_abbreviation: new.team_abbreviation.clone(),
            remaining_budget: new.budget,
            is_active: true,
            replaced_by: None,
        };
        state.entries.insert(entry.id, entry.clone());
        entry
    }

    /// Deactivate `old` and hand its roster and budget to a new entry.
    pub fn replace_entry(
        &self,
        old: SeasonEntryId,
        new: &NewSeasonEntry,
    ) -> Result<SeasonEntry, StoreError> {
        let mut state = self.lock();
        let previous = state
            .entries
            .get(&old)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("season entry {}", old)))?;
        if !previous.is_active {
            return Err(StoreError::Conflict(format!(
                "season entry {} is already inactive",
                old
            )));
        }

        let successor = SeasonEntry {
            id: SeasonEntryId::new(state.next_id()),
            coach_id: new.coach_id,
            division_id: previous.division_id,
            team_name: new.team_name.clone(),
            team_abbreviation: new.team_abbreviation.clone(),
            remaining_budget: previous.remaining_budget,
            is_active: true,
            replaced_by: None,
        };
        if let Some(row) = state.entries.get_mut(&old) {
            row.is_active = false;
            row.replaced_by = Some(successor.id);
        }
        for slot in state.slots.values_mut() {
            if slot.season_entry_id == old {
                slot.season_entry_id = successor.id;
            }
        }
        state.entries.insert(successor.id, successor.clone());
        Ok(successor)
    }

    pub fn set_price(&self, price: PriceEntry) {
        self.lock()
            .prices
            .insert((price.season_id, price.unit.clone()), price);
    }

    /// Seed a drafted slot without touching the owner's budget.
    pub fn add_slot(&self, owner: SeasonEntryId, unit: &str, price: Points) -> RosterSlot {
        let mut state = self.lock();
        let slot = RosterSlot {
            id: SlotId::new(state.next_id()),
            season_entry_id: owner,
            unit: UnitName::new(unit),
            price,
            is_tera_captain: false,
            acquired_week: None,
            acquired_via: Some(AcquisitionMethod::Draft),
            acquired_transaction_id: None,
        };
        state.slots.insert(slot.id, slot.clone());
        slot
    }

    pub fn set_captain(&self, slot: SlotId, is_tera_captain: bool) {
        if let Some(row) = self.lock().slots.get_mut(&slot) {
            row.is_tera_captain = is_tera_captain;
        }
    }

    pub fn add_match(&self, new: &NewMatch) -> Result<MatchRecord, StoreError> {
        let mut state = self.lock();
        let season_id = state
            .divisions
            .get(&new.division_id)
            .map(|d| d.season_id)
            .ok_or_else(|| StoreError::NotFound(format!("division {}", new.division_id)))?;
        let record = MatchRecord {
            id: MatchId::new(state.next_id()),
            season_id,
            division_id: new.division_id,
            week: new.week,
            entry1: new.entry1,
            entry2: new.entry2,
            winner: new.winner,
            differential1: new.differential1,
            differential2: new.differential2,
            replay_url: new.replay_url.clone(),
            played_at: new.played_at,
        };
        state.matches.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn record_match_result(
        &self,
        id: MatchId,
        result: &MatchResult,
    ) -> Result<MatchRecord, StoreError> {
        let mut state = self.lock();
        let record = state
            .matches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("match {}", id)))?;
        if result.winner != record.entry1 && result.winner != record.entry2 {
            return Err(StoreError::Conflict(format!(
                "winner {} did not play match {}",
                result.winner, id
            )));
        }
        record.winner = Some(result.winner);
        record.differential1 = result.differential1;
        record.differential2 = result.differential2;
        record.replay_url = result.replay_url.clone();
        record.played_at = result.played_at;
        let settled = record.clone();

        state.performances.retain(|p| p.match_id != id);
        state
            .performances
            .extend(result.performances.iter().map(|p| UnitPerformance {
                match_id: id,
                ..p.clone()
            }));
        Ok(settled)
    }
}

#[async_trait]
impl CoachStore for MemoryStore {
    async fn get_coach(&self, id: CoachId) -> Result<Option<Coach>, StoreError> {
        Ok(self.lock().coaches.get(&id).cloned())
    }

    async fn list_coaches(&self) -> Result<Vec<Coach>, StoreError> {
        Ok(self.lock().coaches.values().cloned().collect())
    }
}

#[async_trait]
impl SeasonStore for MemoryStore {
    async fn get_season(&self, id: SeasonId) -> Result<Option<Season>, StoreError> {
        Ok(self.lock().seasons.get(&id).cloned())
    }

    async fn get_division(&self, id: DivisionId) -> Result<Option<Division>, StoreError> {
        Ok(self.lock().divisions.get(&id).cloned())
    }

    async fn list_divisions(&self, season: SeasonId) -> Result<Vec<Division>, StoreError> {
        Ok(self
            .lock()
            .divisions
            .values()
            .filter(|d| d.season_id == season)
            .cloned()
            .collect())
    }

    async fn get_entry(&self, id: SeasonEntryId) -> Result<Option<SeasonEntry>, StoreError> {
        Ok(self.lock().entries.get(&id).cloned())
    }

    async fn list_entries_in_division(
        &self,
        division: DivisionId,
    ) -> Result<Vec<SeasonEntry>, StoreError> {
        Ok(self
            .lock()
            .entries
            .values()
            .filter(|e| e.division_id == division)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn get_price(
        &self,
        season: SeasonId,
        unit: &UnitName,
    ) -> Result<Option<PriceEntry>, StoreError> {
        Ok(self.lock().prices.get(&(season, unit.clone())).cloned())
    }

    async fn list_prices(&self, season: SeasonId) -> Result<Vec<PriceEntry>, StoreError> {
        Ok(self
            .lock()
            .prices
            .values()
            .filter(|p| p.season_id == season)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn get_slot(&self, id: SlotId) -> Result<Option<RosterSlot>, StoreError> {
        Ok(self.lock().slots.get(&id).cloned())
    }

    async fn list_slots(&self, entry: SeasonEntryId) -> Result<Vec<RosterSlot>, StoreError> {
        Ok(self
            .lock()
            .slots
            .values()
            .filter(|s| s.season_entry_id == entry)
            .cloned()
            .collect())
    }

    async fn held_units(&self, season: SeasonId) -> Result<HashSet<UnitName>, StoreError> {
        let state = self.lock();
        Ok(state
            .slots
            .values()
            .filter(|slot| {
                state
                    .entries
                    .get(&slot.season_entry_id)
                    .filter(|e| e.is_active)
                    .and_then(|e| state.season_of(e))
                    == Some(season)
            })
            .map(|slot| slot.unit.clone())
            .collect())
    }

    async fn slots_acquired_by(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<RosterSlot>, StoreError> {
        Ok(self
            .lock()
            .slots
            .values()
            .filter(|s| s.acquired_transaction_id == Some(transaction))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self.lock().transactions.get(&id).cloned())
    }

    async fn list_transactions_for_entry(
        &self,
        entry: SeasonEntryId,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .lock()
            .transactions
            .values()
            .filter(|t| t.involves(entry))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.lock().matches.get(&id).cloned())
    }

    async fn list_rated_matches(&self) -> Result<Vec<RatedMatch>, StoreError> {
        let state = self.lock();
        let mut rated = Vec::new();
        for m in state.matches.values() {
            let Some(winner) = m.winner else { continue };
            let side = if winner == m.entry1 {
                MatchSide::First
            } else if winner == m.entry2 {
                MatchSide::Second
            } else {
                continue;
            };
            let (Some(season), Some(division)) =
                (state.seasons.get(&m.season_id), state.divisions.get(&m.division_id))
            else {
                continue;
            };
            let coach = |e: SeasonEntryId| state.entries.get(&e).and_then(|x| x.coach_id);
            rated.push(RatedMatch {
                match_id: m.id,
                season_ordinal: season.ordinal,
                division_name: division.name.clone(),
                week: m.week,
                coach1: coach(m.entry1),
                coach2: coach(m.entry2),
                winner: side,
                played_at: m.played_at,
            });
        }
        Ok(rated)
    }

    async fn list_division_matches(
        &self,
        division: DivisionId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: Vec<MatchRecord> = self
            .lock()
            .matches
            .values()
            .filter(|m| m.division_id == division)
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.week, m.id));
        Ok(matches)
    }

    async fn list_unit_performances(
        &self,
        season: SeasonId,
    ) -> Result<Vec<UnitPerformance>, StoreError> {
        let state = self.lock();
        Ok(state
            .performances
            .iter()
            .filter(|p| {
                state
                    .matches
                    .get(&p.match_id)
                    .map(|m| m.season_id == season)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn replace_rating_history(
        &self,
        history: &[RatingHistoryEntry],
        final_ratings: &BTreeMap<CoachId, f64>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.history = history.to_vec();
        for (id, rating) in final_ratings {
            if let Some(coach) = state.coaches.get_mut(id) {
                coach.rating = Some(*rating);
            }
        }
        Ok(())
    }

    async fn rating_history(
        &self,
        coach: CoachId,
    ) -> Result<Vec<RatingHistoryEntry>, StoreError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|h| h.coach_id == coach)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerWriter for MemoryStore {
    async fn apply(&self, work: UnitOfWork) -> Result<Option<Transaction>, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();

        let net = work.net_budget_changes();
        let removed = match &work.record {
            RecordChange::Remove(id) => Some(*id),
            _ => None,
        };
        let appended = match work.record {
            RecordChange::Append(draft) => {
                let id = TransactionId::new(next.next_id());
                let tx = draft.into_transaction(id, Utc::now());
                next.transactions.insert(id, tx.clone());
                Some(tx)
            }
            RecordChange::Remove(_) | RecordChange::None => None,
        };
        let appended_id = appended.as_ref().map(|t| t.id);

        for change in work.slot_changes {
            next.apply_slot_change(change, appended_id)?;
        }
        for (entry, delta) in net {
            if delta != 0 {
                next.apply_budget_change(entry, delta)?;
            }
        }
        if let Some(id) = removed {
            if next.transactions.remove(&id).is_none() {
                return Err(StoreError::NotFound(format!("transaction {}", id)));
            }
            for slot in next.slots.values_mut() {
                if slot.acquired_transaction_id == Some(id) {
                    slot.acquired_transaction_id = None;
                }
            }
        }

        *guard = next;
        Ok(appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TransactionDraft, TransactionKind, Week};

    fn seeded() -> (MemoryStore, SeasonId, SeasonEntry) {
        let store = MemoryStore::new();
        let coach = store.add_coach("misty");
        let season = store.add_season(1, "Season 1");
        let division = store.add_division(season.id, "Premier");
        let entry = store.add_entry(&NewSeasonEntry {
            coach_id: Some(coach.id),
            division_id: division.id,
            team_name: "Cerulean".to_string(),
            team_abbreviation: "CER".to_string(),
            budget: 10,
        });
        (store, season.id, entry)
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_state_untouched() {
        let (store, season, entry) = seeded();
        let mut draft = TransactionDraft::new(TransactionKind::FaPickup, Week::new(2), entry.id);
        draft.budget_change = -11;

        let err = store
            .apply(UnitOfWork {
                slot_changes: vec![SlotChange::Create {
                    owner: entry.id,
                    season_id: season,
                    unit: UnitName::new("Starmie"),
                    price: 11,
                    is_tera_captain: false,
                    acquired_week: Some(Week::new(2)),
                    acquired_via: AcquisitionMethod::FaPickup,
                }],
                budget_changes: vec![(entry.id, -11)],
                record: RecordChange::Append(draft),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::BudgetFloor { shortfall: 1, .. }));
        assert!(store.list_slots(entry.id).await.unwrap().is_empty());
        assert!(store.list_transactions_for_entry(entry.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_entry_no_longer_holds_units() {
        let (store, season, entry) = seeded();
        store.add_slot(entry.id, "Starmie", 5);
        assert_eq!(store.held_units(season).await.unwrap().len(), 1);

        let successor = store
            .replace_entry(
                entry.id,
                &NewSeasonEntry {
                    coach_id: None,
                    division_id: entry.division_id,
                    team_name: "Cerulean II".to_string(),
                    team_abbreviation: "CE2".to_string(),
                    budget: 0,
                },
            )
            .unwrap();
        assert_eq!(successor.remaining_budget, 10);
        assert_eq!(store.list_slots(successor.id).await.unwrap().len(), 1);
        assert!(store.held_units(season).await.unwrap().contains(&UnitName::new("Starmie")));
    }

    #[tokio::test]
    async fn test_captain_change_against_stale_flag_conflicts() {
        let (store, _season, entry) = seeded();
        let slot = store.add_slot(entry.id, "Starmie", 5);
        let crown = |was| UnitOfWork {
            slot_changes: vec![SlotChange::SetCaptain {
                slot_id: slot.id,
                owner: entry.id,
                was_tera_captain: was,
                is_tera_captain: true,
                price_delta: 2,
            }],
            budget_changes: vec![(entry.id, -2)],
            record: RecordChange::None,
        };

        store.apply(crown(false)).await.unwrap();
        assert!(matches!(
            store.apply(crown(false)).await,
            Err(StoreError::Conflict(_))
        ));

        let after = store.get_slot(slot.id).await.unwrap().unwrap();
        assert_eq!(after.price, 7);
        assert_eq!(store.get_entry(entry.id).await.unwrap().unwrap().remaining_budget, 8);
    }
}
