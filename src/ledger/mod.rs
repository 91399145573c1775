//! Roster ledger: free agency, trades, tera swaps, undo and quota accounting.
//!
//! Every mutating operation validates against current store state, then describes its
//! effect as one [`LedgerDelta`] and commits it through [`LedgerWriter::apply`], which
//! re-checks ownership and budget guards at write time.
//!
//! [`LedgerWriter::apply`]: crate::db::LedgerWriter::apply

mod delta;
mod error;
mod free_agency;
mod params;
mod trade;
mod undo;


use std::sync::Arc;

use tracing::{debug, info};

pub(crate) use delta::LedgerDelta;
pub use error::LedgerError;
pub use params::{
    DraftPickParams, DropParams, PickupParams, RosterView, SwapParams, TeraSwapParams, TradeParams,
};

use crate::db::{LeagueStore, StoreError};
use crate::domain::{
    PriceEntry, RosterSlot, SeasonEntry, SeasonEntryId, SeasonId, SlotId, Transaction,
    TransactionKind, UnitName, Week, DEFAULT_TRADE_LOCK_WEEKS,
};
use crate::engine::{available_free_agents, compute_quota, QuotaLimits, QuotaUsage};

pub const DEFAULT_MAX_TRADE_UNITS: usize = 3;

/// Tunables of the ledger rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub trade_lock_weeks: i32,
    pub max_trade_units: usize,
    pub quota: QuotaLimits,
    /// Reject operations that would exceed a quota instead of only reporting usage.
    pub enforce_quota: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            trade_lock_weeks: DEFAULT_TRADE_LOCK_WEEKS,
            max_trade_units: DEFAULT_MAX_TRADE_UNITS,
            quota: QuotaLimits::default(),
            enforce_quota: false,
        }
    }
}

/// Ledger service over the league store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LeagueStore>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: Arc<dyn LeagueStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Remaining FA and trade allowance of an entry.
    pub async fn quota(&self, entry: SeasonEntryId) -> Result<QuotaUsage, LedgerError> {
        self.entry(entry).await?;
        let transactions = self.store.list_transactions_for_entry(entry).await?;
        Ok(compute_quota(entry, &transactions, self.config.quota))
    }

    pub async fn transactions(&self, entry: SeasonEntryId) -> Result<Vec<Transaction>, LedgerError> {
        self.entry(entry).await?;
        Ok(self.store.list_transactions_for_entry(entry).await?)
    }

    /// Roster of an entry with each slot's trade-lock state at `week`.
    pub async fn roster(
        &self,
        entry: SeasonEntryId,
        week: Week,
    ) -> Result<Vec<RosterView>, LedgerError> {
        self.entry(entry).await?;
        let lock = self.config.trade_lock_weeks;
        let slots = self.store.list_slots(entry).await?;

        Ok(slots
            .into_iter()
            .map(|slot| {
                let trade_locked = slot.is_trade_locked(week, lock);
                let locked_until = if trade_locked {
                    slot.acquired_week.map(|w| w.plus(lock))
                } else {
                    None
                };
                RosterView {
                    slot,
                    trade_locked,
                    locked_until,
                }
            })
            .collect())
    }

    /// Units a season's teams may still pick up.
    pub async fn free_agents(&self, season: SeasonId) -> Result<Vec<PriceEntry>, LedgerError> {
        self.store
            .get_season(season)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("season {}", season)))?;
        let prices = self.store.list_prices(season).await?;
        let has_divisions = !self.store.list_divisions(season).await?.is_empty();
        let held = self.store.held_units(season).await?;
        Ok(available_free_agents(&prices, &held, has_divisions))
    }

    /// Price row of a unit. Unpriced units are `NotFound`; banned rows are returned as-is.
    pub async fn season_price(
        &self,
        season: SeasonId,
        unit: &UnitName,
    ) -> Result<PriceEntry, LedgerError> {
        self.store
            .get_price(season, unit)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("{} is not priced in season {}", unit, season)))
    }

    // =========================================================================
    // Shared validation
    // =========================================================================

    async fn entry(&self, id: SeasonEntryId) -> Result<SeasonEntry, LedgerError> {
        self.store
            .get_entry(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("season entry {}", id)))
    }

    /// Load an entry that may act on the ledger, together with its season.
    async fn acting_entry(&self, id: SeasonEntryId) -> Result<(SeasonEntry, SeasonId), LedgerError> {
        let entry = self.entry(id).await?;
        if !entry.is_active {
            return Err(LedgerError::InvalidRequest(format!(
                "season entry {} is inactive",
                id
            )));
        }
        let division = self
            .store
            .get_division(entry.division_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("division {}", entry.division_id)))?;
        Ok((entry, division.season_id))
    }

    async fn owned_slot(
        &self,
        slot_id: SlotId,
        owner: SeasonEntryId,
    ) -> Result<RosterSlot, LedgerError> {
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("roster slot {}", slot_id)))?;
        if slot.season_entry_id != owner {
            return Err(LedgerError::OwnershipMismatch(format!(
                "slot {} ({}) does not belong to entry {}",
                slot_id, slot.unit, owner
            )));
        }
        Ok(slot)
    }

    /// Price a unit for acquisition, rejecting unpriced, banned and tera-banned captains.
    async fn acquisition_price(
        &self,
        season: SeasonId,
        unit: &UnitName,
        as_captain: bool,
    ) -> Result<PriceEntry, LedgerError> {
        let price = self.season_price(season, unit).await?;
        if price.is_banned() {
            return Err(LedgerError::BannedUnit {
                unit: unit.clone(),
                reason: price
                    .ban_reason
                    .clone()
                    .unwrap_or_else(|| "not available at a positive price".to_string()),
            });
        }
        if as_captain && price.tera_banned {
            return Err(LedgerError::BannedUnit {
                unit: unit.clone(),
                reason: "tera-banned".to_string(),
            });
        }
        Ok(price)
    }

    async fn ensure_unheld(&self, season: SeasonId, unit: &UnitName) -> Result<(), LedgerError> {
        if self.store.held_units(season).await?.contains(unit) {
            return Err(LedgerError::UnitUnavailable(unit.clone()));
        }
        Ok(())
    }

    /// With hard enforcement on, fail when `entry` has no allowance left for `kind`.
    async fn check_quota(&self, entry: SeasonEntryId, kind: TransactionKind) -> Result<(), LedgerError> {
        if !self.config.enforce_quota {
            return Ok(());
        }
        let transactions = self.store.list_transactions_for_entry(entry).await?;
        let usage = compute_quota(entry, &transactions, self.config.quota);
        if usage.remaining_for(kind) == 0 {
            return Err(LedgerError::QuotaExhausted {
                entry,
                quota: if kind.uses_fa_quota() { "free-agency" } else { "trade" },
            });
        }
        Ok(())
    }

    /// Commit a delta, translating write-time budget guard misses into `InsufficientBudget`.
    async fn commit(&self, delta: LedgerDelta) -> Result<Option<Transaction>, LedgerError> {
        let work = delta.into_work();
        let net = work.net_budget_changes();

        match self.store.apply(work).await {
            Ok(tx) => {
                if let Some(tx) = &tx {
                    info!(
                        transaction_id = %tx.id,
                        kind = %tx.kind,
                        entry = %tx.season_entry_id,
                        budget_change = tx.budget_change,
                        "Ledger transaction committed"
                    );
                }
                Ok(tx)
            }
            Err(StoreError::BudgetFloor { entry, shortfall }) => {
                let available = self.entry(entry).await?.remaining_budget;
                let required = net.get(&entry).map(|d| -d).unwrap_or(available + shortfall);
                debug!(entry = %entry, shortfall, "Budget guard rejected unit of work");
                Err(LedgerError::InsufficientBudget {
                    entry,
                    required,
                    available,
                    shortfall,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Commit a delta that appends a record and return that record.
    async fn commit_recorded(&self, delta: LedgerDelta) -> Result<Transaction, LedgerError> {
        self.commit(delta).await?.ok_or_else(|| {
            LedgerError::Store(StoreError::Corrupt(
                "unit of work did not return its transaction".to_string(),
            ))
        })
    }
}
