//! Free-agency moves and draft seeding.

use tracing::info;

use super::{DraftPickParams, DropParams, Ledger, LedgerDelta, LedgerError, PickupParams, SwapParams};
use crate::domain::{AcquisitionMethod, RosterSlot, Transaction, TransactionDraft, TransactionKind};

impl Ledger {
    /// Pick up a free agent, optionally as tera captain.
    pub async fn fa_pickup(&self, params: PickupParams) -> Result<Transaction, LedgerError> {
        self.fa_swap(params.into()).await
    }

    /// Release a rostered unit for a refund of its stored price.
    pub async fn fa_drop(&self, params: DropParams) -> Result<Transaction, LedgerError> {
        self.fa_swap(params.into()).await
    }

    /// Drop and pick up in one unit of work.
    ///
    /// The drop refund counts toward the pickup cost, so the move succeeds iff
    /// `remaining_budget + refund >= cost`. The record kind is FA_PICKUP, FA_DROP or FA_SWAP
    /// depending on which sides are present.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` without either side, `OwnershipMismatch` for a foreign drop slot,
    /// `NotFound`/`BannedUnit` for an unpriced or banned pickup, `UnitUnavailable` when the
    /// unit is already rostered, `InsufficientBudget` when the combined budget falls short.
    pub async fn fa_swap(&self, params: SwapParams) -> Result<Transaction, LedgerError> {
        let kind = match (&params.pickup, &params.drop_slot_id) {
            (Some(_), Some(_)) => TransactionKind::FaSwap,
            (Some(_), None) => TransactionKind::FaPickup,
            (None, Some(_)) => TransactionKind::FaDrop,
            (None, None) => {
                return Err(LedgerError::InvalidRequest(
                    "a swap needs a pickup, a drop, or both".to_string(),
                ))
            }
        };

        let (entry, season) = self.acting_entry(params.season_entry_id).await?;
        self.check_quota(entry.id, kind).await?;

        let dropped: Option<RosterSlot> = match params.drop_slot_id {
            Some(slot_id) => Some(self.owned_slot(slot_id, entry.id).await?),
            None => None,
        };
        let refund = dropped.as_ref().map(|s| s.price).unwrap_or(0);

        let mut draft = TransactionDraft::new(kind, params.week, entry.id);
        draft.drop_refund = refund;

        let mut cost = 0;
        let mut delta_pickup = None;
        if let Some(unit) = &params.pickup {
            let price = self
                .acquisition_price(season, unit, params.pickup_as_captain)
                .await?;
            let redrafting_dropped = dropped.as_ref().map(|s| &s.unit) == Some(unit);
            if !redrafting_dropped {
                self.ensure_unheld(season, unit).await?;
            }
            cost = price.acquisition_cost(params.pickup_as_captain);
            draft.units_in.push(unit.clone());
            delta_pickup = Some((unit.clone(), cost));
        }

        let available = entry.remaining_budget + refund;
        if available < cost {
            return Err(LedgerError::insufficient(entry.id, cost, available));
        }

        if let Some(slot) = &dropped {
            draft.units_out.push(slot.unit.clone());
        }
        draft.budget_change = refund - cost;

        let mut delta = LedgerDelta::recorded(draft);
        if let Some(slot) = &dropped {
            delta.unit_out(slot);
        }
        if let Some((unit, price)) = delta_pickup {
            delta.unit_in(
                entry.id,
                season,
                unit,
                price,
                params.pickup_as_captain,
                Some((params.week, AcquisitionMethod::FaPickup)),
            );
        }
        delta.budget(entry.id, refund - cost);

        self.commit_recorded(delta).await
    }

    /// Seed a drafted unit onto a roster. Debits the budget; writes no transaction.
    pub async fn draft_pick(&self, params: DraftPickParams) -> Result<RosterSlot, LedgerError> {
        let (entry, season) = self.acting_entry(params.season_entry_id).await?;
        let price = self
            .acquisition_price(season, &params.unit, params.as_captain)
            .await?;
        self.ensure_unheld(season, &params.unit).await?;

        let cost = price.acquisition_cost(params.as_captain);
        if !entry.can_afford(cost) {
            return Err(LedgerError::insufficient(entry.id, cost, entry.remaining_budget));
        }

        let mut delta = LedgerDelta::unrecorded();
        delta
            .unit_in(entry.id, season, params.unit.clone(), cost, params.as_captain, None)
            .budget(entry.id, -cost);
        self.commit(delta).await?;

        let slot = self
            .store
            .list_slots(entry.id)
            .await?
            .into_iter()
            .find(|s| s.unit == params.unit)
            .ok_or_else(|| LedgerError::NotFound(format!("drafted slot for {}", params.unit)))?;

        info!(entry = %entry.id, unit = %params.unit, price = cost, "Draft pick seeded");
        Ok(slot)
    }
}
