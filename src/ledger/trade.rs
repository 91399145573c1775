//! Player-to-player trades and tera captain swaps.

use std::collections::HashSet;

use super::{Ledger, LedgerDelta, LedgerError, TeraSwapParams, TradeParams};
use crate::domain::{
    Points, RosterSlot, SeasonEntryId, SlotId, TradedSlot, Transaction, TransactionDraft, TransactionKind,
    Week,
};

impl Ledger {
    /// Exchange up to `max_trade_units` slots per side between two entries of one season.
    ///
    /// Points follow the units: the initiator's budget changes by
    /// `value_received - value_given` and the partner's by the opposite amount.
    /// Traded slots restart their trade-lock clock at `week`.
    ///
    /// # Errors
    ///
    /// `TooManyUnits` when a side exceeds the cap, `OwnershipMismatch` when a slot is not
    /// held by its claimed owner, `TradeLocked` for slots still inside their lock window,
    /// `InsufficientBudget` when either side would go negative.
    pub async fn p2p_trade(&self, params: TradeParams) -> Result<Transaction, LedgerError> {
        if params.season_entry_id == params.partner_id {
            return Err(LedgerError::InvalidRequest(
                "an entry cannot trade with itself".to_string(),
            ));
        }
        let max = self.config.max_trade_units;
        for side in [&params.give, &params.receive] {
            if side.len() > max {
                return Err(LedgerError::TooManyUnits {
                    count: side.len(),
                    max,
                });
            }
        }
        if params.give.is_empty() && params.receive.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "a trade needs at least one unit".to_string(),
            ));
        }
        let distinct: HashSet<_> = params.give.iter().chain(&params.receive).collect();
        if distinct.len() != params.give.len() + params.receive.len() {
            return Err(LedgerError::InvalidRequest(
                "a slot appears more than once in the trade".to_string(),
            ));
        }

        let (actor, season) = self.acting_entry(params.season_entry_id).await?;
        let (partner, partner_season) = self.acting_entry(params.partner_id).await?;
        if season != partner_season {
            return Err(LedgerError::InvalidRequest(format!(
                "entries {} and {} play in different seasons",
                actor.id, partner.id
            )));
        }
        self.check_quota(actor.id, TransactionKind::P2pTrade).await?;
        self.check_quota(partner.id, TransactionKind::P2pTrade).await?;

        let given = self.tradeable_slots(&params.give, actor.id, params.week).await?;
        let received = self
            .tradeable_slots(&params.receive, partner.id, params.week)
            .await?;

        let value_given: Points = given.iter().map(|s| s.price).sum();
        let value_received: Points = received.iter().map(|s| s.price).sum();
        let actor_delta = value_received - value_given;

        for (entry, delta) in [(&actor, actor_delta), (&partner, -actor_delta)] {
            if entry.remaining_budget + delta < 0 {
                return Err(LedgerError::insufficient(
                    entry.id,
                    -delta,
                    entry.remaining_budget,
                ));
            }
        }

        let mut draft = TransactionDraft::new(TransactionKind::P2pTrade, params.week, actor.id);
        draft.trading_partner_id = Some(partner.id);
        draft.units_in = received.iter().map(|s| s.unit.clone()).collect();
        draft.units_out = given.iter().map(|s| s.unit.clone()).collect();
        draft.budget_change = actor_delta;
        draft.traded_slots = given
            .iter()
            .map(|s| provenance(s, partner.id))
            .chain(received.iter().map(|s| provenance(s, actor.id)))
            .collect();

        let mut delta = LedgerDelta::recorded(draft);
        for slot in &given {
            delta.trade_to(slot, partner.id, params.week);
        }
        for slot in &received {
            delta.trade_to(slot, actor.id, params.week);
        }
        delta
            .budget(actor.id, actor_delta)
            .budget(partner.id, -actor_delta);

        self.commit_recorded(delta).await
    }

    async fn tradeable_slots(
        &self,
        ids: &[SlotId],
        owner: SeasonEntryId,
        week: Week,
    ) -> Result<Vec<RosterSlot>, LedgerError> {
        let lock = self.config.trade_lock_weeks;
        let mut slots = Vec::with_capacity(ids.len());
        for id in ids {
            let slot = self.owned_slot(*id, owner).await?;
            if slot.is_trade_locked(week, lock) {
                let until = slot.acquired_week.map(|w| w.plus(lock)).unwrap_or(week);
                return Err(LedgerError::TradeLocked {
                    unit: slot.unit,
                    until,
                });
            }
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Move the tera captaincy to another rostered unit.
    ///
    /// The old captain (if given) loses its flag without a refund. The new captain's
    /// surcharge is debited now and folded into its stored price, so a later drop refunds it.
    pub async fn tera_swap(&self, params: TeraSwapParams) -> Result<Transaction, LedgerError> {
        if params.old_captain_slot_id == Some(params.new_captain_slot_id) {
            return Err(LedgerError::InvalidRequest(
                "old and new captain are the same slot".to_string(),
            ));
        }

        let (entry, season) = self.acting_entry(params.season_entry_id).await?;
        let new_slot = self
            .owned_slot(params.new_captain_slot_id, entry.id)
            .await?;
        let price = self.acquisition_price(season, &new_slot.unit, true).await?;
        if new_slot.is_tera_captain {
            return Err(LedgerError::InvalidRequest(format!(
                "{} is already a tera captain",
                new_slot.unit
            )));
        }

        let old_slot = match params.old_captain_slot_id {
            Some(id) => {
                let slot = self.owned_slot(id, entry.id).await?;
                if !slot.is_tera_captain {
                    return Err(LedgerError::InvalidRequest(format!(
                        "{} is not a tera captain",
                        slot.unit
                    )));
                }
                Some(slot)
            }
            None => None,
        };
        self.check_quota(entry.id, TransactionKind::TeraSwap).await?;

        let surcharge = price.surcharge();
        if !entry.can_afford(surcharge) {
            return Err(LedgerError::insufficient(
                entry.id,
                surcharge,
                entry.remaining_budget,
            ));
        }

        let mut draft = TransactionDraft::new(TransactionKind::TeraSwap, params.week, entry.id);
        draft.old_captain = old_slot.as_ref().map(|s| s.unit.clone());
        draft.new_captain = Some(new_slot.unit.clone());
        draft.budget_change = -surcharge;

        let mut delta = LedgerDelta::recorded(draft);
        if let Some(old) = &old_slot {
            delta.captain(old, false, 0);
        }
        delta
            .captain(&new_slot, true, surcharge)
            .budget(entry.id, -surcharge);

        self.commit_recorded(delta).await
    }
}

fn provenance(slot: &RosterSlot, to: SeasonEntryId) -> TradedSlot {
    TradedSlot {
        slot_id: slot.id,
        unit: slot.unit.clone(),
        from: slot.season_entry_id,
        to,
        prior_week: slot.acquired_week,
        prior_via: slot.acquired_via,
        prior_transaction_id: slot.acquired_transaction_id,
    }
}
