//! The single mutation primitive every ledger operation configures.

use crate::db::{RecordChange, SlotChange, TransactionLink, UnitOfWork};
use crate::domain::{
    AcquisitionMethod, Points, RosterSlot, SeasonEntryId, SeasonId, TransactionDraft,
    TransactionId, UnitName, Week,
};

/// Unit deltas in and out, budget deltas, and the audit record change of one operation.
#[derive(Debug, Clone)]
pub(crate) struct LedgerDelta {
    slot_changes: Vec<SlotChange>,
    budget_changes: Vec<(SeasonEntryId, Points)>,
    record: RecordChange,
}

impl LedgerDelta {
    fn with_record(record: RecordChange) -> Self {
        Self {
            slot_changes: Vec::new(),
            budget_changes: Vec::new(),
            record,
        }
    }

    /// Delta that appends `draft` as its audit record.
    pub fn recorded(draft: TransactionDraft) -> Self {
        Self::with_record(RecordChange::Append(draft))
    }

    /// Delta that deletes transaction `id` once its reversal is written.
    pub fn reversing(id: TransactionId) -> Self {
        Self::with_record(RecordChange::Remove(id))
    }

    pub fn unrecorded() -> Self {
        Self::with_record(RecordChange::None)
    }

    pub fn unit_in(
        &mut self,
        owner: SeasonEntryId,
        season_id: SeasonId,
        unit: UnitName,
        price: Points,
        is_tera_captain: bool,
        acquired: Option<(Week, AcquisitionMethod)>,
    ) -> &mut Self {
        let (acquired_week, acquired_via) = match acquired {
            Some((week, via)) => (Some(week), via),
            None => (None, AcquisitionMethod::Draft),
        };
        self.slot_changes.push(SlotChange::Create {
            owner,
            season_id,
            unit,
            price,
            is_tera_captain,
            acquired_week,
            acquired_via,
        });
        self
    }

    pub fn unit_out(&mut self, slot: &RosterSlot) -> &mut Self {
        self.slot_changes.push(SlotChange::Delete {
            slot_id: slot.id,
            owner: slot.season_entry_id,
        });
        self
    }

    /// Hand `slot` to `to` as a trade acquisition linked to the appended record.
    pub fn trade_to(&mut self, slot: &RosterSlot, to: SeasonEntryId, week: Week) -> &mut Self {
        self.slot_changes.push(SlotChange::Move {
            slot_id: slot.id,
            from: slot.season_entry_id,
            to,
            acquired_week: Some(week),
            acquired_via: Some(AcquisitionMethod::P2pTrade),
            link: TransactionLink::Appended,
        });
        self
    }

    /// Return `slot` to `to` with the acquisition metadata it had before.
    pub fn restore_to(
        &mut self,
        slot: &RosterSlot,
        to: SeasonEntryId,
        week: Option<Week>,
        via: Option<AcquisitionMethod>,
        transaction: Option<TransactionId>,
    ) -> &mut Self {
        self.slot_changes.push(SlotChange::Move {
            slot_id: slot.id,
            from: slot.season_entry_id,
            to,
            acquired_week: week,
            acquired_via: via,
            link: TransactionLink::Set(transaction),
        });
        self
    }

    pub fn captain(&mut self, slot: &RosterSlot, flag: bool, price_delta: Points) -> &mut Self {
        self.slot_changes.push(SlotChange::SetCaptain {
            slot_id: slot.id,
            owner: slot.season_entry_id,
            was_tera_captain: slot.is_tera_captain,
            is_tera_captain: flag,
            price_delta,
        });
        self
    }

    pub fn budget(&mut self, entry: SeasonEntryId, delta: Points) -> &mut Self {
        if delta != 0 {
            self.budget_changes.push((entry, delta));
        }
        self
    }

    pub fn into_work(self) -> UnitOfWork {
        UnitOfWork {
            slot_changes: self.slot_changes,
            budget_changes: self.budget_changes,
            record: self.record,
        }
    }
}
