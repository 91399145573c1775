//! Administrative reversal of ledger transactions.

use tracing::info;

use super::{Ledger, LedgerDelta, LedgerError};
use crate::domain::{
    AcquisitionMethod, RosterSlot, SeasonEntryId, Transaction, TransactionId, TransactionKind,
    UnitName,
};

impl Ledger {
    /// Reverse a transaction's side effects and delete its record.
    ///
    /// - FA_PICKUP and the pickup leg of FA_SWAP: the created slot is deleted and its cost
    ///   credited back. A swap's drop leg stays applied.
    /// - FA_DROP: rejected with `UnsupportedUndo`; the released unit may have been picked
    ///   up elsewhere since.
    /// - P2P_TRADE: every traded slot returns to its original owner with the acquisition
    ///   metadata it had before the trade, and both budget deltas are reversed.
    /// - TERA_SWAP: the old captain flag is restored, the new one cleared and the surcharge
    ///   credited back.
    ///
    /// Returns the deleted record.
    pub async fn undo(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let tx = self
            .store
            .get_transaction(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", id)))?;

        let delta = match tx.kind {
            TransactionKind::FaDrop => return Err(LedgerError::UnsupportedUndo(tx.kind)),
            TransactionKind::FaPickup | TransactionKind::FaSwap => self.reverse_pickup(&tx).await?,
            TransactionKind::P2pTrade => self.reverse_trade(&tx).await?,
            TransactionKind::TeraSwap => self.reverse_tera_swap(&tx).await?,
        };

        self.commit(delta).await?;
        info!(transaction_id = %tx.id, kind = %tx.kind, "Transaction undone");
        Ok(tx)
    }

    async fn reverse_pickup(&self, tx: &Transaction) -> Result<LedgerDelta, LedgerError> {
        let created = self
            .store
            .slots_acquired_by(tx.id)
            .await?
            .into_iter()
            .find(|s| {
                s.acquired_via == Some(AcquisitionMethod::FaPickup)
                    && s.season_entry_id == tx.season_entry_id
            })
            .ok_or_else(|| {
                LedgerError::OwnershipMismatch(format!(
                    "the unit picked up by transaction {} is no longer held by entry {}",
                    tx.id, tx.season_entry_id
                ))
            })?;

        let cost = tx.drop_refund - tx.budget_change;
        let mut delta = LedgerDelta::reversing(tx.id);
        delta.unit_out(&created).budget(tx.season_entry_id, cost);
        Ok(delta)
    }

    async fn reverse_trade(&self, tx: &Transaction) -> Result<LedgerDelta, LedgerError> {
        let partner = tx.trading_partner_id.ok_or_else(|| {
            LedgerError::InvalidRequest(format!("trade {} has no trading partner", tx.id))
        })?;

        let mut delta = LedgerDelta::reversing(tx.id);
        for traded in &tx.traded_slots {
            let slot = self
                .store
                .get_slot(traded.slot_id)
                .await?
                .filter(|s| s.season_entry_id == traded.to && s.acquired_transaction_id == Some(tx.id))
                .ok_or_else(|| {
                    LedgerError::OwnershipMismatch(format!(
                        "{} has moved since trade {}",
                        traded.unit, tx.id
                    ))
                })?;

            let prior_transaction = match traded.prior_transaction_id {
                Some(prior) => self.store.get_transaction(prior).await?.map(|t| t.id),
                None => None,
            };
            delta.restore_to(
                &slot,
                traded.from,
                traded.prior_week,
                traded.prior_via,
                prior_transaction,
            );
        }

        delta
            .budget(tx.season_entry_id, -tx.budget_change)
            .budget(partner, tx.budget_change);
        Ok(delta)
    }

    async fn reverse_tera_swap(&self, tx: &Transaction) -> Result<LedgerDelta, LedgerError> {
        let surcharge = -tx.budget_change;
        let slots = self.store.list_slots(tx.season_entry_id).await?;

        let new_captain = tx.new_captain.as_ref().ok_or_else(|| {
            LedgerError::InvalidRequest(format!("tera swap {} has no new captain", tx.id))
        })?;
        let new_slot = find_slot(&slots, new_captain, tx.season_entry_id, tx.id)?;
        if !new_slot.is_tera_captain {
            return Err(LedgerError::OwnershipMismatch(format!(
                "{} is no longer a tera captain",
                new_captain
            )));
        }

        let mut delta = LedgerDelta::reversing(tx.id);
        delta.captain(new_slot, false, -surcharge);
        if let Some(old) = &tx.old_captain {
            let old_slot = find_slot(&slots, old, tx.season_entry_id, tx.id)?;
            delta.captain(old_slot, true, 0);
        }
        delta.budget(tx.season_entry_id, surcharge);
        Ok(delta)
    }
}

fn find_slot<'a>(
    slots: &'a [RosterSlot],
    unit: &UnitName,
    owner: SeasonEntryId,
    tx: TransactionId,
) -> Result<&'a RosterSlot, LedgerError> {
    slots.iter().find(|s| &s.unit == unit).ok_or_else(|| {
        LedgerError::OwnershipMismatch(format!(
            "{} from transaction {} is no longer held by entry {}",
            unit, tx, owner
        ))
    })
}
