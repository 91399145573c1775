//! Immutable audit record of one ledger mutation.

use crate::domain::{
    AcquisitionMethod, Points, SeasonEntryId, SlotId, TransactionId, UnitName, Week,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    FaPickup,
    FaDrop,
    FaSwap,
    P2pTrade,
    TeraSwap,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::FaPickup => "FA_PICKUP",
            TransactionKind::FaDrop => "FA_DROP",
            TransactionKind::FaSwap => "FA_SWAP",
            TransactionKind::P2pTrade => "P2P_TRADE",
            TransactionKind::TeraSwap => "TERA_SWAP",
        }
    }

    /// Kinds that draw from the shared free-agency quota.
    pub fn uses_fa_quota(&self) -> bool {
        !matches!(self, TransactionKind::P2pTrade)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FA_PICKUP" => Ok(TransactionKind::FaPickup),
            "FA_DROP" => Ok(TransactionKind::FaDrop),
            "FA_SWAP" => Ok(TransactionKind::FaSwap),
            "P2P_TRADE" => Ok(TransactionKind::P2pTrade),
            "TERA_SWAP" => Ok(TransactionKind::TeraSwap),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Provenance of a slot moved by a trade, kept so the trade can be reversed exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradedSlot {
    pub slot_id: SlotId,
    pub unit: UnitName,
    pub from: SeasonEntryId,
    pub to: SeasonEntryId,
    pub prior_week: Option<Week>,
    pub prior_via: Option<AcquisitionMethod>,
    pub prior_transaction_id: Option<TransactionId>,
}

/// Transaction fields known before the record is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub week: Week,
    pub season_entry_id: SeasonEntryId,
    pub trading_partner_id: Option<SeasonEntryId>,
    pub units_in: Vec<UnitName>,
    pub units_out: Vec<UnitName>,
    pub old_captain: Option<UnitName>,
    pub new_captain: Option<UnitName>,
    /// Signed budget change of the acting entry.
    pub budget_change: Points,
    /// Refund credited by the drop leg of a free-agency move (0 without one).
    pub drop_refund: Points,
    pub counts_against_limit: bool,
    pub traded_slots: Vec<TradedSlot>,
}

impl TransactionDraft {
    pub fn new(kind: TransactionKind, week: Week, season_entry_id: SeasonEntryId) -> Self {
        Self {
            kind,
            week,
            season_entry_id,
            trading_partner_id: None,
            units_in: Vec::new(),
            units_out: Vec::new(),
            old_captain: None,
            new_captain: None,
            budget_change: 0,
            drop_refund: 0,
            counts_against_limit: true,
            traded_slots: Vec::new(),
        }
    }

    pub fn into_transaction(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            week: self.week,
            season_entry_id: self.season_entry_id,
            trading_partner_id: self.trading_partner_id,
            units_in: self.units_in,
            units_out: self.units_out,
            old_captain: self.old_captain,
            new_captain: self.new_captain,
            budget_change: self.budget_change,
            drop_refund: self.drop_refund,
            counts_against_limit: self.counts_against_limit,
            traded_slots: self.traded_slots,
            created_at,
        }
    }
}

/// A persisted ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub week: Week,
    pub season_entry_id: SeasonEntryId,
    pub trading_partner_id: Option<SeasonEntryId>,
    pub units_in: Vec<UnitName>,
    pub units_out: Vec<UnitName>,
    pub old_captain: Option<UnitName>,
    pub new_captain: Option<UnitName>,
    pub budget_change: Points,
    pub drop_refund: Points,
    pub counts_against_limit: bool,
    pub traded_slots: Vec<TradedSlot>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Budget change of the trading partner; trades are zero-sum between the two sides.
    pub fn partner_budget_change(&self) -> Points {
        if self.trading_partner_id.is_some() {
            -self.budget_change
        } else {
            0
        }
    }

    /// Whether `entry` took part in this transaction as actor or partner.
    pub fn involves(&self, entry: SeasonEntryId) -> bool {
        self.season_entry_id == entry || self.trading_partner_id == Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&TransactionKind::TeraSwap).unwrap();
        assert_eq!(json, "\"TERA_SWAP\"");
        assert_eq!("FA_SWAP".parse::<TransactionKind>().unwrap(), TransactionKind::FaSwap);
    }

    #[test]
    fn test_fa_quota_kinds() {
        assert!(TransactionKind::FaPickup.uses_fa_quota());
        assert!(TransactionKind::FaDrop.uses_fa_quota());
        assert!(TransactionKind::FaSwap.uses_fa_quota());
        assert!(TransactionKind::TeraSwap.uses_fa_quota());
        assert!(!TransactionKind::P2pTrade.uses_fa_quota());
    }

    #[test]
    fn test_partner_budget_change_is_mirrored() {
        let mut draft = TransactionDraft::new(
            TransactionKind::P2pTrade,
            Week::new(4),
            SeasonEntryId::new(1),
        );
        draft.trading_partner_id = Some(SeasonEntryId::new(2));
        draft.budget_change = 7;
        let tx = draft.into_transaction(TransactionId::new(9), Utc::now());
        assert_eq!(tx.partner_budget_change(), -7);
        assert!(tx.involves(SeasonEntryId::new(2)));
        assert!(!tx.involves(SeasonEntryId::new(3)));
    }
}
