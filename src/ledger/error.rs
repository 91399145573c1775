use thiserror::Error;

use crate::db::StoreError;
use crate::domain::{Points, SeasonEntryId, TransactionKind, UnitName, Week};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ownership mismatch: {0}")]
    OwnershipMismatch(String),

    #[error("Too many units on one side of a trade: {count} (max {max})")]
    TooManyUnits { count: usize, max: usize },

    #[error("{unit} is trade-locked until week {until}")]
    TradeLocked { unit: UnitName, until: Week },

    #[error(
        "Insufficient budget for entry {entry}: requires {required}, has {available} (short {shortfall})"
    )]
    InsufficientBudget {
        entry: SeasonEntryId,
        required: Points,
        available: Points,
        shortfall: Points,
    },

    #[error("Banned unit {unit}: {reason}")]
    BannedUnit { unit: UnitName, reason: String },

    #[error("{0} is already rostered by another team this season")]
    UnitUnavailable(UnitName),

    #[error("Undo of {0} transactions is not supported")]
    UnsupportedUndo(TransactionKind),

    #[error("Entry {entry} has no {quota} transactions left")]
    QuotaExhausted {
        entry: SeasonEntryId,
        quota: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(StoreError),
}

impl LedgerError {
    pub(crate) fn insufficient(entry: SeasonEntryId, required: Points, available: Points) -> Self {
        LedgerError::InsufficientBudget {
            entry,
            required,
            available,
            shortfall: required - available,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => LedgerError::NotFound(what),
            StoreError::Conflict(what) => LedgerError::OwnershipMismatch(what),
            StoreError::UnitHeld { unit, .. } => LedgerError::UnitUnavailable(unit),
            other => LedgerError::Store(other),
        }
    }
}
