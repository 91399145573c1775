//! Per-entry transaction quota accounting.

use serde::{Deserialize, Serialize};

use crate::domain::{SeasonEntryId, Transaction, TransactionKind};

pub const DEFAULT_FA_LIMIT: i64 = 6;
pub const DEFAULT_TRADE_LIMIT: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimits {
    pub fa_limit: i64,
    pub trade_limit: i64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            fa_limit: DEFAULT_FA_LIMIT,
            trade_limit: DEFAULT_TRADE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub fa_used: i64,
    pub fa_remaining: i64,
    pub trade_used: i64,
    pub trade_remaining: i64,
}

impl QuotaUsage {
    /// Remaining allowance for a transaction of `kind`.
    pub fn remaining_for(&self, kind: TransactionKind) -> i64 {
        if kind.uses_fa_quota() {
            self.fa_remaining
        } else {
            self.trade_remaining
        }
    }
}

/// Count `entry`'s limit-bearing transactions against both quotas.
///
/// Free-agency kinds count only when `entry` acted; trades count for both the initiating
/// side and the recorded trading partner.
pub fn compute_quota(
    entry: SeasonEntryId,
    transactions: &[Transaction],
    limits: QuotaLimits,
) -> QuotaUsage {
    let mut fa_used = 0i64;
    let mut trade_used = 0i64;

    for tx in transactions.iter().filter(|t| t.counts_against_limit) {
        match tx.kind {
            TransactionKind::P2pTrade if tx.involves(entry) => trade_used += 1,
            kind if kind.uses_fa_quota() && tx.season_entry_id == entry => fa_used += 1,
            _ => {}
        }
    }

    QuotaUsage {
        fa_used,
        fa_remaining: (limits.fa_limit - fa_used).max(0),
        trade_used,
        trade_remaining: (limits.trade_limit - trade_used).max(0),
    }
}
