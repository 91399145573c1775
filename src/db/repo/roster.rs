//! Roster slots, ledger transactions and the atomic unit-of-work writer.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, warn};

use super::{millis_to_utc, parse_column, Repository};
use crate::db::store::{
    LedgerWriter, RecordChange, RosterStore, SlotChange, StoreError, TransactionLink,
    TransactionStore, UnitOfWork,
};
use crate::domain::{
    AcquisitionMethod, RosterSlot, SeasonEntryId, SeasonId, SlotId, TradedSlot, Transaction,
    TransactionDraft, TransactionId, TransactionKind, UnitName, Week,
};

const SLOT_COLUMNS: &str = "id, season_entry_id, unit, price, is_tera_captain, acquired_week, \
                            acquired_via, acquired_transaction_id";

const TRANSACTION_COLUMNS: &str = "id, kind, week, season_entry_id, trading_partner_id, \
    units_in, units_out, old_captain, new_captain, budget_change, drop_refund, \
    counts_against_limit, traded_slots, created_at";

fn slot_from_row(row: &SqliteRow) -> Result<RosterSlot, StoreError> {
    let acquired_via = match row.get::<Option<String>, _>("acquired_via") {
        Some(raw) => Some(parse_column::<AcquisitionMethod>(&raw)?),
        None => None,
    };

    Ok(RosterSlot {
        id: SlotId::new(row.get("id")),
        season_entry_id: SeasonEntryId::new(row.get("season_entry_id")),
        unit: UnitName::new(row.get::<String, _>("unit")),
        price: row.get("price"),
        is_tera_captain: row.get::<i64, _>("is_tera_captain") != 0,
        acquired_week: row.get::<Option<i32>, _>("acquired_week").map(Week::new),
        acquired_via,
        acquired_transaction_id: row
            .get::<Option<i64>, _>("acquired_transaction_id")
            .map(TransactionId::new),
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{}: {}", column, e)))
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, StoreError> {
    let kind: TransactionKind = parse_column(&row.get::<String, _>("kind"))?;
    let units_in: Vec<UnitName> = decode_json(&row.get::<String, _>("units_in"), "units_in")?;
    let units_out: Vec<UnitName> = decode_json(&row.get::<String, _>("units_out"), "units_out")?;
    let traded_slots: Vec<TradedSlot> =
        decode_json(&row.get::<String, _>("traded_slots"), "traded_slots")?;

    Ok(Transaction {
        id: TransactionId::new(row.get("id")),
        kind,
        week: Week::new(row.get("week")),
        season_entry_id: SeasonEntryId::new(row.get("season_entry_id")),
        trading_partner_id: row
            .get::<Option<i64>, _>("trading_partner_id")
            .map(SeasonEntryId::new),
        units_in,
        units_out,
        old_captain: row.get::<Option<String>, _>("old_captain").map(UnitName::new),
        new_captain: row.get::<Option<String>, _>("new_captain").map(UnitName::new),
        budget_change: row.get("budget_change"),
        drop_refund: row.get("drop_refund"),
        counts_against_limit: row.get::<i64, _>("counts_against_limit") != 0,
        traded_slots,
        created_at: millis_to_utc(row.get("created_at"))?,
    })
}

#[async_trait]
impl RosterStore for Repository {
    async fn get_slot(&self, id: SlotId) -> Result<Option<RosterSlot>, StoreError> {
        let sql = format!("SELECT {} FROM roster_slots WHERE id = ?", SLOT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn list_slots(&self, entry: SeasonEntryId) -> Result<Vec<RosterSlot>, StoreError> {
        let sql = format!(
            "SELECT {} FROM roster_slots WHERE season_entry_id = ? ORDER BY id ASC",
            SLOT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(entry.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(slot_from_row).collect()
    }

    async fn held_units(&self, season: SeasonId) -> Result<HashSet<UnitName>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT rs.unit
            FROM roster_slots rs
            JOIN season_entries se ON se.id = rs.season_entry_id
            JOIN divisions d ON d.id = se.division_id
            WHERE d.season_id = ? AND se.is_active = 1
            "#,
        )
        .bind(season.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UnitName::new(r.get::<String, _>("unit")))
            .collect())
    }

    async fn slots_acquired_by(
        &self,
        transaction: TransactionId,
    ) -> Result<Vec<RosterSlot>, StoreError> {
        let sql = format!(
            "SELECT {} FROM roster_slots WHERE acquired_transaction_id = ? ORDER BY id ASC",
            SLOT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(transaction.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(slot_from_row).collect()
    }
}

#[async_trait]
impl TransactionStore for Repository {
    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ledger_transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_transactions_for_entry(
        &self,
        entry: SeasonEntryId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {} FROM ledger_transactions \
             WHERE season_entry_id = ? OR trading_partner_id = ? \
             ORDER BY created_at ASC, id ASC",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(entry.as_i64())
            .bind(entry.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(transaction_from_row).collect()
    }
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    draft: &TransactionDraft,
) -> Result<Transaction, StoreError> {
    let created_at = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_transactions (
            kind, week, season_entry_id, trading_partner_id, units_in, units_out,
            old_captain, new_captain, budget_change, drop_refund, counts_against_limit,
            traded_slots, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.kind.as_str())
    .bind(draft.week.as_i32())
    .bind(draft.season_entry_id.as_i64())
    .bind(draft.trading_partner_id.map(|p| p.as_i64()))
    .bind(encode_json(&draft.units_in)?)
    .bind(encode_json(&draft.units_out)?)
    .bind(draft.old_captain.as_ref().map(|u| u.as_str().to_string()))
    .bind(draft.new_captain.as_ref().map(|u| u.as_str().to_string()))
    .bind(draft.budget_change)
    .bind(draft.drop_refund)
    .bind(draft.counts_against_limit)
    .bind(encode_json(&draft.traded_slots)?)
    .bind(created_at.timestamp_millis())
    .execute(&mut *conn)
    .await?;

    Ok(draft
        .clone()
        .into_transaction(TransactionId::new(result.last_insert_rowid()), created_at))
}

async fn apply_slot_change(
    conn: &mut SqliteConnection,
    change: &SlotChange,
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
            let held: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*)
                FROM roster_slots rs
                JOIN season_entries se ON se.id = rs.season_entry_id
                JOIN divisions d ON d.id = se.division_id
                WHERE d.season_id = ? AND se.is_active = 1 AND rs.unit = ?
                "#,
            )
            .bind(season_id.as_i64())
            .bind(unit.as_str())
            .fetch_one(&mut *conn)
            .await?;
            if held > 0 {
                return Err(StoreError::UnitHeld {
                    unit: unit.clone(),
                    season: *season_id,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO roster_slots (
                    season_entry_id, unit, price, is_tera_captain,
                    acquired_week, acquired_via, acquired_transaction_id
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(owner.as_i64())
            .bind(unit.as_str())
            .bind(*price)
            .bind(*is_tera_captain)
            .bind(acquired_week.map(|w| w.as_i32()))
            .bind(acquired_via.as_str())
            .bind(appended.map(|t| t.as_i64()))
            .execute(&mut *conn)
            .await?;
        }
        SlotChange::Delete { slot_id, owner } => {
            let result = sqlx::query("DELETE FROM roster_slots WHERE id = ? AND season_entry_id = ?")
                .bind(slot_id.as_i64())
                .bind(owner.as_i64())
                .execute(&mut *conn)
                .await?;
            ensure_owned(result.rows_affected(), *slot_id, *owner)?;
        }
        SlotChange::Move {
            slot_id,
            from,
            to,
            acquired_week,
            acquired_via,
            link,
        } => {
            let transaction_id = match link {
                TransactionLink::Appended => appended,
                TransactionLink::Set(id) => *id,
            };
            let result = sqlx::query(
                r#"
                UPDATE roster_slots
                SET season_entry_id = ?, acquired_week = ?, acquired_via = ?,
                    acquired_transaction_id = ?
                WHERE id = ? AND season_entry_id = ?
                "#,
            )
            .bind(to.as_i64())
            .bind(acquired_week.map(|w| w.as_i32()))
            .bind(acquired_via.map(|m| m.as_str()))
            .bind(transaction_id.map(|t| t.as_i64()))
            .bind(slot_id.as_i64())
            .bind(from.as_i64())
            .execute(&mut *conn)
            .await?;
            ensure_owned(result.rows_affected(), *slot_id, *from)?;
        }
        SlotChange::SetCaptain {
            slot_id,
            owner,
            was_tera_captain,
            is_tera_captain,
            price_delta,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE roster_slots
                SET is_tera_captain = ?, price = price + ?
                WHERE id = ? AND season_entry_id = ? AND is_tera_captain = ?
                "#,
            )
            .bind(*is_tera_captain)
            .bind(*price_delta)
            .bind(slot_id.as_i64())
            .bind(owner.as_i64())
            .bind(*was_tera_captain)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "slot {} of entry {} changed captaincy concurrently",
                    slot_id, owner
                )));
            }
        }
    }
    Ok(())
}

fn ensure_owned(rows: u64, slot: SlotId, owner: SeasonEntryId) -> Result<(), StoreError> {
    if rows == 0 {
        return Err(StoreError::Conflict(format!(
            "slot {} is not owned by entry {}",
            slot, owner
        )));
    }
    Ok(())
}

async fn apply_budget_change(
    conn: &mut SqliteConnection,
    entry: SeasonEntryId,
    delta: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE season_entries
        SET remaining_budget = remaining_budget + ?
        WHERE id = ? AND remaining_budget + ? >= 0
        "#,
    )
    .bind(delta)
    .bind(entry.as_i64())
    .bind(delta)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<i64> =
        sqlx::query_scalar("SELECT remaining_budget FROM season_entries WHERE id = ?")
            .bind(entry.as_i64())
            .fetch_optional(&mut *conn)
            .await?;
    match current {
        Some(budget) => Err(StoreError::BudgetFloor {
            entry,
            shortfall: -(budget + delta),
        }),
        None => Err(StoreError::NotFound(format!("season entry {}", entry))),
    }
}

/// Run one unit of work under an immediate write lock.
///
/// `BEGIN IMMEDIATE` takes the WAL write lock before the first guard read, so a competing
/// writer queues on the busy timeout instead of invalidating this snapshot mid-unit.
async fn apply_immediate(
    pool: &SqlitePool,
    work: UnitOfWork,
) -> Result<Option<Transaction>, StoreError> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    let outcome = match write_unit(&mut *conn, &work).await {
        Ok(appended) => sqlx::query("COMMIT")
            .execute(&mut *conn)
            .await
            .map(|_| appended)
            .map_err(StoreError::from),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(appended) => {
            debug!(
                slot_changes = work.slot_changes.len(),
                transaction_id = ?appended.as_ref().map(|t| t.id),
                "Unit of work committed"
            );
            Ok(appended)
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback, "Rollback after failed unit of work failed");
            }
            Err(e)
        }
    }
}

/// Write order: audit record, slot changes, net budget deltas, record removal.
async fn write_unit(
    conn: &mut SqliteConnection,
    work: &UnitOfWork,
) -> Result<Option<Transaction>, StoreError> {
    let appended = match &work.record {
        RecordChange::Append(draft) => Some(insert_transaction(&mut *conn, draft).await?),
        RecordChange::Remove(_) | RecordChange::None => None,
    };
    let appended_id = appended.as_ref().map(|t| t.id);

    for change in &work.slot_changes {
        if let Err(e) = apply_slot_change(&mut *conn, change, appended_id).await {
            warn!(error = %e, "Unit of work rejected by slot guard");
            return Err(e);
        }
    }

    for (entry, delta) in work.net_budget_changes() {
        if delta != 0 {
            apply_budget_change(&mut *conn, entry, delta).await?;
        }
    }

    if let RecordChange::Remove(id) = &work.record {
        let result = sqlx::query("DELETE FROM ledger_transactions WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("transaction {}", id)));
        }
    }

    Ok(appended)
}

#[async_trait]
impl LedgerWriter for Repository {
    /// Execute a unit of work in one SQLite transaction.
    ///
    /// The work runs on its own task so a dropped request cannot leave the connection
    /// inside an open transaction. Any guard miss rolls the whole unit back.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` when a slot guard fails, `StoreError::BudgetFloor` when
    /// a budget would go negative, and `StoreError::NotFound` when a removed record is gone.
    async fn apply(&self, work: UnitOfWork) -> Result<Option<Transaction>, StoreError> {
        let pool = self.pool.clone();
        tokio::spawn(async move { apply_immediate(&pool, work).await })
            .await
            .map_err(|e| {
                warn!(error = %e, "Unit of work task aborted");
                StoreError::Db(sqlx::Error::WorkerCrashed)
            })?
    }
}
