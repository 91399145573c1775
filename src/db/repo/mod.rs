//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct, the SQLite implementation of the store
//! contracts in `db::store`. Methods are organized across submodules by domain:
//! - `mod.rs` - coaches, seasons, divisions, entries, prices and admin seeding
//! - `roster.rs` - roster slots, ledger transactions and the atomic unit-of-work writer
//! - `matches.rs` - match records, unit performances and rating history

mod matches;
mod roster;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::info;

use crate::db::store::{CoachStore, PriceStore, SeasonStore, StoreError};
use crate::domain::{
    Coach, CoachId, Division, DivisionId, Points, PriceEntry, Season, SeasonEntry, SeasonEntryId,
    SeasonId, UnitName, UnitPerformance, Week,
};

/// Fields needed to register a coach in a division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeasonEntry {
    pub coach_id: Option<CoachId>,
    pub division_id: DivisionId,
    pub team_name: String,
    pub team_abbreviation: String,
    pub budget: Points,
}

/// Fields needed to schedule (and optionally settle) a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMatch {
    pub division_id: DivisionId,
    pub week: Week,
    pub entry1: SeasonEntryId,
    pub entry2: SeasonEntryId,
    pub winner: Option<SeasonEntryId>,
    #[serde(default)]
    pub differential1: i32,
    #[serde(default)]
    pub differential2: i32,
    pub replay_url: Option<String>,
    pub played_at: Option<DateTime<Utc>>,
}

/// A settled result for an existing match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: SeasonEntryId,
    pub differential1: i32,
    pub differential2: i32,
    pub replay_url: Option<String>,
    pub played_at: Option<DateTime<Utc>>,
    pub performances: Vec<UnitPerformance>,
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Administrative seeding
    // =========================================================================

    pub async fn create_coach(&self, name: &str) -> Result<Coach, StoreError> {
        let result = sqlx::query("INSERT INTO coaches (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Coach {
            id: CoachId::new(result.last_insert_rowid()),
            name: name.to_string(),
            rating: None,
        })
    }

    pub async fn create_season(&self, ordinal: i32, name: &str) -> Result<Season, StoreError> {
        let result = sqlx::query("INSERT INTO seasons (ordinal, name) VALUES (?, ?)")
            .bind(ordinal)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Season {
            id: SeasonId::new(result.last_insert_rowid()),
            ordinal,
            name: name.to_string(),
        })
    }

    pub async fn create_division(
        &self,
        season_id: SeasonId,
        name: &str,
    ) -> Result<Division, StoreError> {
        let result = sqlx::query("INSERT INTO divisions (season_id, name) VALUES (?, ?)")
            .bind(season_id.as_i64())
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(Division {
            id: DivisionId::new(result.last_insert_rowid()),
            season_id,
            name: name.to_string(),
        })
    }

    pub async fn create_entry(&self, new: &NewSeasonEntry) -> Result<SeasonEntry, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO season_entries
                (coach_id, division_id, team_name, team_abbreviation, remaining_budget, is_active)
            VALUES (?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(new.coach_id.map(|c| c.as_i64()))
        .bind(new.division_id.as_i64())
        .bind(&new.team_name)
        .bind(&new.team_abbreviation)
        .bind(new.budget)
        .execute(&self.pool)
        .await?;

        Ok(SeasonEntry {
            id: SeasonEntryId::new(result.last_insert_rowid()),
            coach_id: new.coach_id,
            division_id: new.division_id,
            team_name: new.team_name.clone(),
            team_abbreviation: new.team_abbreviation.clone(),
            remaining_budget: new.budget,
            is_active: true,
            replaced_by: None,
        })
    }

    /// Hand an active entry over to a new coach mid-season.
    ///
    /// The old entry is deactivated and linked forward; its roster and remaining budget move
    /// to the successor. `new.budget` is ignored in favour of the carried-over budget.
    pub async fn replace_entry(
        &self,
        old_id: SeasonEntryId,
        new: &NewSeasonEntry,
    ) -> Result<SeasonEntry, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT division_id, remaining_budget, is_active FROM season_entries WHERE id = ?",
        )
        .bind(old_id.as_i64())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("season entry {}", old_id)))?;

        let division_id = DivisionId::new(row.get("division_id"));
        let budget: i64 = row.get("remaining_budget");
        if row.get::<i64, _>("is_active") == 0 {
            return Err(StoreError::Conflict(format!(
                "season entry {} is already inactive",
                old_id
            )));
        }

        sqlx::query("UPDATE season_entries SET is_active = 0 WHERE id = ?")
            .bind(old_id.as_i64())
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO season_entries
                (coach_id, division_id, team_name, team_abbreviation, remaining_budget, is_active)
            VALUES (?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(new.coach_id.map(|c| c.as_i64()))
        .bind(division_id.as_i64())
        .bind(&new.team_name)
        .bind(&new.team_abbreviation)
        .bind(budget)
        .execute(&mut *tx)
        .await?;
        let new_id = SeasonEntryId::new(inserted.last_insert_rowid());

        sqlx::query("UPDATE season_entries SET replaced_by = ? WHERE id = ?")
            .bind(new_id.as_i64())
            .bind(old_id.as_i64())
            .execute(&mut *tx)
            .await?;

        let moved = sqlx::query("UPDATE roster_slots SET season_entry_id = ? WHERE season_entry_id = ?")
            .bind(new_id.as_i64())
            .bind(old_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(old = %old_id, new = %new_id, slots = moved.rows_affected(), "Season entry replaced");

        Ok(SeasonEntry {
            id: new_id,
            coach_id: new.coach_id,
            division_id,
            team_name: new.team_name.clone(),
            team_abbreviation: new.team_abbreviation.clone(),
            remaining_budget: budget,
            is_active: true,
            replaced_by: None,
        })
    }

    /// Insert or overwrite the price of a unit for a season.
    pub async fn upsert_price(&self, price: &PriceEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO price_entries (season_id, unit, price, tera_banned, captain_surcharge, ban_reason)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(season_id, unit) DO UPDATE SET
                price = excluded.price,
                tera_banned = excluded.tera_banned,
                captain_surcharge = excluded.captain_surcharge,
                ban_reason = excluded.ban_reason
            "#,
        )
        .bind(price.season_id.as_i64())
        .bind(price.unit.as_str())
        .bind(price.price)
        .bind(price.tera_banned)
        .bind(price.captain_surcharge)
        .bind(price.ban_reason.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Season the entry plays in, via its division.
    pub async fn season_of_entry(
        &self,
        entry: SeasonEntryId,
    ) -> Result<Option<SeasonId>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT d.season_id
            FROM season_entries se
            JOIN divisions d ON d.id = se.division_id
            WHERE se.id = ?
            "#,
        )
        .bind(entry.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SeasonId::new(r.get("season_id"))))
    }
}

pub(crate) fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

pub(crate) fn parse_column<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    T::from_str(raw).map_err(StoreError::Corrupt)
}

fn coach_from_row(row: &SqliteRow) -> Coach {
    Coach {
        id: CoachId::new(row.get("id")),
        name: row.get("name"),
        rating: row.get("rating"),
    }
}

fn entry_from_row(row: &SqliteRow) -> SeasonEntry {
    SeasonEntry {
        id: SeasonEntryId::new(row.get("id")),
        coach_id: row.get::<Option<i64>, _>("coach_id").map(CoachId::new),
        division_id: DivisionId::new(row.get("division_id")),
        team_name: row.get("team_name"),
        team_abbreviation: row.get("team_abbreviation"),
        remaining_budget: row.get("remaining_budget"),
        is_active: row.get::<i64, _>("is_active") != 0,
        replaced_by: row
            .get::<Option<i64>, _>("replaced_by")
            .map(SeasonEntryId::new),
    }
}

fn price_from_row(row: &SqliteRow) -> PriceEntry {
    PriceEntry {
        season_id: SeasonId::new(row.get("season_id")),
        unit: UnitName::new(row.get::<String, _>("unit")),
        price: row.get("price"),
        tera_banned: row.get::<i64, _>("tera_banned") != 0,
        captain_surcharge: row.get("captain_surcharge"),
        ban_reason: row.get("ban_reason"),
    }
}

const ENTRY_COLUMNS: &str =
    "id, coach_id, division_id, team_name, team_abbreviation, remaining_budget, is_active, replaced_by";

#[async_trait]
impl CoachStore for Repository {
    async fn get_coach(&self, id: CoachId) -> Result<Option<Coach>, StoreError> {
        let row = sqlx::query("SELECT id, name, rating FROM coaches WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(coach_from_row))
    }

    async fn list_coaches(&self) -> Result<Vec<Coach>, StoreError> {
        let rows = sqlx::query("SELECT id, name, rating FROM coaches ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(coach_from_row).collect())
    }
}

#[async_trait]
impl SeasonStore for Repository {
    async fn get_season(&self, id: SeasonId) -> Result<Option<Season>, StoreError> {
        let row = sqlx::query("SELECT id, ordinal, name FROM seasons WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Season {
            id: SeasonId::new(r.get("id")),
            ordinal: r.get("ordinal"),
            name: r.get("name"),
        }))
    }

    async fn get_division(&self, id: DivisionId) -> Result<Option<Division>, StoreError> {
        let row = sqlx::query("SELECT id, season_id, name FROM divisions WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Division {
            id: DivisionId::new(r.get("id")),
            season_id: SeasonId::new(r.get("season_id")),
            name: r.get("name"),
        }))
    }

    async fn list_divisions(&self, season: SeasonId) -> Result<Vec<Division>, StoreError> {
        let rows =
            sqlx::query("SELECT id, season_id, name FROM divisions WHERE season_id = ? ORDER BY id ASC")
                .bind(season.as_i64())
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .iter()
            .map(|r| Division {
                id: DivisionId::new(r.get("id")),
                season_id: SeasonId::new(r.get("season_id")),
                name: r.get("name"),
            })
            .collect())
    }

    async fn get_entry(&self, id: SeasonEntryId) -> Result<Option<SeasonEntry>, StoreError> {
        let sql = format!("SELECT {} FROM season_entries WHERE id = ?", ENTRY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(entry_from_row))
    }

    async fn list_entries_in_division(
        &self,
        division: DivisionId,
    ) -> Result<Vec<SeasonEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM season_entries WHERE division_id = ? ORDER BY id ASC",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(division.as_i64())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }
}

#[async_trait]
impl PriceStore for Repository {
    async fn get_price(
        &self,
        season: SeasonId,
        unit: &UnitName,
    ) -> Result<Option<PriceEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT season_id, unit, price, tera_banned, captain_surcharge, ban_reason
            FROM price_entries
            WHERE season_id = ? AND unit = ?
            "#,
        )
        .bind(season.as_i64())
        .bind(unit.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(price_from_row))
    }

    async fn list_prices(&self, season: SeasonId) -> Result<Vec<PriceEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT season_id, unit, price, tera_banned, captain_surcharge, ban_reason
            FROM price_entries
            WHERE season_id = ?
            ORDER BY unit ASC
            "#,
        )
        .bind(season.as_i64())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(price_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::store::RosterStore;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_create_and_get_entry() {
        let (repo, _temp) = setup_test_db().await;
        let coach = repo.create_coach("ash").await.unwrap();
        let season = repo.create_season(1, "Season 1").await.unwrap();
        let division = repo.create_division(season.id, "Premier").await.unwrap();

        let entry = repo
            .create_entry(&NewSeasonEntry {
                coach_id: Some(coach.id),
                division_id: division.id,
                team_name: "Pallet Pidgeys".to_string(),
                team_abbreviation: "PP".to_string(),
                budget: 100,
            })
            .await
            .unwrap();

        let loaded = repo.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(loaded, entry);
        assert_eq!(repo.season_of_entry(entry.id).await.unwrap(), Some(season.id));
    }

    #[tokio::test]
    async fn test_second_active_entry_for_same_coach_rejected() {
        let (repo, _temp) = setup_test_db().await;
        let coach = repo.create_coach("ash").await.unwrap();
        let season = repo.create_season(1, "Season 1").await.unwrap();
        let division = repo.create_division(season.id, "Premier").await.unwrap();
        let new = NewSeasonEntry {
            coach_id: Some(coach.id),
            division_id: division.id,
            team_name: "A".to_string(),
            team_abbreviation: "A".to_string(),
            budget: 100,
        };

        repo.create_entry(&new).await.unwrap();
        assert!(repo.create_entry(&new).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_price_overwrites() {
        let (repo, _temp) = setup_test_db().await;
        let season = repo.create_season(1, "Season 1").await.unwrap();
        let mut price = PriceEntry {
            season_id: season.id,
            unit: UnitName::new("Gholdengo"),
            price: 15,
            tera_banned: false,
            captain_surcharge: Some(2),
            ban_reason: None,
        };
        repo.upsert_price(&price).await.unwrap();
        price.tera_banned = true;
        price.price = 16;
        repo.upsert_price(&price).await.unwrap();

        let loaded = repo.get_price(season.id, &price.unit).await.unwrap().unwrap();
        assert_eq!(loaded, price);
        assert_eq!(repo.list_prices(season.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_entry_moves_roster_and_budget() {
        let (repo, _temp) = setup_test_db().await;
        let ash = repo.create_coach("ash").await.unwrap();
        let gary = repo.create_coach("gary").await.unwrap();
        let season = repo.create_season(1, "Season 1").await.unwrap();
        let division = repo.create_division(season.id, "Premier").await.unwrap();
        let old = repo
            .create_entry(&NewSeasonEntry {
                coach_id: Some(ash.id),
                division_id: division.id,
                team_name: "Old".to_string(),
                team_abbreviation: "OLD".to_string(),
                budget: 40,
            })
            .await
            .unwrap();
        sqlx::query("INSERT INTO roster_slots (season_entry_id, unit, price) VALUES (?, 'Skarmory', 8)")
            .bind(old.id.as_i64())
            .execute(repo.pool())
            .await
            .unwrap();

        let new = repo
            .replace_entry(
                old.id,
                &NewSeasonEntry {
                    coach_id: Some(gary.id),
                    division_id: division.id,
                    team_name: "New".to_string(),
                    team_abbreviation: "NEW".to_string(),
                    budget: 999,
                },
            )
            .await
            .unwrap();

        assert_eq!(new.remaining_budget, 40);
        let old_loaded = repo.get_entry(old.id).await.unwrap().unwrap();
        assert!(!old_loaded.is_active);
        assert_eq!(old_loaded.replaced_by, Some(new.id));
        assert_eq!(repo.list_slots(new.id).await.unwrap().len(), 1);
        assert!(repo.list_slots(old.id).await.unwrap().is_empty());

        let third = NewSeasonEntry {
            coach_id: None,
            division_id: division.id,
            team_name: "X".to_string(),
            team_abbreviation: "X".to_string(),
            budget: 0,
        };
        let again = repo.replace_entry(old.id, &third).await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
    }
}
