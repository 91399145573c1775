//! Match records, per-unit performances and rating history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{info, warn};

use super::{millis_to_utc, MatchResult, NewMatch, Repository};
use crate::db::store::{MatchStore, RatingStore, StoreError};
use crate::domain::{
    CoachId, DivisionId, MatchId, MatchRecord, MatchSide, RatedMatch, SeasonEntryId, SeasonId,
    UnitName, UnitPerformance, Week,
};
use crate::engine::RatingHistoryEntry;

const MATCH_COLUMNS: &str = "id, season_id, division_id, week, entry1_id, entry2_id, winner_id, \
                             differential1, differential2, replay_url, played_at";

fn match_from_row(row: &SqliteRow) -> Result<MatchRecord, StoreError> {
    let played_at = match row.get::<Option<i64>, _>("played_at") {
        Some(ms) => Some(millis_to_utc(ms)?),
        None => None,
    };

    Ok(MatchRecord {
        id: MatchId::new(row.get("id")),
        season_id: SeasonId::new(row.get("season_id")),
        division_id: DivisionId::new(row.get("division_id")),
        week: Week::new(row.get("week")),
        entry1: SeasonEntryId::new(row.get("entry1_id")),
        entry2: SeasonEntryId::new(row.get("entry2_id")),
        winner: row.get::<Option<i64>, _>("winner_id").map(SeasonEntryId::new),
        differential1: row.get("differential1"),
        differential2: row.get("differential2"),
        replay_url: row.get("replay_url"),
        played_at,
    })
}

impl Repository {
    /// Schedule a match in a division; the season is taken from the division.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown division and `StoreError::Conflict`
    /// when an entry does not belong to the division or a winner is not a participant.
    pub async fn insert_match(&self, new: &NewMatch) -> Result<MatchRecord, StoreError> {
        if new.entry1 == new.entry2 {
            return Err(StoreError::Conflict(
                "a match needs two different entries".to_string(),
            ));
        }
        if let Some(w) = new.winner {
            if w != new.entry1 && w != new.entry2 {
                return Err(StoreError::Conflict(format!(
                    "winner {} did not play this match",
                    w
                )));
            }
        }

        let season_id: i64 =
            sqlx::query_scalar("SELECT season_id FROM divisions WHERE id = ?")
                .bind(new.division_id.as_i64())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("division {}", new.division_id)))?;

        let in_division: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM season_entries WHERE division_id = ? AND id IN (?, ?)",
        )
        .bind(new.division_id.as_i64())
        .bind(new.entry1.as_i64())
        .bind(new.entry2.as_i64())
        .fetch_one(&self.pool)
        .await?;
        if in_division != 2 {
            return Err(StoreError::Conflict(format!(
                "entries {} and {} must both belong to division {}",
                new.entry1, new.entry2, new.division_id
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO matches (
                season_id, division_id, week, entry1_id, entry2_id, winner_id,
                differential1, differential2, replay_url, played_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(season_id)
        .bind(new.division_id.as_i64())
        .bind(new.week.as_i32())
        .bind(new.entry1.as_i64())
        .bind(new.entry2.as_i64())
        .bind(new.winner.map(|w| w.as_i64()))
        .bind(new.differential1)
        .bind(new.differential2)
        .bind(new.replay_url.as_deref())
        .bind(new.played_at.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;

        Ok(MatchRecord {
            id: MatchId::new(result.last_insert_rowid()),
            season_id: SeasonId::new(season_id),
            division_id: new.division_id,
            week: new.week,
            entry1: new.entry1,
            entry2: new.entry2,
            winner: new.winner,
            differential1: new.differential1,
            differential2: new.differential2,
            replay_url: new.replay_url.clone(),
            played_at: new.played_at,
        })
    }

    /// Settle a match and replace its unit performance lines in one transaction.
    pub async fn record_match_result(
        &self,
        id: MatchId,
        result: &MatchResult,
    ) -> Result<MatchRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", id)))?;
        let mut record = match_from_row(&row)?;

        if result.winner != record.entry1 && result.winner != record.entry2 {
            return Err(StoreError::Conflict(format!(
                "winner {} did not play match {}",
                result.winner, id
            )));
        }

        sqlx::query(
            r#"
            UPDATE matches
            SET winner_id = ?, differential1 = ?, differential2 = ?, replay_url = ?, played_at = ?
            WHERE id = ?
            "#,
        )
        .bind(result.winner.as_i64())
        .bind(result.differential1)
        .bind(result.differential2)
        .bind(result.replay_url.as_deref())
        .bind(result.played_at.map(|t| t.timestamp_millis()))
        .bind(id.as_i64())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM unit_performances WHERE match_id = ?")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;

        for perf in &result.performances {
            sqlx::query(
                r#"
                INSERT INTO unit_performances (match_id, season_entry_id, unit, kills, deaths)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(match_id, season_entry_id, unit) DO UPDATE SET
                    kills = excluded.kills,
                    deaths = excluded.deaths
                "#,
            )
            .bind(id.as_i64())
            .bind(perf.season_entry_id.as_i64())
            .bind(perf.unit.as_str())
            .bind(perf.kills)
            .bind(perf.deaths)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        record.winner = Some(result.winner);
        record.differential1 = result.differential1;
        record.differential2 = result.differential2;
        record.replay_url = result.replay_url.clone();
        record.played_at = result.played_at;

        info!(
            match_id = %id,
            winner = %result.winner,
            performances = result.performances.len(),
            "Match result recorded"
        );
        Ok(record)
    }
}

#[async_trait]
impl MatchStore for Repository {
    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
        let sql = format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(match_from_row).transpose()
    }

    async fn list_rated_matches(&self) -> Result<Vec<RatedMatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.week, m.entry1_id, m.entry2_id, m.winner_id, m.played_at,
                   s.ordinal AS season_ordinal, d.name AS division_name,
                   e1.coach_id AS coach1_id, e2.coach_id AS coach2_id
            FROM matches m
            JOIN seasons s ON s.id = m.season_id
            JOIN divisions d ON d.id = m.division_id
            LEFT JOIN season_entries e1 ON e1.id = m.entry1_id
            LEFT JOIN season_entries e2 ON e2.id = m.entry2_id
            WHERE m.winner_id IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rated = Vec::with_capacity(rows.len());
        for row in &rows {
            let match_id = MatchId::new(row.get("id"));
            let winner: i64 = row.get("winner_id");
            let winner = if winner == row.get::<i64, _>("entry1_id") {
                MatchSide::First
            } else if winner == row.get::<i64, _>("entry2_id") {
                MatchSide::Second
            } else {
                warn!(match_id = %match_id, "Winner is not a participant, skipping");
                continue;
            };
            let played_at = match row.get::<Option<i64>, _>("played_at") {
                Some(ms) => Some(millis_to_utc(ms)?),
                None => None,
            };

            rated.push(RatedMatch {
                match_id,
                season_ordinal: row.get("season_ordinal"),
                division_name: row.get("division_name"),
                week: Week::new(row.get("week")),
                coach1: row.get::<Option<i64>, _>("coach1_id").map(CoachId::new),
                coach2: row.get::<Option<i64>, _>("coach2_id").map(CoachId::new),
                winner,
                played_at,
            });
        }
        Ok(rated)
    }

    async fn list_division_matches(
        &self,
        division: DivisionId,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM matches WHERE division_id = ? ORDER BY week ASC, id ASC",
            MATCH_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(division.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(match_from_row).collect()
    }

    async fn list_unit_performances(
        &self,
        season: SeasonId,
    ) -> Result<Vec<UnitPerformance>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT up.match_id, up.season_entry_id, up.unit, up.kills, up.deaths
            FROM unit_performances up
            JOIN matches m ON m.id = up.match_id
            WHERE m.season_id = ?
            ORDER BY up.match_id ASC, up.season_entry_id ASC, up.unit ASC
            "#,
        )
        .bind(season.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| UnitPerformance {
                match_id: MatchId::new(r.get("match_id")),
                season_entry_id: SeasonEntryId::new(r.get("season_entry_id")),
                unit: UnitName::new(r.get::<String, _>("unit")),
                kills: r.get("kills"),
                deaths: r.get("deaths"),
            })
            .collect())
    }
}

#[async_trait]
impl RatingStore for Repository {
    /// Swap the whole rating history in one transaction.
    ///
    /// Only coaches present in `final_ratings` get a new rating; everyone else keeps theirs.
    async fn replace_rating_history(
        &self,
        history: &[RatingHistoryEntry],
        final_ratings: &BTreeMap<CoachId, f64>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rating_history")
            .execute(&mut *tx)
            .await?;

        for entry in history {
            sqlx::query(
                "INSERT INTO rating_history (coach_id, rating, match_id, recorded_at) VALUES (?, ?, ?, ?)",
            )
            .bind(entry.coach_id.as_i64())
            .bind(entry.rating)
            .bind(entry.match_id.map(|m| m.as_i64()))
            .bind(entry.recorded_at.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        for (coach, rating) in final_ratings {
            sqlx::query("UPDATE coaches SET rating = ? WHERE id = ?")
                .bind(*rating)
                .bind(coach.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn rating_history(
        &self,
        coach: CoachId,
    ) -> Result<Vec<RatingHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT coach_id, rating, match_id, recorded_at FROM rating_history WHERE coach_id = ? ORDER BY id ASC",
        )
        .bind(coach.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(RatingHistoryEntry {
                    coach_id: CoachId::new(r.get("coach_id")),
                    rating: r.get("rating"),
                    match_id: r.get::<Option<i64>, _>("match_id").map(MatchId::new),
                    recorded_at: millis_to_utc(r.get("recorded_at"))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::db::repo::NewSeasonEntry;
    use crate::db::store::CoachStore;
    use crate::domain::SeasonEntry;
    use chrono::{TimeZone, Utc};
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

    async fn seed(repo: &Repository) -> (DivisionId, SeasonEntry, SeasonEntry) {
        let season = repo.create_season(2, "Season 2").await.unwrap();
        let division = repo.create_division(season.id, "Ultra").await.unwrap();
        let mut entries = Vec::new();
        for name in ["Red", "Blue"] {
            let coach = repo.create_coach(name).await.unwrap();
            entries.push(
                repo.create_entry(&NewSeasonEntry {
                    coach_id: Some(coach.id),
                    division_id: division.id,
                    team_name: name.to_string(),
                    team_abbreviation: name.to_string(),
                    budget: 100,
                })
                .await
                .unwrap(),
            );
        }
        let blue = entries.pop().unwrap();
        let red = entries.pop().unwrap();
        (division.id, red, blue)
    }

    fn scheduled(division: DivisionId, a: SeasonEntryId, b: SeasonEntryId) -> NewMatch {
        NewMatch {
            division_id: division,
            week: Week::new(1),
            entry1: a,
            entry2: b,
            winner: None,
            differential1: 0,
            differential2: 0,
            replay_url: None,
            played_at: None,
        }
    }

    #[tokio::test]
    async fn test_rated_matches_only_include_completed() {
        let (repo, _temp) = setup_test_db().await;
        let (division, red, blue) = seed(&repo).await;

        repo.insert_match(&scheduled(division, red.id, blue.id)).await.unwrap();
        let mut done = scheduled(division, red.id, blue.id);
        done.winner = Some(blue.id);
        done.differential1 = -2;
        done.differential2 = 2;
        let done = repo.insert_match(&done).await.unwrap();

        let rated = repo.list_rated_matches().await.unwrap();
        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].match_id, done.id);
        assert_eq!(rated[0].winner, MatchSide::Second);
        assert_eq!(rated[0].season_ordinal, 2);
        assert_eq!(rated[0].division_name, "Ultra");
        assert_eq!(rated[0].coach1, red.coach_id);
    }

    #[tokio::test]
    async fn test_insert_match_rejects_foreign_winner() {
        let (repo, _temp) = setup_test_db().await;
        let (division, red, blue) = seed(&repo).await;
        let mut m = scheduled(division, red.id, blue.id);
        m.winner = Some(SeasonEntryId::new(999));
        assert!(matches!(
            repo.insert_match(&m).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_record_result_replaces_performances() {
        let (repo, _temp) = setup_test_db().await;
        let (division, red, blue) = seed(&repo).await;
        let m = repo.insert_match(&scheduled(division, red.id, blue.id)).await.unwrap();
        let played = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();

        let perf = |unit: &str, kills| UnitPerformance {
            match_id: m.id,
            season_entry_id: red.id,
            unit: UnitName::new(unit),
            kills,
            deaths: 0,
        };
        let mut result = MatchResult {
            winner: red.id,
            differential1: 3,
            differential2: -3,
            replay_url: Some("https://replays.example/abc".to_string()),
            played_at: Some(played),
            performances: vec![perf("Rillaboom", 2), perf("Heatran", 1)],
        };
        repo.record_match_result(m.id, &result).await.unwrap();
        result.performances = vec![perf("Rillaboom", 3)];
        let settled = repo.record_match_result(m.id, &result).await.unwrap();

        assert_eq!(settled.winner, Some(red.id));
        assert_eq!(repo.get_match(m.id).await.unwrap().unwrap(), settled);
        let perfs = repo.list_unit_performances(settled.season_id).await.unwrap();
        assert_eq!(perfs.len(), 1);
        assert_eq!(perfs[0].kills, 3);
    }

    #[tokio::test]
    async fn test_replace_rating_history_keeps_unlisted_coaches() {
        let (repo, _temp) = setup_test_db().await;
        let (_division, red, blue) = seed(&repo).await;
        let red_coach = red.coach_id.unwrap();
        let blue_coach = blue.coach_id.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();

        let mut finals = BTreeMap::new();
        finals.insert(red_coach, 1016.0);
        finals.insert(blue_coach, 984.0);
        let history = vec![
            RatingHistoryEntry {
                coach_id: red_coach,
                rating: 1016.0,
                match_id: None,
                recorded_at: at,
            },
            RatingHistoryEntry {
                coach_id: blue_coach,
                rating: 984.0,
                match_id: None,
                recorded_at: at,
            },
        ];
        repo.replace_rating_history(&history, &finals).await.unwrap();
        assert_eq!(repo.rating_history(red_coach).await.unwrap().len(), 1);

        repo.replace_rating_history(&[], &BTreeMap::new()).await.unwrap();
        assert!(repo.rating_history(red_coach).await.unwrap().is_empty());
        assert_eq!(repo.get_coach(blue_coach).await.unwrap().unwrap().rating, Some(984.0));
    }
}
