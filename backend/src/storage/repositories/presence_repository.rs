use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::Period;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::push_id_list;
use crate::domain::models::{presence::Presence, utc_from_millis};
use crate::storage::connection::DbConnection;
use crate::storage::traits::PresenceStorage;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Repository for the `presence` table
#[derive(Clone)]
pub struct PresenceRepository {
    db: DbConnection,
}

impl PresenceRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn presence_from_row(row: &SqliteRow) -> Result<Presence> {
        let raw_day: String = row.get("day");
        let raw_period: String = row.get("period");

        Ok(Presence {
            id: row.get("id"),
            user_id: row.get("user_id"),
            day: NaiveDate::parse_from_str(&raw_day, DAY_FORMAT)
                .with_context(|| format!("Invalid stored presence day: {}", raw_day))?,
            period: raw_period.parse::<Period>().map_err(|e| anyhow!(e))?,
            created_at: utc_from_millis(row.get("created_at"))?,
        })
    }
}

#[async_trait]
impl PresenceStorage for PresenceRepository {
    async fn create_presence(
        &self,
        user_id: i64,
        day: NaiveDate,
        period: Period,
        created_at: DateTime<Utc>,
    ) -> Result<Presence> {
        let created_at_ms = created_at.timestamp_millis();
        let id = sqlx::query("INSERT INTO presence (user_id, day, period, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(day.format(DAY_FORMAT).to_string())
            .bind(period.as_str())
            .bind(created_at_ms)
            .execute(self.db.pool())
            .await?
            .last_insert_rowid();

        Ok(Presence {
            id,
            user_id,
            day,
            period,
            created_at: utc_from_millis(created_at_ms)?,
        })
    }

    async fn find_presence(&self, user_id: i64, day: NaiveDate, period: Period) -> Result<Option<Presence>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, day, period, created_at
            FROM presence
            WHERE user_id = ? AND day = ? AND period = ?
            "#,
        )
        .bind(user_id)
        .bind(day.format(DAY_FORMAT).to_string())
        .bind(period.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::presence_from_row).transpose()
    }

    async fn list_presence_for_users(&self, user_ids: &[i64]) -> Result<Vec<Presence>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT id, user_id, day, period, created_at FROM presence WHERE user_id IN ");
        push_id_list(&mut query, user_ids);
        query.push(" ORDER BY day DESC, id DESC");

        let rows = query.build().fetch_all(self.db.pool()).await?;
        rows.iter().map(Self::presence_from_row).collect()
    }

    async fn delete_presence(&self, presence_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM presence WHERE id = ?")
            .bind(presence_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn setup_test() -> (PresenceRepository, i64) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let user_id = sqlx::query("INSERT INTO users (username, password_hash) VALUES ('ana', 'x')")
            .execute(db.pool())
            .await
            .unwrap()
            .last_insert_rowid();
        (PresenceRepository::new(db), user_id)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn noon(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_presence() {
        let (repo, user) = setup_test().await;
        let created = repo.create_presence(user, day(2), Period::Morning, noon(2)).await.unwrap();

        let found = repo.find_presence(user, day(2), Period::Morning).await.unwrap();
        assert_eq!(found, Some(created));
        assert!(repo.find_presence(user, day(2), Period::Night).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_presence_violates_unique_index() {
        let (repo, user) = setup_test().await;
        repo.create_presence(user, day(2), Period::Night, noon(2)).await.unwrap();

        let duplicate = repo.create_presence(user, day(2), Period::Night, noon(2)).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let (repo, user) = setup_test().await;
        repo.create_presence(user, day(1), Period::Morning, noon(1)).await.unwrap();
        let latest = repo.create_presence(user, day(3), Period::Night, noon(3)).await.unwrap();

        let listed = repo.list_presence_for_users(&[user]).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], latest);

        assert!(repo.delete_presence(latest.id).await.unwrap());
        assert!(!repo.delete_presence(latest.id).await.unwrap());
        assert_eq!(repo.list_presence_for_users(&[user]).await.unwrap().len(), 1);
    }
}
