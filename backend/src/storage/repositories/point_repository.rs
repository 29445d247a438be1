use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use super::push_id_list;
use crate::domain::models::{point::Point, utc_from_millis};
use crate::storage::connection::DbConnection;
use crate::storage::traits::PointStorage;

/// Repository for the `points` table
#[derive(Clone)]
pub struct PointRepository {
    db: DbConnection,
}

impl PointRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn point_from_row(row: &SqliteRow) -> Result<Point> {
        Ok(Point {
            id: row.get("id"),
            class_id: row.get("class_id"),
            user_id: row.get("user_id"),
            created_at: utc_from_millis(row.get("created_at"))?,
        })
    }

    async fn count_grouped(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<HashMap<i64, u64>> {
        query.push(" GROUP BY class_id");
        let rows = query.build().fetch_all(self.db.pool()).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let class_id: i64 = row.get("class_id");
                let count: i64 = row.get("n");
                (class_id, count as u64)
            })
            .collect())
    }
}

#[async_trait]
impl PointStorage for PointRepository {
    async fn insert_point_within_limit(
        &self,
        class_id: i64,
        user_id: Option<i64>,
        created_at: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> Result<Option<Point>> {
        let created_at_ms = created_at.timestamp_millis();

        // SQLite runs a single statement atomically, so two concurrent awards
        // cannot both observe a count below the limit.
        let result = sqlx::query(
            r#"
            INSERT INTO points (class_id, user_id, created_at)
            SELECT ?, ?, ?
            WHERE (
                SELECT COUNT(*) FROM points
                WHERE class_id = ? AND created_at >= ? AND created_at <= ?
            ) < ?
            "#,
        )
        .bind(class_id)
        .bind(user_id)
        .bind(created_at_ms)
        .bind(class_id)
        .bind(window_start.timestamp_millis())
        .bind(created_at_ms)
        .bind(i64::from(limit))
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Point {
            id: result.last_insert_rowid(),
            class_id,
            user_id,
            created_at: utc_from_millis(created_at_ms)?,
        }))
    }

    async fn count_points_in_window(&self, class_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM points
            WHERE class_id = ? AND created_at >= ? AND created_at <= ?
            "#,
        )
        .bind(class_id)
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_one(self.db.pool())
        .await?
        .get("n");

        Ok(count as u64)
    }

    async fn count_points_in_window_by_child(
        &self,
        class_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<i64, u64>> {
        if class_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::new("SELECT class_id, COUNT(*) AS n FROM points WHERE class_id IN ");
        push_id_list(&mut query, class_ids);
        query
            .push(" AND created_at >= ")
            .push_bind(from.timestamp_millis())
            .push(" AND created_at <= ")
            .push_bind(to.timestamp_millis());

        self.count_grouped(query).await
    }

    async fn count_points_by_child(&self, class_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        if class_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::new("SELECT class_id, COUNT(*) AS n FROM points WHERE class_id IN ");
        push_id_list(&mut query, class_ids);

        self.count_grouped(query).await
    }

    async fn latest_point(&self, class_id: i64) -> Result<Option<Point>> {
        let row = sqlx::query(
            r#"
            SELECT id, class_id, user_id, created_at
            FROM points
            WHERE class_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(class_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::point_from_row).transpose()
    }

    async fn list_points(&self, class_id: i64, limit: Option<u32>) -> Result<Vec<Point>> {
        // LIMIT -1 means "no limit" in SQLite
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query(
            r#"
            SELECT id, class_id, user_id, created_at
            FROM points
            WHERE class_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(class_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::point_from_row).collect()
    }

    async fn list_points_for_children(&self, class_ids: &[i64]) -> Result<Vec<Point>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            QueryBuilder::new("SELECT id, class_id, user_id, created_at FROM points WHERE class_id IN ");
        push_id_list(&mut query, class_ids);
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(self.db.pool()).await?;
        rows.iter().map(Self::point_from_row).collect()
    }

    async fn delete_point(&self, point_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM points WHERE id = ?")
            .bind(point_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all_points(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM points").execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }

    async fn assign_unattributed_points(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE points SET user_id = ? WHERE user_id IS NULL")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
