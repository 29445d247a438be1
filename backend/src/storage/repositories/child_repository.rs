use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection};

use super::push_id_list;
use crate::domain::models::{
    child::{Child, NewChild},
    point::PointSeed,
};
use crate::storage::connection::DbConnection;
use crate::storage::traits::{ChildStorage, DuplicateChildName};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Repository for the `classes` table (children)
#[derive(Clone)]
pub struct ChildRepository {
    db: DbConnection,
}

impl ChildRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn child_from_row(row: &SqliteRow) -> Result<Child> {
        let raw_date: String = row.get("date_of_birth");
        let date_of_birth = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
            .with_context(|| format!("Invalid stored date of birth: {}", raw_date))?;

        Ok(Child {
            id: row.get("id"),
            name: row.get("name"),
            date_of_birth,
        })
    }

    /// Insert one child and its seed points on an open transaction
    async fn insert_child(conn: &mut SqliteConnection, child: &NewChild) -> Result<Child> {
        let id = sqlx::query("INSERT INTO classes (name, date_of_birth) VALUES (?, ?)")
            .bind(&child.name)
            .bind(child.date_of_birth.format(DATE_FORMAT).to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| name_conflict(e, &child.name))?
            .last_insert_rowid();

        Self::insert_seed_points(conn, id, &child.seed_points).await?;

        Ok(Child {
            id,
            name: child.name.clone(),
            date_of_birth: child.date_of_birth,
        })
    }

    async fn insert_seed_points(conn: &mut SqliteConnection, class_id: i64, seeds: &[PointSeed]) -> Result<()> {
        for seed in seeds {
            sqlx::query("INSERT INTO points (class_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(class_id)
                .bind(seed.user_id)
                .bind(seed.created_at.timestamp_millis())
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChildStorage for ChildRepository {
    async fn create_child(&self, child: &NewChild) -> Result<Child> {
        let mut tx = self.db.pool().begin().await?;
        let created = Self::insert_child(&mut tx, child).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn create_children(&self, children: &[NewChild]) -> Result<Vec<Child>> {
        let mut tx = self.db.pool().begin().await?;

        let mut created = Vec::with_capacity(children.len());
        for child in children {
            // Dropping `tx` on error rolls back the children inserted so far
            created.push(Self::insert_child(&mut tx, child).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_child(&self, child_id: i64) -> Result<Option<Child>> {
        let row = sqlx::query("SELECT id, name, date_of_birth FROM classes WHERE id = ?")
            .bind(child_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::child_from_row).transpose()
    }

    async fn find_child_by_name(&self, name: &str) -> Result<Option<Child>> {
        let row = sqlx::query("SELECT id, name, date_of_birth FROM classes WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::child_from_row).transpose()
    }

    async fn list_children(&self) -> Result<Vec<Child>> {
        let rows = sqlx::query("SELECT id, name, date_of_birth FROM classes ORDER BY name ASC")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::child_from_row).collect()
    }

    async fn count_children_born_between(&self, earliest: NaiveDate, latest: NaiveDate) -> Result<u64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM classes WHERE date_of_birth >= ? AND date_of_birth <= ?",
        )
        .bind(earliest.format(DATE_FORMAT).to_string())
        .bind(latest.format(DATE_FORMAT).to_string())
        .fetch_one(self.db.pool())
        .await?
        .get("n");

        Ok(count as u64)
    }

    async fn list_children_born_between(
        &self,
        earliest: NaiveDate,
        latest: NaiveDate,
        skip: u32,
        take: u32,
    ) -> Result<Vec<Child>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, date_of_birth
            FROM classes
            WHERE date_of_birth >= ? AND date_of_birth <= ?
            ORDER BY name ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(earliest.format(DATE_FORMAT).to_string())
        .bind(latest.format(DATE_FORMAT).to_string())
        .bind(i64::from(take))
        .bind(i64::from(skip))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::child_from_row).collect()
    }

    async fn replace_child(&self, child: &Child, seed_points: &[PointSeed]) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("UPDATE classes SET name = ?, date_of_birth = ? WHERE id = ?")
            .bind(&child.name)
            .bind(child.date_of_birth.format(DATE_FORMAT).to_string())
            .bind(child.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| name_conflict(e, &child.name))?;

        sqlx::query("DELETE FROM points WHERE class_id = ?")
            .bind(child.id)
            .execute(&mut *tx)
            .await?;

        Self::insert_seed_points(&mut tx, child.id, seed_points).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_children(&self, child_ids: &[i64]) -> Result<u64> {
        if child_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.pool().begin().await?;

        let mut points = QueryBuilder::<Sqlite>::new("DELETE FROM points WHERE class_id IN ");
        push_id_list(&mut points, child_ids);
        points.build().execute(&mut *tx).await?;

        let mut children = QueryBuilder::<Sqlite>::new("DELETE FROM classes WHERE id IN ");
        push_id_list(&mut children, child_ids);
        let deleted = children.build().execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn delete_all_children(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM classes").execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }
}

fn name_conflict(err: sqlx::Error, name: &str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DuplicateChildName(name.to_string()).into(),
        _ => err.into(),
    }
}
