use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use crate::domain::models::user::{NewUser, User, UserFilter};
use crate::storage::connection::DbConnection;
use crate::storage::traits::UserStorage;

/// Repository for the `users` table
#[derive(Clone)]
pub struct UserRepository {
    db: DbConnection,
}

impl UserRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    fn user_from_row(row: &SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            level: row.get("level"),
            active: row.get("active"),
            avatar_url: row.get("avatar_url"),
            position: row.get("position"),
        }
    }

    /// Append the WHERE clause for a filter. Prefixes are matched with LIKE,
    /// which is case-insensitive for ASCII in SQLite.
    fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
        query.push(" WHERE 1 = 1");
        if let Some(prefix) = &filter.name_prefix {
            query
                .push(" AND username LIKE ")
                .push_bind(like_prefix(prefix))
                .push(" ESCAPE '\\'");
        }
        if let Some(prefix) = &filter.position_prefix {
            query
                .push(" AND position LIKE ")
                .push_bind(like_prefix(prefix))
                .push(" ESCAPE '\\'");
        }
    }
}

/// Escape LIKE wildcards in user input and append the prefix wildcard
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const USER_COLUMNS: &str = "id, username, password_hash, level, active, avatar_url, position";

#[async_trait]
impl UserStorage for UserRepository {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let id = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, level, active, avatar_url)
            VALUES (?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.level)
        .bind(&user.avatar_url)
        .execute(self.db.pool())
        .await?
        .last_insert_rowid();

        Ok(User {
            id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            level: user.level,
            active: true,
            avatar_url: user.avatar_url.clone(),
            position: None,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(Self::user_from_row))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        // The column is declared COLLATE NOCASE
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(Self::user_from_row))
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, password_hash = ?, level = ?, active = ?, avatar_url = ?, position = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.level)
        .bind(user.active)
        .bind(&user.avatar_url)
        .bind(&user.position)
        .bind(user.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, filter: &UserFilter, skip: u32, limit: u32) -> Result<Vec<User>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        Self::push_filter(&mut query, filter);
        query
            .push(" ORDER BY username ASC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(skip));

        let rows = query.build().fetch_all(self.db.pool()).await?;
        Ok(rows.iter().map(Self::user_from_row).collect())
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS n FROM users");
        Self::push_filter(&mut query, filter);

        let count: i64 = query.build().fetch_one(self.db.pool()).await?.get("n");
        Ok(count as u64)
    }

    async fn list_all_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id ASC", USER_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(Self::user_from_row).collect())
    }
}
