//! # Storage Traits
//!
//! Interfaces the domain layer uses to reach persisted data, so services can
//! be handed any backend (the SQLite repositories in production).

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::Period;
use thiserror::Error;

use crate::domain::models::{
    child::{Child, NewChild},
    point::{Point, PointSeed},
    presence::Presence,
    user::{NewUser, User, UserFilter},
};

/// Raised through `anyhow` when a child write hits the unique name constraint
#[derive(Debug, Error)]
#[error("Child '{0}' already exists")]
pub struct DuplicateChildName(pub String);

#[async_trait]
pub trait ChildStorage: Send + Sync {
    /// Insert a child together with its seed points, atomically
    async fn create_child(&self, child: &NewChild) -> Result<Child>;

    /// Insert every child with its seed points in one transaction, or none of them
    async fn create_children(&self, children: &[NewChild]) -> Result<Vec<Child>>;

    async fn get_child(&self, child_id: i64) -> Result<Option<Child>>;

    async fn find_child_by_name(&self, name: &str) -> Result<Option<Child>>;

    /// All children ordered by name
    async fn list_children(&self) -> Result<Vec<Child>>;

    /// Number of children born in `[earliest, latest]`
    async fn count_children_born_between(&self, earliest: NaiveDate, latest: NaiveDate) -> Result<u64>;

    /// Page of children born in `[earliest, latest]`, ordered by name
    async fn list_children_born_between(
        &self,
        earliest: NaiveDate,
        latest: NaiveDate,
        skip: u32,
        take: u32,
    ) -> Result<Vec<Child>>;

    /// Overwrite name and birth date and replace every point with `seed_points`
    async fn replace_child(&self, child: &Child, seed_points: &[PointSeed]) -> Result<()>;

    /// Delete the given children and their points; returns children deleted
    async fn delete_children(&self, child_ids: &[i64]) -> Result<u64>;

    async fn delete_all_children(&self) -> Result<u64>;
}

#[async_trait]
pub trait PointStorage: Send + Sync {
    /// Insert a point only while fewer than `limit` points of the child were
    /// created in `[window_start, created_at]`.
    ///
    /// Check and insert run as one statement; `None` means the limit was hit.
    async fn insert_point_within_limit(
        &self,
        class_id: i64,
        user_id: Option<i64>,
        created_at: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> Result<Option<Point>>;

    /// Points of one child created in `[from, to]`
    async fn count_points_in_window(&self, class_id: i64, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64>;

    /// Per-child count of points created in `[from, to]`; children without points are absent
    async fn count_points_in_window_by_child(
        &self,
        class_ids: &[i64],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<i64, u64>>;

    /// Per-child total point count; children without points are absent
    async fn count_points_by_child(&self, class_ids: &[i64]) -> Result<HashMap<i64, u64>>;

    /// Most recently created point of a child
    async fn latest_point(&self, class_id: i64) -> Result<Option<Point>>;

    /// Points of a child, newest first, optionally limited
    async fn list_points(&self, class_id: i64, limit: Option<u32>) -> Result<Vec<Point>>;

    /// Points of every given child, newest first
    async fn list_points_for_children(&self, class_ids: &[i64]) -> Result<Vec<Point>>;

    /// Returns false when the point no longer exists
    async fn delete_point(&self, point_id: i64) -> Result<bool>;

    async fn delete_all_points(&self) -> Result<u64>;

    /// Attribute every point without a user to `user_id`
    async fn assign_unattributed_points(&self, user_id: i64) -> Result<u64>;
}

#[async_trait]
pub trait UserStorage: Send + Sync {
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Case-insensitive lookup
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn update_user(&self, user: &User) -> Result<()>;

    /// Returns false when the user did not exist
    async fn delete_user(&self, user_id: i64) -> Result<bool>;

    /// Users matching `filter`, ordered by username
    async fn list_users(&self, filter: &UserFilter, skip: u32, limit: u32) -> Result<Vec<User>>;

    async fn count_users(&self, filter: &UserFilter) -> Result<u64>;

    async fn list_all_users(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait PresenceStorage: Send + Sync {
    async fn create_presence(
        &self,
        user_id: i64,
        day: NaiveDate,
        period: Period,
        created_at: DateTime<Utc>,
    ) -> Result<Presence>;

    async fn find_presence(&self, user_id: i64, day: NaiveDate, period: Period) -> Result<Option<Presence>>;

    /// Presence records of every given user, newest day first
    async fn list_presence_for_users(&self, user_ids: &[i64]) -> Result<Vec<Presence>>;

    /// Returns false when the record did not exist
    async fn delete_presence(&self, presence_id: i64) -> Result<bool>;
}
