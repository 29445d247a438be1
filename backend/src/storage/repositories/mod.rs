//! SQLite implementations of the storage traits, one repository per table.

pub mod child_repository;
pub mod point_repository;
pub mod presence_repository;
pub mod user_repository;

pub use child_repository::ChildRepository;
pub use point_repository::PointRepository;
pub use presence_repository::PresenceRepository;
pub use user_repository::UserRepository;

use sqlx::{QueryBuilder, Sqlite};

/// Append `(?, ?, …)` with one bound parameter per id
pub(crate) fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    query.push("(");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
