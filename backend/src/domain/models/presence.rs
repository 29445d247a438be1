use chrono::{DateTime, NaiveDate, Utc};
use shared::Period;

/// Attendance of a user on one part of one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub id: i64,
    pub user_id: i64,
    pub day: NaiveDate,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}
