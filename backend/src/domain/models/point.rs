use chrono::{DateTime, Utc};

/// One unit of awarded activity credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub id: i64,
    pub class_id: i64,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Point to be inserted alongside a new or updated child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointSeed {
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful award
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardedPoint {
    pub point: Point,
    /// Opening instant of the rate-limit window the point was counted in
    pub validity: DateTime<Utc>,
}
