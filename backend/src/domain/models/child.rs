use chrono::NaiveDate;

use super::point::{Point, PointSeed};

/// A child enrolled in the program (stored in the `classes` table)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub id: i64,
    pub name: String,
    pub date_of_birth: NaiveDate,
}

/// Validated input for inserting a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChild {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub seed_points: Vec<PointSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildWithPoints {
    pub child: Child,
    pub points: Vec<Point>,
}

/// Child plus derived values shown by the admin panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildOverview {
    pub child: Child,
    pub age: i32,
    pub total_points: u64,
    pub points_in_window: u64,
}

/// One page of children matching an age filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildPage {
    pub total: u64,
    pub skip: u32,
    pub take: u32,
    pub children: Vec<ChildOverview>,
}

impl ChildPage {
    pub fn has_next_page(&self) -> bool {
        u64::from(self.skip) + u64::from(self.take) < self.total
    }
}

/// Outcome of the best-effort batch import
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchImport {
    pub created: Vec<ChildWithPoints>,
    pub errors: Vec<String>,
}
