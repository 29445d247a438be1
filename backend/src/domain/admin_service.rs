use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::error::ServiceResult;
use crate::storage::{PointStorage, UserStorage};

/// Account that legacy points without an author are credited to
pub const DEFAULT_USER_ID: i64 = 1;

/// One-off data maintenance
#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserStorage>,
    points: Arc<dyn PointStorage>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserStorage>, points: Arc<dyn PointStorage>) -> Self {
        Self { users, points }
    }

    /// Credit every point without a user to the default account, when it exists
    pub async fn backfill_defaults(&self) -> ServiceResult<u64> {
        if self.users.get_user(DEFAULT_USER_ID).await?.is_none() {
            warn!("Default user {} does not exist, nothing to backfill", DEFAULT_USER_ID);
            return Ok(0);
        }

        let updated = self.points.assign_unattributed_points(DEFAULT_USER_ID).await?;
        info!("Credited {} points to user {}", updated, DEFAULT_USER_ID);
        Ok(updated)
    }
}
