//! # Point Ledger
//!
//! Decides whether a point may be awarded to a child and whether the child's
//! most recent point may be retracted.
//!
//! ## Award rule
//!
//! A child may receive at most `award_limit` points inside the sliding window
//! `[now - window, now]` (both bounds inclusive). The count and the insert are
//! a single storage operation, so concurrent awards cannot overshoot.
//!
//! ## Retraction rule
//!
//! Only the most recent point of a child can be retracted, and only while the
//! configured [`RetractionPolicy`] allows it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::models::point::AwardedPoint;
use crate::storage::{ChildStorage, PointStorage, UserStorage};

/// Entities a lookup can fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Child,
    User,
    Presence,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Child => "Child",
            EntityKind::User => "User",
            EntityKind::Presence => "Presence",
        };
        f.write_str(name)
    }
}

/// Which point may be retracted, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractionPolicy {
    /// The latest point may be removed as long as any point of the child
    /// falls inside the award window, however old the latest one is.
    RecencyGated,
    /// The latest point may be removed while it is at most `max_age` old.
    AgeGated { max_age: Duration },
}

impl Default for RetractionPolicy {
    fn default() -> Self {
        RetractionPolicy::AgeGated {
            max_age: Duration::minutes(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub award_limit: u32,
    pub window: Duration,
    pub retraction: RetractionPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            award_limit: 4,
            window: Duration::hours(4),
            retraction: RetractionPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(EntityKind),
    #[error("Limit of {limit} points in {window_hours} hours reached")]
    RateLimitExceeded { limit: u32, window_hours: i64 },
    #[error("The last point is too old to be removed")]
    RetractionWindowExpired,
    #[error("No points were added in the last {window_hours} hours")]
    NoRecentActivity { window_hours: i64 },
    #[error("No point found for this child")]
    NoQualifyingPoint,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Award and retraction policy over the point store
#[derive(Clone)]
pub struct PointLedger {
    children: Arc<dyn ChildStorage>,
    users: Arc<dyn UserStorage>,
    points: Arc<dyn PointStorage>,
    config: LedgerConfig,
}

impl PointLedger {
    pub fn new(
        children: Arc<dyn ChildStorage>,
        users: Arc<dyn UserStorage>,
        points: Arc<dyn PointStorage>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            children,
            users,
            points,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Opening instant of the window that ends at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.window
    }

    /// Award one point to `child_id` on behalf of `user_id`
    pub async fn try_award_point(
        &self,
        child_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<AwardedPoint, LedgerError> {
        info!("Awarding point: child={}, user={}", child_id, user_id);

        if self.children.get_child(child_id).await?.is_none() {
            return Err(LedgerError::NotFound(EntityKind::Child));
        }
        if self.users.get_user(user_id).await?.is_none() {
            return Err(LedgerError::NotFound(EntityKind::User));
        }

        let window_start = self.window_start(now);
        let inserted = self
            .points
            .insert_point_within_limit(child_id, Some(user_id), now, window_start, self.config.award_limit)
            .await?;

        match inserted {
            Some(point) => {
                info!("Point {} awarded to child {}", point.id, child_id);
                Ok(AwardedPoint {
                    point,
                    validity: window_start,
                })
            }
            None => {
                warn!("Point limit reached for child {}", child_id);
                Err(LedgerError::RateLimitExceeded {
                    limit: self.config.award_limit,
                    window_hours: self.config.window.num_hours(),
                })
            }
        }
    }

    /// Remove the most recent point of `child_id` if the policy allows it
    pub async fn try_retract_last_point(&self, child_id: i64, now: DateTime<Utc>) -> Result<(), LedgerError> {
        info!("Retracting last point of child {}", child_id);

        if self.children.get_child(child_id).await?.is_none() {
            return Err(LedgerError::NotFound(EntityKind::Child));
        }

        let latest = self
            .points
            .latest_point(child_id)
            .await?
            .ok_or(LedgerError::NoQualifyingPoint)?;

        match self.config.retraction {
            RetractionPolicy::RecencyGated => {
                let recent = self
                    .points
                    .count_points_in_window(child_id, self.window_start(now), now)
                    .await?;
                if recent == 0 {
                    return Err(LedgerError::NoRecentActivity {
                        window_hours: self.config.window.num_hours(),
                    });
                }
            }
            RetractionPolicy::AgeGated { max_age } => {
                if now - latest.created_at > max_age {
                    warn!(
                        "Point {} of child {} is {}s old, retraction refused",
                        latest.id,
                        child_id,
                        (now - latest.created_at).num_seconds()
                    );
                    return Err(LedgerError::RetractionWindowExpired);
                }
            }
        }

        // A concurrent retraction may have removed it already
        if !self.points.delete_point(latest.id).await? {
            return Err(LedgerError::NoQualifyingPoint);
        }

        info!("Point {} of child {} retracted", latest.id, child_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::child::NewChild;
    use crate::domain::models::user::NewUser;
    use crate::storage::{ChildRepository, DbConnection, PointRepository, UserRepository};
    use chrono::{NaiveDate, TimeZone};

    struct Fixture {
        ledger: PointLedger,
        points: Arc<PointRepository>,
        child_id: i64,
        user_id: i64,
    }

    async fn setup_test(retraction: RetractionPolicy) -> Fixture {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        setup_with_db(db, retraction).await
    }

    async fn setup_with_db(db: DbConnection, retraction: RetractionPolicy) -> Fixture {
        let children = Arc::new(ChildRepository::new(db.clone()));
        let users = Arc::new(UserRepository::new(db.clone()));
        let points = Arc::new(PointRepository::new(db));

        let child_id = children
            .create_child(&NewChild {
                name: "Ana".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2015, 6, 15).unwrap(),
                seed_points: vec![],
            })
            .await
            .unwrap()
            .id;
        let user_id = users
            .create_user(&NewUser {
                username: "tia".to_string(),
                password_hash: "x".to_string(),
                level: 1,
                avatar_url: None,
            })
            .await
            .unwrap()
            .id;

        let config = LedgerConfig {
            retraction,
            ..LedgerConfig::default()
        };
        let ledger = PointLedger::new(children, users, points.clone(), config);

        Fixture {
            ledger,
            points,
            child_id,
            user_id,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
    }

    async fn window_count(f: &Fixture, now: DateTime<Utc>) -> u64 {
        f.points
            .count_points_in_window(f.child_id, now - Duration::hours(4), now)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_awards_never_exceed_limit() {
        // A file database so the pool holds several connections racing each other
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("ledger.db").display());
        let db = DbConnection::new(&url).await.expect("Failed to create file database");
        let f = setup_with_db(db, RetractionPolicy::default()).await;

        let mut awards = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let ledger = f.ledger.clone();
            let (child_id, user_id) = (f.child_id, f.user_id);
            awards.spawn(async move { ledger.try_award_point(child_id, user_id, t0()).await });
        }

        let (mut awarded, mut limited) = (0, 0);
        while let Some(outcome) = awards.join_next().await {
            match outcome.unwrap() {
                Ok(_) => awarded += 1,
                Err(LedgerError::RateLimitExceeded { limit: 4, window_hours: 4 }) => limited += 1,
                Err(e) => panic!("unexpected award failure: {}", e),
            }
        }

        assert_eq!((awarded, limited), (4, 4));
        assert_eq!(window_count(&f, t0()).await, 4);
        assert_eq!(f.points.list_points(f.child_id, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_award_below_limit_adds_exactly_one() {
        let f = setup_test(RetractionPolicy::default()).await;

        for i in 0..4 {
            let now = t0() + Duration::minutes(i);
            let before = window_count(&f, now).await;
            let awarded = f.ledger.try_award_point(f.child_id, f.user_id, now).await.unwrap();

            assert_eq!(window_count(&f, now).await, before + 1);
            assert_eq!(awarded.point.created_at, now);
            assert_eq!(awarded.point.user_id, Some(f.user_id));
            assert_eq!(awarded.validity, now - Duration::hours(4));
        }
    }

    #[tokio::test]
    async fn test_award_at_limit_fails_without_creating() {
        let f = setup_test(RetractionPolicy::default()).await;
        for i in 0..4 {
            f.ledger
                .try_award_point(f.child_id, f.user_id, t0() + Duration::minutes(i))
                .await
                .unwrap();
        }

        let now = t0() + Duration::minutes(10);
        let result = f.ledger.try_award_point(f.child_id, f.user_id, now).await;

        assert!(matches!(
            result,
            Err(LedgerError::RateLimitExceeded { limit: 4, window_hours: 4 })
        ));
        assert_eq!(window_count(&f, now).await, 4);
    }

    #[tokio::test]
    async fn test_sliding_window_frees_a_slot() {
        let f = setup_test(RetractionPolicy::default()).await;
        for hour in 0..4 {
            f.ledger
                .try_award_point(f.child_id, f.user_id, t0() + Duration::hours(hour))
                .await
                .unwrap();
        }

        let blocked = f
            .ledger
            .try_award_point(f.child_id, f.user_id, t0() + Duration::minutes(210))
            .await;
        assert!(matches!(blocked, Err(LedgerError::RateLimitExceeded { .. })));

        let later = t0() + Duration::hours(4) + Duration::seconds(1);
        assert!(f.ledger.try_award_point(f.child_id, f.user_id, later).await.is_ok());
    }

    #[tokio::test]
    async fn test_award_checks_child_before_user() {
        let f = setup_test(RetractionPolicy::default()).await;

        let missing_both = f.ledger.try_award_point(999, 999, t0()).await;
        assert!(matches!(missing_both, Err(LedgerError::NotFound(EntityKind::Child))));

        let missing_user = f.ledger.try_award_point(f.child_id, 999, t0()).await;
        assert!(matches!(missing_user, Err(LedgerError::NotFound(EntityKind::User))));
    }

    #[tokio::test]
    async fn test_age_gated_retraction_window() {
        let f = setup_test(RetractionPolicy::AgeGated {
            max_age: Duration::minutes(1),
        })
        .await;

        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();
        let too_late = f
            .ledger
            .try_retract_last_point(f.child_id, t0() + Duration::seconds(90))
            .await;
        assert!(matches!(too_late, Err(LedgerError::RetractionWindowExpired)));

        f.ledger
            .try_retract_last_point(f.child_id, t0() + Duration::seconds(30))
            .await
            .unwrap();
        assert!(f.points.latest_point(f.child_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_age_gated_boundary_is_inclusive() {
        let f = setup_test(RetractionPolicy::default()).await;
        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();

        assert!(f
            .ledger
            .try_retract_last_point(f.child_id, t0() + Duration::minutes(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_retract_twice_with_single_point() {
        let f = setup_test(RetractionPolicy::default()).await;
        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();

        let now = t0() + Duration::seconds(10);
        f.ledger.try_retract_last_point(f.child_id, now).await.unwrap();
        let second = f.ledger.try_retract_last_point(f.child_id, now).await;

        assert!(matches!(second, Err(LedgerError::NoQualifyingPoint)));
    }

    #[tokio::test]
    async fn test_retraction_removes_only_the_latest_point() {
        let f = setup_test(RetractionPolicy::default()).await;
        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();
        let latest = f
            .ledger
            .try_award_point(f.child_id, f.user_id, t0() + Duration::seconds(20))
            .await
            .unwrap();

        f.ledger
            .try_retract_last_point(f.child_id, t0() + Duration::seconds(30))
            .await
            .unwrap();

        let remaining = f.points.list_points(f.child_id, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].id, latest.point.id);
    }

    #[tokio::test]
    async fn test_recency_gated_retraction() {
        let f = setup_test(RetractionPolicy::RecencyGated).await;
        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();

        // Well past one minute but still inside the four hour window
        f.ledger
            .try_retract_last_point(f.child_id, t0() + Duration::hours(3))
            .await
            .unwrap();

        f.ledger.try_award_point(f.child_id, f.user_id, t0()).await.unwrap();
        let stale = f
            .ledger
            .try_retract_last_point(f.child_id, t0() + Duration::hours(5))
            .await;
        assert!(matches!(stale, Err(LedgerError::NoRecentActivity { window_hours: 4 })));
    }

    #[tokio::test]
    async fn test_retract_unknown_child() {
        let f = setup_test(RetractionPolicy::default()).await;
        let result = f.ledger.try_retract_last_point(999, t0()).await;
        assert!(matches!(result, Err(LedgerError::NotFound(EntityKind::Child))));
    }
}
