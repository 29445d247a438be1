use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use shared::Period;
use tracing::{info, warn};

use crate::domain::dates::parse_calendar_date;
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::models::presence::Presence;
use crate::domain::point_ledger::EntityKind;
use crate::storage::{PresenceStorage, UserStorage};

/// Records attendance of users per day and period
#[derive(Clone)]
pub struct PresenceService {
    users: Arc<dyn UserStorage>,
    presence: Arc<dyn PresenceStorage>,
}

impl PresenceService {
    pub fn new(users: Arc<dyn UserStorage>, presence: Arc<dyn PresenceStorage>) -> Self {
        Self { users, presence }
    }

    /// Record that `user_id` attended on the day of `date` (today when absent).
    ///
    /// The record is stamped at noon UTC of that day so the calendar date
    /// survives any client time zone.
    pub async fn add_presence(
        &self,
        user_id: i64,
        date: Option<&str>,
        period: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Presence> {
        let period: Period = period.parse().map_err(ServiceError::Validation)?;
        info!("Adding presence: user={}, period={}", user_id, period);

        if self.users.get_user(user_id).await?.is_none() {
            return Err(ServiceError::NotFound(EntityKind::User));
        }

        let day = match date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => parse_calendar_date(raw)
                .ok_or_else(|| ServiceError::validation(format!("Invalid date '{}'", raw)))?,
            None => now.date_naive(),
        };

        if self.presence.find_presence(user_id, day, period).await?.is_some() {
            warn!("Presence already recorded: user={}, day={}, period={}", user_id, day, period);
            return Err(ServiceError::Conflict(format!(
                "Presence already recorded for {} ({})",
                day, period
            )));
        }

        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
        let created_at = day.and_time(noon).and_utc();
        Ok(self.presence.create_presence(user_id, day, period, created_at).await?)
    }

    pub async fn remove_presence(&self, presence_id: i64) -> ServiceResult<()> {
        info!("Removing presence {}", presence_id);
        if !self.presence.delete_presence(presence_id).await? {
            return Err(ServiceError::NotFound(EntityKind::Presence));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::user::NewUser;
    use crate::storage::{DbConnection, PresenceRepository, UserRepository};
    use chrono::{NaiveDate, TimeZone};

    async fn setup_test() -> (PresenceService, i64) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let users = Arc::new(UserRepository::new(db.clone()));
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
        (
            PresenceService::new(users, Arc::new(PresenceRepository::new(db))),
            user_id,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 22, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_add_presence_defaults_to_today() {
        let (service, user) = setup_test().await;

        let presence = service.add_presence(user, None, "night", now()).await.unwrap();
        assert_eq!(presence.day, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(presence.period, Period::Night);
        assert_eq!(presence.created_at, Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_presence_is_rejected() {
        let (service, user) = setup_test().await;
        service
            .add_presence(user, Some("2024-06-02"), "MORNING", now())
            .await
            .unwrap();

        let duplicate = service
            .add_presence(user, Some("2024-06-02T18:00:00Z"), "MORNING", now())
            .await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));

        // Another period on the same day is fine
        assert!(service
            .add_presence(user, Some("2024-06-02"), "AFTERNOON", now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_add_presence_validation() {
        let (service, user) = setup_test().await;

        assert!(matches!(
            service.add_presence(user, None, "EVENING", now()).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.add_presence(user, Some("02/06/2024"), "MORNING", now()).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.add_presence(999, None, "MORNING", now()).await,
            Err(ServiceError::NotFound(EntityKind::User))
        ));
    }

    #[tokio::test]
    async fn test_remove_presence() {
        let (service, user) = setup_test().await;
        let presence = service.add_presence(user, None, "MORNING", now()).await.unwrap();

        service.remove_presence(presence.id).await.unwrap();
        assert!(matches!(
            service.remove_presence(presence.id).await,
            Err(ServiceError::NotFound(EntityKind::Presence))
        ));
    }
}
