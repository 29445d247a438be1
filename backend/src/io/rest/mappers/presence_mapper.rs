use shared::Presence as SharedPresence;

use super::point_mapper::format_timestamp;
use crate::domain::models::presence::Presence;

pub struct PresenceMapper;

impl PresenceMapper {
    pub fn to_dto(domain: Presence) -> SharedPresence {
        SharedPresence {
            id: domain.id,
            user_id: domain.user_id,
            day: domain.day.format("%Y-%m-%d").to_string(),
            period: domain.period,
            created_at: format_timestamp(domain.created_at),
        }
    }
}
