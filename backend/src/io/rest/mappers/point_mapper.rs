use chrono::{DateTime, SecondsFormat, Utc};
use shared::{AwardPointResponse, ChildPointsResponse, Point as SharedPoint};

use crate::domain::models::point::{AwardedPoint, Point as DomainPoint};

/// RFC 3339 with millisecond precision, the format every timestamp leaves the server in
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Mapper between domain points and their DTOs
pub struct PointMapper;

impl PointMapper {
    pub fn to_dto(domain: DomainPoint) -> SharedPoint {
        SharedPoint {
            id: domain.id,
            class_id: domain.class_id,
            user_id: domain.user_id,
            created_at: format_timestamp(domain.created_at),
        }
    }

    pub fn to_award_dto(awarded: AwardedPoint) -> AwardPointResponse {
        AwardPointResponse {
            validity: format_timestamp(awarded.validity),
            point: Self::to_dto(awarded.point),
        }
    }

    pub fn to_child_points_dto(class_id: i64, points: Vec<DomainPoint>) -> ChildPointsResponse {
        ChildPointsResponse {
            class_id,
            points: points.into_iter().map(Self::to_dto).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_award_dto_formats_timestamps() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let dto = PointMapper::to_award_dto(AwardedPoint {
            point: DomainPoint {
                id: 1,
                class_id: 2,
                user_id: Some(3),
                created_at: now,
            },
            validity: now - chrono::Duration::hours(4),
        });

        assert_eq!(dto.point.created_at, "2024-06-15T09:00:00.000Z");
        assert_eq!(dto.validity, "2024-06-15T05:00:00.000Z");
        assert_eq!(dto.point.class_id, 2);
    }
}
