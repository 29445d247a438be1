use shared::{
    AgeFilterQuery, BatchCreateResponse, ChildPageResponse, ChildSummary, ChildWithPoints as SharedChildWithPoints,
    CreateChildRequest, UpdateChildRequest,
};

use super::point_mapper::PointMapper;
use crate::domain::age::format_birth_date;
use crate::domain::child_service::{AgeFilter, ChildInput};
use crate::domain::models::child::{BatchImport, ChildOverview, ChildPage, ChildWithPoints};

/// Mapper between child DTOs and domain models
pub struct ChildMapper;

impl ChildMapper {
    pub fn to_input(request: CreateChildRequest) -> ChildInput {
        ChildInput {
            name: request.name,
            date_of_birth: request.date_of_birth,
            points: request.points.into_iter().map(|p| p.created_at).collect(),
        }
    }

    /// The update payload plus the user credited with the new points
    pub fn to_update_input(request: UpdateChildRequest) -> (ChildInput, Option<i64>) {
        let input = ChildInput {
            name: request.name,
            date_of_birth: request.date_of_birth,
            points: request.points.into_iter().map(|p| p.created_at).collect(),
        };
        (input, request.user_id)
    }

    pub fn to_age_filter(query: AgeFilterQuery) -> AgeFilter {
        AgeFilter {
            min_age: query.min_age,
            max_age: query.max_age,
            skip: query.skip,
            take: query.take,
        }
    }

    pub fn to_with_points_dto(domain: ChildWithPoints) -> SharedChildWithPoints {
        SharedChildWithPoints {
            id: domain.child.id,
            name: domain.child.name,
            date_of_birth: domain.child.date_of_birth.format("%Y-%m-%d").to_string(),
            points: domain.points.into_iter().map(PointMapper::to_dto).collect(),
        }
    }

    pub fn to_summary_dto(overview: ChildOverview) -> ChildSummary {
        ChildSummary {
            id: overview.child.id,
            name: overview.child.name,
            age: overview.age,
            date_of_birth: format_birth_date(overview.child.date_of_birth),
            points: overview.total_points,
            points_added: overview.points_in_window,
        }
    }

    pub fn to_page_dto(page: ChildPage) -> ChildPageResponse {
        ChildPageResponse {
            total: page.total,
            page_size: page.take,
            current_skip: page.skip,
            has_next_page: page.has_next_page(),
            data: page.children.into_iter().map(Self::to_summary_dto).collect(),
        }
    }

    pub fn to_batch_dto(import: BatchImport) -> BatchCreateResponse {
        BatchCreateResponse {
            errors: import.errors,
            created: import.created.into_iter().map(Self::to_with_points_dto).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::child::Child;
    use chrono::NaiveDate;

    #[test]
    fn test_summary_uses_display_date_format() {
        let dto = ChildMapper::to_summary_dto(ChildOverview {
            child: Child {
                id: 1,
                name: "Ana".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(2015, 6, 5).unwrap(),
            },
            age: 9,
            total_points: 12,
            points_in_window: 2,
        });

        assert_eq!(dto.date_of_birth, "05/06/2015");
        assert_eq!(dto.points, 12);
        assert_eq!(dto.points_added, 2);
    }

    #[test]
    fn test_page_dto_reports_next_page() {
        let dto = ChildMapper::to_page_dto(ChildPage {
            total: 11,
            skip: 0,
            take: 10,
            children: vec![],
        });
        assert!(dto.has_next_page);
        assert_eq!(dto.page_size, 10);
    }
}
