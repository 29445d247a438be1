//! # Child Service
//!
//! Children ("classes") and the bookkeeping around their points: listings,
//! the age filter used by the admin panel, imports, edits and bulk resets.
//! Awarding and retracting individual points belongs to the point ledger.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::age::{birth_date_range, compute_age};
use crate::domain::dates::{parse_calendar_date, parse_timestamp};
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::models::child::{BatchImport, Child, ChildOverview, ChildPage, ChildWithPoints, NewChild};
use crate::domain::models::point::{Point, PointSeed};
use crate::domain::point_ledger::EntityKind;
use crate::storage::{ChildStorage, DuplicateChildName, PointStorage, UserStorage};

/// Page size of the age filter when the client sends none
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Points returned per "show more" step
const POINTS_PER_STEP: u32 = 3;

/// Input for creating or replacing a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInput {
    pub name: String,
    pub date_of_birth: String,
    /// Optional timestamp of every seeded point
    pub points: Vec<Option<String>>,
}

/// Raw age filter as received from the query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgeFilter {
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
}

#[derive(Clone)]
pub struct ChildService {
    children: Arc<dyn ChildStorage>,
    points: Arc<dyn PointStorage>,
    users: Arc<dyn UserStorage>,
    window: Duration,
}

impl ChildService {
    /// `window` is the length of the award window used for `points_in_window`
    pub fn new(
        children: Arc<dyn ChildStorage>,
        points: Arc<dyn PointStorage>,
        users: Arc<dyn UserStorage>,
        window: Duration,
    ) -> Self {
        Self {
            children,
            points,
            users,
            window,
        }
    }

    /// Every child with all of its points
    pub async fn list_children(&self) -> ServiceResult<Vec<ChildWithPoints>> {
        info!("Listing all children");

        let children = self.children.list_children().await?;
        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let mut by_child: HashMap<i64, Vec<Point>> = HashMap::new();
        for point in self.points.list_points_for_children(&ids).await? {
            by_child.entry(point.class_id).or_default().push(point);
        }

        info!("Found {} children", children.len());
        Ok(children
            .into_iter()
            .map(|child| {
                let points = by_child.remove(&child.id).unwrap_or_default();
                ChildWithPoints { child, points }
            })
            .collect())
    }

    /// Page of children whose age on `now` lies in `[minAge, maxAge]`
    pub async fn filter_by_age(&self, filter: AgeFilter, now: DateTime<Utc>) -> ServiceResult<ChildPage> {
        let min_age = parse_age(filter.min_age.as_deref(), "minAge")?;
        let max_age = parse_age(filter.max_age.as_deref(), "maxAge")?;
        if min_age > max_age {
            return Err(ServiceError::validation("minAge must not be greater than maxAge"));
        }
        let skip = filter.skip.unwrap_or(0);
        let take = filter.take.unwrap_or(DEFAULT_PAGE_SIZE);
        if take == 0 {
            return Err(ServiceError::validation("take must be greater than zero"));
        }

        info!("Filtering children aged {}..={} (skip={}, take={})", min_age, max_age, skip, take);

        let Some((earliest, latest)) = birth_date_range(now.date_naive(), min_age, max_age) else {
            return Err(ServiceError::validation("Age range is out of bounds"));
        };

        let total = self.children.count_children_born_between(earliest, latest).await?;
        let page = self
            .children
            .list_children_born_between(earliest, latest, skip, take)
            .await?;

        Ok(ChildPage {
            total,
            skip,
            take,
            children: self.overviews(page, now).await?,
        })
    }

    pub async fn get_child(&self, child_id: i64, now: DateTime<Utc>) -> ServiceResult<ChildOverview> {
        info!("Getting child {}", child_id);

        let child = self.require_child(child_id).await?;
        let mut overviews = self.overviews(vec![child], now).await?;
        overviews.pop().ok_or(ServiceError::NotFound(EntityKind::Child))
    }

    /// Newest points of a child; `show_more = n > 0` limits the list to `3n`
    pub async fn get_points(&self, child_id: i64, show_more: Option<u32>) -> ServiceResult<Vec<Point>> {
        let limit = show_more
            .filter(|n| *n > 0)
            .map(|n| n.saturating_mul(POINTS_PER_STEP));
        Ok(self.points.list_points(child_id, limit).await?)
    }

    pub async fn get_all_points(&self, child_id: i64) -> ServiceResult<Vec<Point>> {
        Ok(self.points.list_points(child_id, None).await?)
    }

    /// Create every child or none of them. Seeded points are stamped `now`.
    pub async fn create_children(
        &self,
        inputs: Vec<ChildInput>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<ChildWithPoints>> {
        info!("Creating {} children", inputs.len());
        if inputs.is_empty() {
            return Err(ServiceError::validation("At least one child is required"));
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(inputs.len());
        for input in inputs {
            let seeds = vec![PointSeed { user_id: None, created_at: now }; input.points.len()];
            let new_child = self.validate_new_child(&input, seeds).await?;
            if !seen.insert(new_child.name.clone()) {
                return Err(ServiceError::Conflict(format!(
                    "Child '{}' appears more than once",
                    new_child.name
                )));
            }
            validated.push(new_child);
        }

        let children = self
            .children
            .create_children(&validated)
            .await
            .map_err(conflict_or_storage)?;

        let mut created = Vec::with_capacity(children.len());
        for child in children {
            let points = self.points.list_points(child.id, None).await?;
            created.push(ChildWithPoints { child, points });
        }

        info!("Created {} children", created.len());
        Ok(created)
    }

    /// Best-effort import; failures are reported per child
    pub async fn create_many_children(&self, inputs: Vec<ChildInput>, now: DateTime<Utc>) -> ServiceResult<BatchImport> {
        info!("Importing {} children", inputs.len());

        let mut import = BatchImport::default();
        for input in inputs {
            let label = if input.name.trim().is_empty() {
                "<unnamed>".to_string()
            } else {
                input.name.trim().to_string()
            };

            let outcome = match seeds_from_timestamps(&input.points, now) {
                Ok(seeds) => match self.validate_new_child(&input, seeds).await {
                    Ok(new_child) => self.insert(new_child).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(child) => import.created.push(child),
                Err(ServiceError::Storage(e)) => {
                    warn!("Failed to import child '{}': {:#}", label, e);
                    import.errors.push(format!("{}: could not be saved", label));
                }
                Err(e) => import.errors.push(format!("{}: {}", label, e)),
            }
        }

        info!(
            "Imported {} children with {} errors",
            import.created.len(),
            import.errors.len()
        );
        Ok(import)
    }

    /// Overwrite a child and replace its points with fresh ones credited to `user_id`
    pub async fn update_child(
        &self,
        child_id: i64,
        input: ChildInput,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> ServiceResult<ChildWithPoints> {
        info!("Updating child {}", child_id);

        self.require_child(child_id).await?;
        let (name, date_of_birth) = validate_fields(&input)?;

        if let Some(existing) = self.children.find_child_by_name(&name).await? {
            if existing.id != child_id {
                return Err(ServiceError::Conflict(format!("Child '{}' already exists", name)));
            }
        }
        if let Some(user_id) = user_id {
            if self.users.get_user(user_id).await?.is_none() {
                return Err(ServiceError::NotFound(EntityKind::User));
            }
        }

        let child = Child {
            id: child_id,
            name,
            date_of_birth,
        };
        let seeds = vec![PointSeed { user_id, created_at: now }; input.points.len()];
        self.children
            .replace_child(&child, &seeds)
            .await
            .map_err(conflict_or_storage)?;

        let points = self.points.list_points(child_id, None).await?;
        info!("Updated child {} with {} points", child_id, points.len());
        Ok(ChildWithPoints { child, points })
    }

    /// Delete the given children and their points
    pub async fn delete_children(&self, ids: &[i64]) -> ServiceResult<u64> {
        if ids.is_empty() {
            return Err(ServiceError::validation("No ids given"));
        }

        info!("Deleting children {:?}", ids);
        let deleted = self.children.delete_children(ids).await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound(EntityKind::Child));
        }
        Ok(deleted)
    }

    pub async fn reset_all_points(&self) -> ServiceResult<u64> {
        let count = self.points.delete_all_points().await?;
        warn!("Deleted all {} points", count);
        Ok(count)
    }

    pub async fn reset_all_children(&self) -> ServiceResult<u64> {
        let count = self.children.delete_all_children().await?;
        warn!("Deleted all {} children", count);
        Ok(count)
    }

    async fn require_child(&self, child_id: i64) -> ServiceResult<Child> {
        self.children
            .get_child(child_id)
            .await?
            .ok_or(ServiceError::NotFound(EntityKind::Child))
    }

    async fn validate_new_child(&self, input: &ChildInput, seed_points: Vec<PointSeed>) -> ServiceResult<NewChild> {
        let (name, date_of_birth) = validate_fields(input)?;
        if self.children.find_child_by_name(&name).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Child '{}' already exists", name)));
        }
        Ok(NewChild {
            name,
            date_of_birth,
            seed_points,
        })
    }

    async fn insert(&self, new_child: NewChild) -> ServiceResult<ChildWithPoints> {
        let child = self
            .children
            .create_child(&new_child)
            .await
            .map_err(conflict_or_storage)?;
        let points = self.points.list_points(child.id, None).await?;
        Ok(ChildWithPoints { child, points })
    }

    async fn overviews(&self, children: Vec<Child>, now: DateTime<Utc>) -> ServiceResult<Vec<ChildOverview>> {
        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let totals = self.points.count_points_by_child(&ids).await?;
        let recent = self
            .points
            .count_points_in_window_by_child(&ids, now - self.window, now)
            .await?;
        let today = now.date_naive();

        Ok(children
            .into_iter()
            .map(|child| ChildOverview {
                age: compute_age(child.date_of_birth, today),
                total_points: totals.get(&child.id).copied().unwrap_or(0),
                points_in_window: recent.get(&child.id).copied().unwrap_or(0),
                child,
            })
            .collect())
    }
}

/// Name clashes found by the database are conflicts, not storage failures
fn conflict_or_storage(err: anyhow::Error) -> ServiceError {
    match err.downcast::<DuplicateChildName>() {
        Ok(duplicate) => ServiceError::Conflict(duplicate.to_string()),
        Err(err) => ServiceError::Storage(err),
    }
}

fn parse_age(raw: Option<&str>, field: &str) -> ServiceResult<u32> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::validation(format!("{} is required", field)))?;
    raw.parse()
        .map_err(|_| ServiceError::validation(format!("{} must be a non-negative number", field)))
}

fn validate_fields(input: &ChildInput) -> ServiceResult<(String, chrono::NaiveDate)> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Name is required"));
    }
    let date_of_birth = parse_calendar_date(&input.date_of_birth)
        .ok_or_else(|| ServiceError::validation(format!("Invalid date of birth '{}'", input.date_of_birth)))?;
    Ok((name.to_string(), date_of_birth))
}

fn seeds_from_timestamps(raw: &[Option<String>], now: DateTime<Utc>) -> ServiceResult<Vec<PointSeed>> {
    raw.iter()
        .map(|ts| {
            let created_at = match ts.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(value) => parse_timestamp(value)
                    .ok_or_else(|| ServiceError::validation(format!("Invalid point timestamp '{}'", value)))?,
                None => now,
            };
            Ok(PointSeed {
                user_id: None,
                created_at,
            })
        })
        .collect()
}
