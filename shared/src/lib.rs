//! Wire types shared between the points backend and its clients.
//!
//! Field names are serialized in camelCase to stay compatible with the
//! existing web admin panel, which still expects a few Portuguese keys
//! (`nome`, `idade`, `mostrarMais`) and `avatarURL`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generic error body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Generic confirmation body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// A single awarded point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub id: i64,
    /// ID of the child ("class") that owns this point
    pub class_id: i64,
    /// User who awarded the point; `None` for seeded or legacy points
    pub user_id: Option<i64>,
    /// Creation timestamp (RFC 3339, UTC)
    pub created_at: String,
}

/// Response for `POST /addPoint/:idChild/:idUser`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardPointResponse {
    pub point: Point,
    /// Start of the rate-limit window the point was counted in (RFC 3339)
    pub validity: String,
}

/// Points of a single child, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildPointsResponse {
    pub class_id: i64,
    pub points: Vec<Point>,
}

/// Seed entry used when creating children with pre-existing points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedPoint {
    /// Optional timestamp (RFC 3339); the server clock is used when absent
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Query of `GET /children/:id/points`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsQuery {
    /// Number of "show more" clicks; three points per click
    #[serde(rename = "mostrarMais", default)]
    pub show_more: Option<u32>,
}

/// Response for bulk resets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

/// A child together with every point it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildWithPoints {
    pub id: i64,
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: String,
    pub points: Vec<Point>,
}

/// Display-oriented summary of a child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub id: i64,
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    #[serde(rename = "idade")]
    pub age: i32,
    /// Date of birth formatted as dd/mm/yyyy
    pub date_of_birth: String,
    /// Total number of points ever awarded
    pub points: u64,
    /// Points awarded inside the current rate-limit window
    pub points_added: u64,
}

/// Query of `GET /children/filterByAge`.
///
/// Ages stay textual so that missing or non-numeric values get a descriptive 400.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeFilterQuery {
    pub min_age: Option<String>,
    pub max_age: Option<String>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
}

/// Paginated result of `GET /children/filterByAge`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildPageResponse {
    pub total: u64,
    pub page_size: u32,
    pub current_skip: u32,
    pub has_next_page: bool,
    pub data: Vec<ChildSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChildRequest {
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    /// Date of birth (YYYY-MM-DD or RFC 3339); older batch files send it as `idade`
    #[serde(alias = "idade")]
    pub date_of_birth: String,
    #[serde(default)]
    pub points: Vec<SeedPoint>,
}

/// Response for the best-effort batch import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCreateResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub created: Vec<ChildWithPoints>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChildRequest {
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    pub date_of_birth: String,
    /// The child's points are replaced by this many fresh points
    #[serde(default)]
    pub points: Vec<SeedPoint>,
    /// User credited with the replacement points
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteChildrenRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteChildrenResponse {
    pub message: String,
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Public view of a user account (the password hash never leaves the server)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub level: i32,
    pub active: bool,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithPresence {
    #[serde(flatten)]
    pub user: User,
    pub presence: Vec<Presence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub level: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    /// New password; the stored hash is kept when absent or blank
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub level: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub user_id: Option<i64>,
    pub search_name: Option<String>,
    pub search_position: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPageResponse {
    pub data: Vec<UserWithPresence>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_users: u64,
}

/// Result of `GET /users`, either one user or a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserListResponse {
    Single(UserWithPresence),
    Page(UserPageResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarEntry {
    pub id: i64,
    pub username: String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarRefreshResponse {
    pub message: String,
    pub users: Vec<AvatarEntry>,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Part of the day an attendance record refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Morning,
    Afternoon,
    Night,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Morning => "MORNING",
            Period::Afternoon => "AFTERNOON",
            Period::Night => "NIGHT",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MORNING" => Ok(Period::Morning),
            "AFTERNOON" => Ok(Period::Afternoon),
            "NIGHT" => Ok(Period::Night),
            other => Err(format!(
                "Invalid period '{}': expected MORNING, AFTERNOON or NIGHT",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub id: i64,
    pub user_id: i64,
    /// Calendar day (YYYY-MM-DD)
    pub day: String,
    pub period: Period,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPresenceRequest {
    /// Day of attendance (RFC 3339 or YYYY-MM-DD); today when absent
    #[serde(default)]
    pub created_at: Option<String>,
    /// Kept as text so an unknown period yields a 400 rather than a parse rejection
    pub period: String,
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub message: String,
    pub updated: u64,
}
