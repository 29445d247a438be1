use unicode_normalization::UnicodeNormalization;

use super::presence::Presence;

/// A user account able to award points and record presence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub level: i32,
    pub active: bool,
    pub avatar_url: Option<String>,
    pub position: Option<String>,
}

/// Validated input for inserting a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub level: i32,
    pub avatar_url: Option<String>,
}

/// Prefix filters for user listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub name_prefix: Option<String>,
    pub position_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWithPresence {
    pub user: User,
    pub presence: Vec<Presence>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<UserWithPresence>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_users: u64,
}

/// Result of a user listing: one user looked up by id, or a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListing {
    Single(UserWithPresence),
    Page(UserPage),
}

/// Canonical form of a username.
///
/// The name is NFKC-normalized first, which folds fullwidth letters and turns
/// non-breaking spaces into plain spaces. Zero-width characters and word
/// joiners pasted from chat apps are then removed, and the result is trimmed
/// and lower-cased.
pub fn normalize_username(raw: &str) -> String {
    raw.nfkc()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Default avatar for a username
pub fn default_avatar_url(username: &str) -> String {
    format!("https://robohash.org/{}.png", username)
}
