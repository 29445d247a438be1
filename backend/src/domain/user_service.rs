//! # User Service
//!
//! Accounts, login, avatars and the user listing with attendance records.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::auth::{hash_password, verify_password, TokenIssuer};
use crate::domain::error::{ServiceError, ServiceResult};
use crate::domain::models::user::{
    default_avatar_url, normalize_username, NewUser, User, UserFilter, UserListing, UserPage, UserWithPresence,
};
use crate::domain::point_ledger::EntityKind;
use crate::storage::{PresenceStorage, UserStorage};

/// Page size of the user listing when the client sends no `limit`
pub const DEFAULT_USERS_PER_PAGE: u32 = 100;

/// Public path under which uploaded avatars are served
pub const AVATAR_URL_PREFIX: &str = "/uploads/avatars";

/// Listing request; `user_id` selects a single user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub user_id: Option<i64>,
    pub search_name: Option<String>,
    pub search_position: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStorage>,
    presence: Arc<dyn PresenceStorage>,
    tokens: TokenIssuer,
    upload_dir: PathBuf,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStorage>,
        presence: Arc<dyn PresenceStorage>,
        tokens: TokenIssuer,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            users,
            presence,
            tokens,
            upload_dir,
        }
    }

    pub async fn register(&self, username: &str, password: &str, level: i32) -> ServiceResult<User> {
        let username = normalize_username(username);
        info!("Registering user '{}'", username);

        if username.is_empty() || password.trim().is_empty() {
            return Err(ServiceError::validation("Username and password are required"));
        }
        if self.users.find_user_by_username(&username).await?.is_some() {
            return Err(ServiceError::Conflict(format!("User '{}' already exists", username)));
        }

        let user = self
            .users
            .create_user(&NewUser {
                avatar_url: Some(default_avatar_url(&username)),
                password_hash: hash_password(password)?,
                username,
                level,
            })
            .await?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check credentials and issue a bearer token
    pub async fn login(&self, username: &str, password: &str, now: DateTime<Utc>) -> ServiceResult<String> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::validation("Username and password are required"));
        }

        let username = normalize_username(username);
        let Some(user) = self.users.find_user_by_username(&username).await? else {
            warn!("Login attempt for unknown user '{}'", username);
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.active || !verify_password(password, &user.password_hash)? {
            warn!("Rejected login for user {}", user.id);
            return Err(ServiceError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        Ok(self.tokens.issue(user.id, now)?)
    }

    /// User id carried by a valid token
    pub fn authenticate(&self, token: &str) -> Option<i64> {
        match self.tokens.verify(token) {
            Ok(user_id) => Some(user_id),
            Err(e) => {
                debug!("Token rejected: {}", e);
                None
            }
        }
    }

    /// Rename and re-level a user; the password changes only when a non-blank one is given
    pub async fn update_user(
        &self,
        user_id: i64,
        username: &str,
        password: Option<&str>,
        level: i32,
    ) -> ServiceResult<User> {
        info!("Updating user {}", user_id);
        let mut user = self.require_user(user_id).await?;

        let username = normalize_username(username);
        if username.is_empty() {
            return Err(ServiceError::validation("Username is required"));
        }
        if let Some(other) = self.users.find_user_by_username(&username).await? {
            if other.id != user_id {
                return Err(ServiceError::Conflict(format!("User '{}' already exists", username)));
            }
        }

        user.username = username;
        user.level = level;
        if let Some(password) = password.filter(|p| !p.trim().is_empty()) {
            user.password_hash = hash_password(password)?;
        }

        self.users.update_user(&user).await?;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: i64) -> ServiceResult<()> {
        info!("Deleting user {}", user_id);
        if !self.users.delete_user(user_id).await? {
            return Err(ServiceError::NotFound(EntityKind::User));
        }
        Ok(())
    }

    pub async fn list_users(&self, query: UserQuery) -> ServiceResult<UserListing> {
        if let Some(user_id) = query.user_id {
            let user = self.require_user(user_id).await?;
            let mut with_presence = self.attach_presence(vec![user]).await?;
            return with_presence
                .pop()
                .map(UserListing::Single)
                .ok_or(ServiceError::NotFound(EntityKind::User));
        }

        let filter = UserFilter {
            name_prefix: non_blank(query.search_name),
            position_prefix: non_blank(query.search_position),
        };
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_USERS_PER_PAGE);
        let searching = filter.name_prefix.is_some() || filter.position_prefix.is_some();
        let page = if searching {
            1
        } else {
            query.page.filter(|p| *p > 0).unwrap_or(1)
        };

        let total_users = self.users.count_users(&filter).await?;
        let skip = (page - 1).saturating_mul(limit);
        let users = self.users.list_users(&filter, skip, limit).await?;
        let total_pages = u32::try_from(total_users.div_ceil(u64::from(limit))).unwrap_or(u32::MAX);

        debug!("Listing users page {} of {} ({} total)", page, total_pages, total_users);
        Ok(UserListing::Page(UserPage {
            users: self.attach_presence(users).await?,
            current_page: page,
            total_pages,
            total_users,
        }))
    }

    /// Re-normalize every stored username; returns how many changed
    pub async fn fix_usernames(&self) -> ServiceResult<u64> {
        let mut fixed = 0;
        for mut user in self.users.list_all_users().await? {
            let normalized = normalize_username(&user.username);
            if normalized == user.username || normalized.is_empty() {
                continue;
            }
            if let Some(other) = self.users.find_user_by_username(&normalized).await? {
                if other.id != user.id {
                    warn!(
                        "Cannot normalize user {} to '{}': taken by user {}",
                        user.id, normalized, other.id
                    );
                    continue;
                }
            }

            user.username = normalized;
            self.users.update_user(&user).await?;
            fixed += 1;
        }

        info!("Normalized {} usernames", fixed);
        Ok(fixed)
    }

    /// Point every avatar at the generated image of the normalized username
    pub async fn refresh_avatars(&self) -> ServiceResult<Vec<User>> {
        let mut refreshed = Vec::new();
        for mut user in self.users.list_all_users().await? {
            user.avatar_url = Some(default_avatar_url(&normalize_username(&user.username)));
            self.users.update_user(&user).await?;
            refreshed.push(user);
        }

        info!("Refreshed {} avatars", refreshed.len());
        Ok(refreshed)
    }

    /// Store an uploaded avatar image and link it to the user
    pub async fn upload_avatar(&self, user_id: i64, content_type: Option<&str>, data: &[u8]) -> ServiceResult<User> {
        let mut user = self.require_user(user_id).await?;

        let extension = match content_type {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            Some("image/webp") => "webp",
            other => {
                warn!("Rejected avatar of type {:?} for user {}", other, user_id);
                return Err(ServiceError::validation("Only PNG, JPEG or WEBP images are allowed"));
            }
        };
        if data.is_empty() {
            return Err(ServiceError::validation("The uploaded file is empty"));
        }

        let file_name = format!("{}-{}.{}", Utc::now().timestamp_millis(), Uuid::new_v4(), extension);
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.upload_dir.display()))?;
        tokio::fs::write(self.upload_dir.join(&file_name), data)
            .await
            .with_context(|| format!("Failed to write avatar {}", file_name))?;

        user.avatar_url = Some(format!("{}/{}", AVATAR_URL_PREFIX, file_name));
        self.users.update_user(&user).await?;

        info!("Stored avatar {} for user {}", file_name, user_id);
        Ok(user)
    }

    async fn require_user(&self, user_id: i64) -> ServiceResult<User> {
        self.users
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound(EntityKind::User))
    }

    async fn attach_presence(&self, users: Vec<User>) -> ServiceResult<Vec<UserWithPresence>> {
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let mut by_user: HashMap<i64, Vec<_>> = HashMap::new();
        for record in self.presence.list_presence_for_users(&ids).await? {
            by_user.entry(record.user_id).or_default().push(record);
        }

        Ok(users
            .into_iter()
            .map(|user| UserWithPresence {
                presence: by_user.remove(&user.id).unwrap_or_default(),
                user,
            })
            .collect())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
