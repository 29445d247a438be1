use shared::{
    AvatarEntry, User as SharedUser, UserListQuery, UserListResponse, UserPageResponse,
    UserWithPresence as SharedUserWithPresence,
};

use super::presence_mapper::PresenceMapper;
use crate::domain::models::user::{User, UserListing, UserWithPresence};
use crate::domain::user_service::UserQuery;

/// Mapper between user DTOs and domain models. The password hash is dropped here.
pub struct UserMapper;

impl UserMapper {
    pub fn to_dto(domain: User) -> SharedUser {
        SharedUser {
            id: domain.id,
            username: domain.username,
            level: domain.level,
            active: domain.active,
            avatar_url: domain.avatar_url,
            position: domain.position,
        }
    }

    pub fn to_query(query: UserListQuery) -> UserQuery {
        UserQuery {
            user_id: query.user_id,
            search_name: query.search_name,
            search_position: query.search_position,
            page: query.page,
            limit: query.limit,
        }
    }

    pub fn to_with_presence_dto(domain: UserWithPresence) -> SharedUserWithPresence {
        SharedUserWithPresence {
            user: Self::to_dto(domain.user),
            presence: domain.presence.into_iter().map(PresenceMapper::to_dto).collect(),
        }
    }

    pub fn to_listing_dto(listing: UserListing) -> UserListResponse {
        match listing {
            UserListing::Single(user) => UserListResponse::Single(Self::to_with_presence_dto(user)),
            UserListing::Page(page) => UserListResponse::Page(UserPageResponse {
                data: page.users.into_iter().map(Self::to_with_presence_dto).collect(),
                current_page: page.current_page,
                total_pages: page.total_pages,
                total_users: page.total_users,
            }),
        }
    }

    pub fn to_avatar_entry(domain: User) -> AvatarEntry {
        AvatarEntry {
            id: domain.id,
            username: domain.username,
            avatar_url: domain.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dto_never_carries_the_hash() {
        let dto = UserMapper::to_dto(User {
            id: 1,
            username: "ana".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            level: 2,
            active: true,
            avatar_url: None,
            position: Some("PROFESSORA".to_string()),
        });

        let json = serde_json::to_string(&dto).unwrap();
        assert!(!json.contains("argon2"));
        assert_eq!(dto.position.as_deref(), Some("PROFESSORA"));
    }
}
