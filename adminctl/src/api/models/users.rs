//! API request/response models for users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    api::models::pagination::Pagination,
    auth::session::SessionClaims,
    db::models::users::{UserDBResponse, UserRoleRef},
    types::{RoleId, Status, UserId},
};

/// The authenticated caller, as established by the access decision.
///
/// Built from the verified session claims, so role ids and the super-admin flag reflect the
/// moment the session was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub kind: i16,
    pub is_super_admin: bool,
    pub role_ids: Vec<RoleId>,
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            nickname: claims.nickname,
            kind: claims.kind,
            is_super_admin: claims.is_super_admin,
            role_ids: claims.role_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

impl From<UserRoleRef> for RoleRef {
    fn from(role: UserRoleRef) -> Self {
        Self { id: role.id, name: role.name }
    }
}

/// A user as shown by the admin API. Password hash and token version are never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub kind: i16,
    pub status: Status,
    pub remark: String,
    pub roles: Vec<RoleRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            nickname: db.nickname,
            avatar: db.avatar,
            kind: db.kind,
            status: db.status,
            remark: db.remark,
            roles: db.roles.into_iter().map(RoleRef::from).collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub kind: Option<i16>,
    pub status: Option<Status>,
    pub remark: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

/// Partial update. A present `password` or `role_ids` ends the user's existing sessions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub kind: Option<i16>,
    pub remark: Option<String>,
    pub password: Option<String>,
    pub role_ids: Option<Vec<RoleId>>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    pub username: Option<String>,
    pub nickname: Option<String>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub kind: Option<i16>,

    /// `0` disabled, `1` enabled
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub status: Option<i16>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub role_id: Option<RoleId>,
}

/// The one-time password produced by a reset. It is not stored in clear anywhere.
#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordResponse {
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_parses_numbers_through_flatten() {
        let query: ListUsersQuery = serde_urlencoded::from_str("page=2&page_size=5&username=ad&status=0&role_id=3").unwrap();
        assert_eq!(query.pagination.page(), 2);
        assert_eq!(query.pagination.page_size(), 5);
        assert_eq!(query.username.as_deref(), Some("ad"));
        assert_eq!(query.status, Some(0));
        assert_eq!(query.role_id, Some(3));
        assert_eq!(query.kind, None);
    }
}
