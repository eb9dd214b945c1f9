//! Database models for users.

use crate::types::{RoleId, Status, UserId};
use chrono::{DateTime, Utc};

/// Role reference attached to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoleRef {
    pub id: RoleId,
    pub name: String,
}

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub avatar: String,
    pub kind: i16,
    pub status: Status,
    pub remark: String,
    pub role_ids: Vec<RoleId>,
}

/// Database request for updating a user. `None` fields are left unchanged.
///
/// Changing the password or the role set bumps the token version, so sessions issued before the
/// change stop working.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub kind: Option<i16>,
    pub remark: Option<String>,
    pub status: Option<Status>,
    pub password_hash: Option<String>,
    pub role_ids: Option<Vec<RoleId>>,
}

impl UserUpdateDBRequest {
    pub fn revokes_sessions(&self) -> bool {
        self.password_hash.is_some() || self.role_ids.is_some()
    }
}

/// Database response for a user
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub avatar: String,
    pub kind: i16,
    pub status: Status,
    pub token_version: i64,
    pub remark: String,
    pub roles: Vec<UserRoleRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    pub fn role_ids(&self) -> Vec<RoleId> {
        self.roles.iter().map(|r| r.id).collect()
    }

    pub fn has_role_named(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }
}
