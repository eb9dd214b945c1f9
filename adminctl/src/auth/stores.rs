//! Storage capabilities the access decision depends on.
//!
//! The decision chain only needs three things from storage: a user's status and token version,
//! an atomic token version bump, and the permissions attached to a set of roles. Keeping these
//! behind traits lets the chain run against Postgres in production and in-memory stores in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    db::errors::Result,
    types::{PermissionId, RoleId, Status, UserId},
};

/// The slice of a user record consulted on every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub status: Status,
    pub token_version: i64,
}

/// A permission row as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: PermissionId,
    pub method: String,
    pub path: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id. `Ok(None)` when no such user exists.
    async fn find_for_auth(&self, id: UserId) -> Result<Option<AuthUser>>;

    /// Atomically add one to the user's token version. Must be durable when this returns.
    async fn increment_token_version(&self, id: UserId) -> Result<()>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Union of the permissions attached to the given roles, deduplicated by id. An empty role
    /// set yields an empty result.
    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> Result<Vec<PermissionGrant>>;
}
