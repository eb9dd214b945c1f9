//! API request/response models for roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::{pagination::Pagination, permissions::PermissionResponse},
    db::models::roles::RoleDBResponse,
    types::{PermissionId, RoleId},
};

#[derive(Debug, Clone, Serialize)]
pub struct RoleResponse {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permission_ids: Vec<PermissionId>,
    /// Full permission rows, filled on list responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<PermissionResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            permission_ids: db.permission_ids,
            permissions: None,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl RoleResponse {
    pub fn with_permissions(mut self, permissions: Vec<PermissionResponse>) -> Self {
        self.permissions = Some(permissions);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolePermissionsUpdate {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRolesQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    pub name: Option<String>,
}
