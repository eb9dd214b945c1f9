//! Database models for roles.

use crate::types::{PermissionId, RoleId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub description: String,
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permission_ids: Vec<PermissionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
