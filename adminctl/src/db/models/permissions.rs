//! Database models for route permissions.

use crate::types::PermissionId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct PermissionCreateDBRequest {
    pub path: String,
    /// Stored uppercased
    pub method: String,
    pub name: String,
    pub group_name: String,
    pub description: String,
    pub auto_import: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionUpdateDBRequest {
    pub name: Option<String>,
    pub group_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PermissionDBResponse {
    pub id: PermissionId,
    pub path: String,
    pub method: String,
    pub name: String,
    pub group_name: String,
    pub description: String,
    pub auto_import: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
