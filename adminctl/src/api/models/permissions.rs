//! API request/response models for route permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{api::models::pagination::Pagination, db::models::permissions::PermissionDBResponse, types::PermissionId};

#[derive(Debug, Clone, Serialize)]
pub struct PermissionResponse {
    pub id: PermissionId,
    pub path: String,
    pub method: String,
    pub name: String,
    pub group: String,
    pub description: String,
    /// Row was created or last reconciled from the declared route table
    pub auto_import: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(db: PermissionDBResponse) -> Self {
        Self {
            id: db.id,
            path: db.path,
            method: db.method,
            name: db.name,
            group: db.group_name,
            description: db.description,
            auto_import: db.auto_import,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionCreate {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchDeletePermissions {
    pub ids: Vec<PermissionId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPermissionsQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    pub path: Option<String>,
    pub name: Option<String>,
    pub group: Option<String>,
    pub method: Option<String>,
}
