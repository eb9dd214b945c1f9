//! Database models for dictionary types and items.

use crate::types::{DictItemId, DictTypeId, Status};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct DictTypeCreateDBRequest {
    pub code: String,
    pub name: String,
    pub remark: String,
}

#[derive(Debug, Clone, Default)]
pub struct DictTypeUpdateDBRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DictTypeDBResponse {
    pub id: DictTypeId,
    pub code: String,
    pub name: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DictItemCreateDBRequest {
    pub type_id: DictTypeId,
    pub label: String,
    pub value: String,
    pub sort: i32,
    pub status: Status,
    pub remark: String,
}

#[derive(Debug, Clone, Default)]
pub struct DictItemUpdateDBRequest {
    pub label: Option<String>,
    pub value: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<Status>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DictItemDBResponse {
    pub id: DictItemId,
    pub type_id: DictTypeId,
    pub label: String,
    pub value: String,
    pub sort: i32,
    pub status: Status,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
