//! Database models for the operation log.

use crate::types::{OperationLogId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct OperationLogCreateDBRequest {
    pub user_id: Option<UserId>,
    pub username: String,
    pub method: String,
    pub path: String,
    pub route_name: String,
    pub request: String,
    pub response: String,
    pub status_code: i32,
    pub ip: String,
    pub user_agent: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationLogDBResponse {
    pub id: OperationLogId,
    pub user_id: Option<UserId>,
    pub username: String,
    /// Current nickname of the acting user, joined at read time
    pub nickname: Option<String>,
    pub method: String,
    pub path: String,
    pub route_name: String,
    pub request: String,
    pub response: String,
    pub status_code: i32,
    pub ip: String,
    pub user_agent: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
