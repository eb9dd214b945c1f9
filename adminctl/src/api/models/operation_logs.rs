//! API models for the operation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    api::models::pagination::Pagination,
    db::models::operation_logs::OperationLogDBResponse,
    types::{OperationLogId, UserId},
};

#[derive(Debug, Clone, Serialize)]
pub struct OperationLogResponse {
    pub id: OperationLogId,
    pub user_id: Option<UserId>,
    pub username: String,
    pub nickname: String,
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

impl From<OperationLogDBResponse> for OperationLogResponse {
    fn from(db: OperationLogDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            username: db.username,
            nickname: db.nickname.unwrap_or_default(),
            method: db.method,
            path: db.path,
            route_name: db.route_name,
            request: db.request,
            response: db.response,
            status_code: db.status_code,
            ip: db.ip,
            user_agent: db.user_agent,
            duration_ms: db.duration_ms,
            created_at: db.created_at,
        }
    }
}

/// `start_time` and `end_time` are RFC 3339 timestamps.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ListOperationLogsQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub username: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub status_code: Option<i32>,
}
