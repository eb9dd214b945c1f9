//! Database repository for the operation log.
//!
//! Log rows are append-only: they are written by the audit middleware, listed by the admin API
//! and pruned by the retention task. Nothing updates or deletes individual rows, so this does not
//! implement [`Repository`](super::Repository).

use crate::{
    db::{
        errors::Result,
        models::operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse},
    },
    types::{OperationLogId, SortOrder},
};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, query_builder::QueryBuilder};
use tracing::instrument;

/// Column operation logs are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationLogOrder {
    #[default]
    Id,
    CreatedAt,
}

impl OperationLogOrder {
    fn column(self) -> &'static str {
        match self {
            OperationLogOrder::Id => "l.id",
            OperationLogOrder::CreatedAt => "l.created_at",
        }
    }
}

/// Filter for listing operation logs
#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    pub skip: i64,
    pub limit: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Substring of the username
    pub username: Option<String>,
    /// Exact, case-insensitive
    pub method: Option<String>,
    /// Substring of the request path
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub order_by: OperationLogOrder,
    pub order: SortOrder,
}

impl OperationLogFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(start_time) = self.start_time {
            query.push(" AND l.created_at >= ");
            query.push_bind(start_time);
        }
        if let Some(end_time) = self.end_time {
            query.push(" AND l.created_at <= ");
            query.push_bind(end_time);
        }
        if let Some(username) = &self.username {
            query.push(" AND l.username ILIKE ");
            query.push_bind(format!("%{username}%"));
        }
        if let Some(method) = &self.method {
            query.push(" AND l.method = ");
            query.push_bind(method.to_uppercase());
        }
        if let Some(path) = &self.path {
            query.push(" AND l.path ILIKE ");
            query.push_bind(format!("%{path}%"));
        }
        if let Some(status_code) = self.status_code {
            query.push(" AND l.status_code = ");
            query.push_bind(status_code);
        }
    }
}

pub struct OperationLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OperationLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path), err)]
    pub async fn create(&mut self, request: &OperationLogCreateDBRequest) -> Result<OperationLogId> {
        let (id,): (OperationLogId,) = sqlx::query_as(
            r#"
            INSERT INTO operation_logs
                (user_id, username, method, path, route_name, request, response, status_code, ip, user_agent, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(request.user_id)
        .bind(&request.username)
        .bind(&request.method)
        .bind(&request.path)
        .bind(&request.route_name)
        .bind(&request.request)
        .bind(&request.response)
        .bind(request.status_code)
        .bind(&request.ip)
        .bind(&request.user_agent)
        .bind(request.duration_ms)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(id)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>> {
        let mut query = QueryBuilder::new("SELECT l.*, u.nickname FROM operation_logs l LEFT JOIN users u ON u.id = l.user_id WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(
            " ORDER BY {} {}, l.id {} LIMIT ",
            filter.order_by.column(),
            filter.order.as_sql(),
            filter.order.as_sql()
        ));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let logs = query.build_query_as::<OperationLogDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(logs)
    }

    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &OperationLogFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM operation_logs l WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Keep the `retain` most recent rows and delete the rest. Returns the number deleted.
    #[instrument(skip(self), err)]
    pub async fn retain_newest(&mut self, retain: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM operation_logs
            WHERE id < (
                SELECT COALESCE(MIN(id), 0) FROM (
                    SELECT id FROM operation_logs ORDER BY id DESC LIMIT $1
                ) newest
            )
            "#,
        )
        .bind(retain.max(0))
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn entry(path: &str, status_code: i32) -> OperationLogCreateDBRequest {
        OperationLogCreateDBRequest {
            username: "admin".to_string(),
            method: "POST".to_string(),
            path: path.to_string(),
            status_code,
            ..Default::default()
        }
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_retain_newest(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = OperationLogs::new(&mut conn);
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(repo.create(&entry(&format!("/admin/api/roles/{i}"), 200)).await.unwrap());
        }

        assert_eq!(repo.retain_newest(2).await.unwrap(), 3);
        let remaining: Vec<OperationLogId> = repo.list(&OperationLogFilter::new(0, 10)).await.unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(remaining, vec![ids[4], ids[3]]);

        assert_eq!(repo.retain_newest(10).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = OperationLogs::new(&mut conn);
        repo.create(&entry("/admin/api/users", 200)).await.unwrap();
        repo.create(&entry("/admin/api/users/1", 404)).await.unwrap();
        repo.create(&entry("/admin/api/roles", 200)).await.unwrap();

        let filter = OperationLogFilter {
            path: Some("users".to_string()),
            ..OperationLogFilter::new(0, 10)
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let filter = OperationLogFilter {
            status_code: Some(404),
            method: Some("post".to_string()),
            ..OperationLogFilter::new(0, 10)
        };
        let logs = repo.list(&filter).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].path, "/admin/api/users/1");
        assert_eq!(logs[0].nickname, None);
    }
}
