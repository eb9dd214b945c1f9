use axum::extract::{Query, State};

use crate::{
    AppState,
    api::models::{
        operation_logs::{ListOperationLogsQuery, OperationLogResponse},
        pagination::PaginatedResponse,
        response::ApiResponse,
    },
    db::handlers::{OperationLogs, operation_logs::OperationLogFilter},
    errors::{Error, Result},
};

/// List recorded operations, newest first unless `order_by` says otherwise
#[tracing::instrument(skip_all)]
pub async fn list_operation_logs(
    State(state): State<AppState>,
    Query(query): Query<ListOperationLogsQuery>,
) -> Result<ApiResponse<PaginatedResponse<OperationLogResponse>>> {
    if let (Some(start), Some(end)) = (query.start_time, query.end_time)
        && start > end
    {
        return Err(Error::BadRequest {
            message: "start_time must not be after end_time".to_string(),
        });
    }

    let (order_by, order) = query.pagination.operation_log_order()?;
    let filter = OperationLogFilter {
        start_time: query.start_time,
        end_time: query.end_time,
        username: query.username.filter(|s| !s.is_empty()),
        method: query.method.filter(|s| !s.is_empty()),
        path: query.path.filter(|s| !s.is_empty()),
        status_code: query.status_code,
        order_by,
        order,
        ..OperationLogFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = OperationLogs::new(&mut conn);
    let logs = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        logs.into_iter().map(OperationLogResponse::from).collect(),
        total,
        &query.pagination,
    )))
}
