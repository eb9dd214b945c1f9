//! Middleware writing one operation log row per mutating admin request.
//!
//! Layered per route inside the auth guards, so only requests that passed the access decision
//! are buffered and recorded.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::{net::SocketAddr, time::Instant};
use tracing::{debug, error, warn};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    audit::{client_ip, format_body, user_agent},
    db::{handlers::OperationLogs, models::operation_logs::OperationLogCreateDBRequest},
    errors::Error,
};

fn is_audited(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Capture the request and response around `next` and store them on a background task.
///
/// The request body is read up to `max_request_bytes`; anything larger is refused with 413
/// before the handler runs.
pub async fn record_operation(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = &state.config.operation_log;
    if !config.enabled || !is_audited(request.method()) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let ip = client_ip(request.headers(), peer);
    let user_agent = user_agent(request.headers());
    let user = request.extensions().get::<CurrentUser>().cloned();

    let limit = state.config.max_request_bytes;
    let (parts, body) = request.into_parts();
    let request_bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(limit, "Failed to read request body: {e}");
            return Error::PayloadTooLarge { limit }.into_response();
        }
    };
    let request_text = format_body(&request_bytes, config.max_body_bytes);

    let response = next.run(Request::from_parts(parts, Body::from(request_bytes))).await;

    let (parts, body) = response.into_parts();
    let response_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read response body for operation log: {e}");
            Bytes::new()
        }
    };

    let entry = OperationLogCreateDBRequest {
        user_id: user.as_ref().map(|u| u.id),
        username: user.map(|u| u.username).unwrap_or_default(),
        method: method.to_string(),
        route_name: state.registry.lookup(method.as_str(), &path).name,
        path,
        request: request_text,
        response: format_body(&response_bytes, config.max_body_bytes),
        status_code: i32::from(parts.status.as_u16()),
        ip,
        user_agent,
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
    };

    let pool = state.db.clone();
    tokio::spawn(async move {
        if let Err(e) = save(&pool, &entry).await {
            warn!(method = %entry.method, path = %entry.path, "Failed to write operation log: {e}");
        }
    });

    Response::from_parts(parts, Body::from(response_bytes))
}

async fn save(pool: &PgPool, entry: &OperationLogCreateDBRequest) -> Result<(), Error> {
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(e.into()))?;
    OperationLogs::new(&mut conn).create(entry).await?;
    Ok(())
}
