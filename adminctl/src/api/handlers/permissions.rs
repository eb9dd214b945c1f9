use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        permissions::{BatchDeletePermissions, BatchDeleteResponse, ListPermissionsQuery, PermissionCreate, PermissionResponse, PermissionUpdate},
        response::ApiResponse,
    },
    db::{
        errors::DbError,
        handlers::{Permissions, Repository, permissions::PermissionFilter},
        models::permissions::{PermissionCreateDBRequest, PermissionUpdateDBRequest},
    },
    errors::{Error, Result},
    types::PermissionId,
};

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Normalize and check the `(method, path)` of a hand-written permission.
fn validate_route(method: &str, path: &str) -> Result<(String, String)> {
    let method = method.trim().to_uppercase();
    if !METHODS.contains(&method.as_str()) {
        return Err(Error::BadRequest {
            message: format!("Unsupported method '{method}'"),
        });
    }

    let path = path.trim();
    if !path.starts_with('/') {
        return Err(Error::BadRequest {
            message: "Permission path must start with '/'".to_string(),
        });
    }
    Ok((method, path.to_string()))
}

#[tracing::instrument(skip_all)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<ListPermissionsQuery>,
) -> Result<ApiResponse<PaginatedResponse<PermissionResponse>>> {
    let filter = PermissionFilter {
        path: query.path.filter(|s| !s.is_empty()),
        name: query.name.filter(|s| !s.is_empty()),
        group_name: query.group.filter(|s| !s.is_empty()),
        method: query.method.filter(|s| !s.is_empty()),
        order: query.pagination.order()?,
        ..PermissionFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Permissions::new(&mut conn);
    let permissions = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        permissions.into_iter().map(PermissionResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[tracing::instrument(skip_all)]
pub async fn create_permission(State(state): State<AppState>, Json(request): Json<PermissionCreate>) -> Result<ApiResponse<PermissionResponse>> {
    let (method, path) = validate_route(&request.method, &request.path)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permission = Permissions::new(&mut conn)
        .create(&PermissionCreateDBRequest {
            path,
            method,
            name: request.name,
            group_name: request.group,
            description: request.description,
            auto_import: false,
        })
        .await?;

    info!(permission_id = permission.id, "Permission created");
    Ok(ApiResponse::with_message(PermissionResponse::from(permission), "Permission created"))
}

#[tracing::instrument(skip_all, fields(permission_id = id))]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<PermissionId>,
    Json(request): Json<PermissionUpdate>,
) -> Result<ApiResponse<PermissionResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permission = Permissions::new(&mut conn)
        .update(
            id,
            &PermissionUpdateDBRequest {
                name: request.name,
                group_name: request.group,
                description: request.description,
            },
        )
        .await?;

    Ok(ApiResponse::with_message(PermissionResponse::from(permission), "Permission updated"))
}

#[tracing::instrument(skip_all, fields(permission_id = id))]
pub async fn delete_permission(State(state): State<AppState>, Path(id): Path<PermissionId>) -> Result<ApiResponse<()>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Permissions::new(&mut conn).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Permission".to_string(),
            id: id.to_string(),
        });
    }

    Ok(ApiResponse::message("Permission deleted"))
}

/// Delete several permissions at once. Nothing is deleted unless every id exists.
#[tracing::instrument(skip_all, fields(count = request.ids.len()))]
pub async fn batch_delete_permissions(
    State(state): State<AppState>,
    Json(request): Json<BatchDeletePermissions>,
) -> Result<ApiResponse<BatchDeleteResponse>> {
    if request.ids.is_empty() {
        return Err(Error::BadRequest {
            message: "No permission ids given".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deleted = Permissions::new(&mut conn).delete_many(&request.ids).await.map_err(|e| match e {
        DbError::NotFound => Error::BadRequest {
            message: "Some permissions do not exist".to_string(),
        },
        other => Error::Database(other),
    })?;

    info!(deleted, "Permissions batch deleted");
    Ok(ApiResponse::with_message(BatchDeleteResponse { deleted }, "Permissions deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_route_normalizes() {
        let (method, path) = validate_route(" get ", " /admin/api/users/:id ").unwrap();
        assert_eq!(method, "GET");
        assert_eq!(path, "/admin/api/users/:id");
    }

    #[test]
    fn test_validate_route_rejects_bad_input() {
        assert!(matches!(validate_route("FETCH", "/x"), Err(Error::BadRequest { .. })));
        assert!(matches!(validate_route("GET", "admin/api"), Err(Error::BadRequest { .. })));
    }
}
