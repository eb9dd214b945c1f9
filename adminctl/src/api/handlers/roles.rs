use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::collections::HashMap;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        permissions::PermissionResponse,
        response::ApiResponse,
        roles::{ListRolesQuery, RoleCreate, RolePermissionsUpdate, RoleResponse, RoleUpdate},
    },
    db::{
        handlers::{Permissions, Repository, Roles, roles::RoleFilter},
        models::roles::{RoleCreateDBRequest, RoleUpdateDBRequest},
    },
    errors::{Error, Result},
    types::RoleId,
};

fn role_not_found(id: RoleId) -> Error {
    Error::NotFound {
        resource: "Role".to_string(),
        id: id.to_string(),
    }
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Role name is required".to_string(),
        });
    }
    Ok(name.to_string())
}

/// List roles, each with its full permission rows
#[tracing::instrument(skip_all)]
pub async fn list_roles(State(state): State<AppState>, Query(query): Query<ListRolesQuery>) -> Result<ApiResponse<PaginatedResponse<RoleResponse>>> {
    let filter = RoleFilter {
        name: query.name.filter(|s| !s.is_empty()),
        order: query.pagination.order()?,
        ..RoleFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (roles, total) = {
        let mut repo = Roles::new(&mut conn);
        (repo.list(&filter).await?, repo.count(&filter).await?)
    };

    let role_ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
    let permissions: HashMap<_, _> = if role_ids.is_empty() {
        HashMap::new()
    } else {
        Permissions::new(&mut conn)
            .for_roles(&role_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, PermissionResponse::from(p)))
            .collect()
    };

    let list = roles
        .into_iter()
        .map(|role| {
            let granted = role.permission_ids.iter().filter_map(|id| permissions.get(id).cloned()).collect();
            RoleResponse::from(role).with_permissions(granted)
        })
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(list, total, &query.pagination)))
}

#[tracing::instrument(skip_all)]
pub async fn create_role(State(state): State<AppState>, Json(request): Json<RoleCreate>) -> Result<ApiResponse<RoleResponse>> {
    let name = require_name(&request.name)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut conn)
        .create(&RoleCreateDBRequest {
            name,
            description: request.description,
            permission_ids: request.permission_ids,
        })
        .await?;

    info!(role_id = role.id, "Role created");
    Ok(ApiResponse::with_message(RoleResponse::from(role), "Role created"))
}

#[tracing::instrument(skip_all, fields(role_id = id))]
pub async fn update_role(State(state): State<AppState>, Path(id): Path<RoleId>, Json(request): Json<RoleUpdate>) -> Result<ApiResponse<RoleResponse>> {
    let name = request.name.as_deref().map(require_name).transpose()?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut tx);
    let existing = repo.get_by_id(id).await?.ok_or_else(|| role_not_found(id))?;

    // Super-admin status is decided by role name, so renaming it would lock everyone out
    if existing.name == state.config.auth.super_admin_role && name.as_deref().is_some_and(|n| n != existing.name) {
        return Err(Error::BadRequest {
            message: "The super admin role cannot be renamed".to_string(),
        });
    }

    let role = repo
        .update(
            id,
            &RoleUpdateDBRequest {
                name,
                description: request.description,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiResponse::with_message(RoleResponse::from(role), "Role updated"))
}

#[tracing::instrument(skip_all, fields(role_id = id))]
pub async fn delete_role(State(state): State<AppState>, Path(id): Path<RoleId>) -> Result<ApiResponse<()>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut tx);
    let existing = repo.get_by_id(id).await?.ok_or_else(|| role_not_found(id))?;

    if existing.name == state.config.auth.super_admin_role {
        return Err(Error::BadRequest {
            message: "The super admin role cannot be deleted".to_string(),
        });
    }

    repo.delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(role_id = id, "Role deleted");
    Ok(ApiResponse::message("Role deleted"))
}

/// Replace the permission set of a role
#[tracing::instrument(skip_all, fields(role_id = id, count = request.permission_ids.len()))]
pub async fn assign_permissions(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    Json(request): Json<RolePermissionsUpdate>,
) -> Result<ApiResponse<RoleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut conn).set_permissions(id, &request.permission_ids).await?;

    Ok(ApiResponse::with_message(RoleResponse::from(role), "Role permissions updated"))
}
