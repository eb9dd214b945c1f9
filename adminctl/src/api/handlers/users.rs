use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        response::ApiResponse,
        users::{CurrentUser, ListUsersQuery, ResetPasswordResponse, UserCreate, UserResponse, UserUpdate},
    },
    auth::password,
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Status, UserId},
};

/// Length of passwords produced by the reset endpoint
const RESET_PASSWORD_LENGTH: usize = 6;

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, Query(query): Query<ListUsersQuery>) -> Result<ApiResponse<PaginatedResponse<UserResponse>>> {
    let status = query
        .status
        .map(Status::try_from)
        .transpose()
        .map_err(|message| Error::BadRequest { message })?;

    let filter = UserFilter {
        username: query.username.filter(|s| !s.is_empty()),
        nickname: query.nickname.filter(|s| !s.is_empty()),
        kind: query.kind,
        status,
        role_id: query.role_id,
        order: query.pagination.order()?,
        ..UserFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn create_user(State(state): State<AppState>, Json(request): Json<UserCreate>) -> Result<ApiResponse<UserResponse>> {
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::BadRequest {
            message: "Username is required".to_string(),
        });
    }
    password::validate_length(&request.password, &state.config.auth.password)?;

    let password_hash = password::hash_blocking(request.password, &state.config.auth.password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username,
            password_hash,
            nickname: request.nickname.unwrap_or_default(),
            avatar: request.avatar.unwrap_or_default(),
            kind: request.kind.unwrap_or_default(),
            status: request.status.unwrap_or(Status::Enabled),
            remark: request.remark.unwrap_or_default(),
            role_ids: request.role_ids,
        })
        .await?;

    info!(user_id = user.id, "User created");
    Ok(ApiResponse::with_message(UserResponse::from(user), "User created"))
}

#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn update_user(State(state): State<AppState>, Path(id): Path<UserId>, Json(request): Json<UserUpdate>) -> Result<ApiResponse<UserResponse>> {
    let password_hash = match request.password.filter(|p| !p.is_empty()) {
        Some(new_password) => {
            password::validate_length(&new_password, &state.config.auth.password)?;
            Some(password::hash_blocking(new_password, &state.config.auth.password).await?)
        }
        None => None,
    };

    let update = UserUpdateDBRequest {
        nickname: request.nickname,
        avatar: request.avatar,
        kind: request.kind,
        remark: request.remark,
        status: None,
        password_hash,
        role_ids: request.role_ids,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).update(id, &update).await?;

    if update.revokes_sessions() {
        info!(user_id = id, "User credentials or roles changed, existing sessions revoked");
    }
    Ok(ApiResponse::with_message(UserResponse::from(user), "User updated"))
}

#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<UserId>, current_user: CurrentUser) -> Result<ApiResponse<()>> {
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Users::new(&mut conn).delete(id).await? {
        return Err(user_not_found(id));
    }

    Ok(ApiResponse::message("User deleted"))
}

/// Replace the user's password with a random one and return it once.
#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn reset_password(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<ApiResponse<ResetPasswordResponse>> {
    let new_password = password::generate_password(RESET_PASSWORD_LENGTH);
    let password_hash = password::hash_blocking(new_password.clone(), &state.config.auth.password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut conn)
        .update(
            id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    info!(user_id = id, "Password reset");
    Ok(ApiResponse::with_message(
        ResetPasswordResponse { password: new_password },
        "Password reset",
    ))
}

#[tracing::instrument(skip_all, fields(user_id = id))]
pub async fn toggle_status(State(state): State<AppState>, Path(id): Path<UserId>, current_user: CurrentUser) -> Result<ApiResponse<UserResponse>> {
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot disable your own account".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);
    let user = repo.get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

    let user = repo
        .update(
            id,
            &UserUpdateDBRequest {
                status: Some(user.status.toggled()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(user_id = id, status = %user.status, "User status toggled");
    Ok(ApiResponse::ok(UserResponse::from(user)))
}
