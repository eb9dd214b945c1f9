use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{
            ChangePasswordRequest, LoginData, LoginRequest, LoginResponse, LoginUser, LogoutResponse, UpdateAvatarRequest,
            UserPermissionsResponse,
        },
        permissions::PermissionResponse,
        response::ApiResponse,
        users::{CurrentUser, UserResponse},
    },
    auth::{
        captcha::CaptchaChallenge,
        password,
        session::SessionSubject,
        utils::{clear_session_cookie, session_cookie},
    },
    db::{
        handlers::{Permissions, Repository, Users},
        models::users::UserUpdateDBRequest,
    },
    errors::{Error, Result},
};

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Issue a login captcha
#[tracing::instrument(skip_all)]
pub async fn get_captcha(State(state): State<AppState>) -> ApiResponse<CaptchaChallenge> {
    ApiResponse::ok(state.captcha.generate().await)
}

/// Login with username and password
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse> {
    if state.config.auth.captcha.enabled {
        let (Some(captcha_id), Some(captcha_val)) = (request.captcha_id.as_deref(), request.captcha_val.as_deref()) else {
            return Err(Error::BadRequest {
                message: "Captcha is required".to_string(),
            });
        };
        if !state.captcha.verify(captcha_id, captcha_val).await {
            return Err(Error::BadRequest {
                message: "Invalid or expired captcha".to_string(),
            });
        }
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_username(&request.username)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some(INVALID_CREDENTIALS.to_string()),
        })?;

    // Verify on a blocking thread to avoid stalling the runtime
    if !password::verify_blocking(request.password, user.password_hash.clone()).await? {
        return Err(Error::Unauthenticated {
            message: Some(INVALID_CREDENTIALS.to_string()),
        });
    }

    if !user.status.is_enabled() {
        return Err(Error::Forbidden {
            message: "account disabled".to_string(),
        });
    }

    let is_super_admin = user.has_role_named(&state.config.auth.super_admin_role);
    let subject = SessionSubject {
        user_id: user.id,
        username: user.username.clone(),
        nickname: user.nickname.clone(),
        kind: user.kind,
        is_super_admin,
        role_ids: user.role_ids(),
        token_version: user.token_version,
    };
    let token = state.access.codec().issue(&subject)?;
    let cookie = session_cookie(&token, &state.config.auth.session);

    info!(user_id = user.id, is_super_admin, "User logged in");
    metrics::counter!("adminctl_logins_total").increment(1);

    Ok(LoginResponse {
        data: LoginData {
            token,
            user: LoginUser::new(UserResponse::from(user), is_super_admin),
        },
        cookie,
    })
}

/// End every session of the caller
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn logout(State(state): State<AppState>, current_user: CurrentUser) -> Result<LogoutResponse> {
    // Must be durable before the response goes out, or the old token keeps working
    state.access.users().increment_token_version(current_user.id).await?;

    Ok(LogoutResponse {
        cookie: clear_session_cookie(state.access.cookie_name()),
    })
}

/// Change the caller's password. Existing sessions, including this one, stop working.
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    password::validate_length(&request.new_password, &state.config.auth.password)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let user = repo.get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    if !password::verify_blocking(request.old_password, user.password_hash).await? {
        return Err(Error::BadRequest {
            message: "Old password is incorrect".to_string(),
        });
    }

    let password_hash = password::hash_blocking(request.new_password, &state.config.auth.password).await?;
    repo.update(
        current_user.id,
        &UserUpdateDBRequest {
            password_hash: Some(password_hash),
            ..Default::default()
        },
    )
    .await?;

    info!(user_id = current_user.id, "Password changed");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(state.access.cookie_name()))],
        ApiResponse::message("Password changed, please sign in again"),
    ))
}

#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UpdateAvatarRequest>,
) -> Result<ApiResponse<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                avatar: Some(request.avatar),
                ..Default::default()
            },
        )
        .await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// The permissions granted to the caller through their roles
#[tracing::instrument(skip_all, fields(user_id = current_user.id))]
pub async fn get_user_permissions(State(state): State<AppState>, current_user: CurrentUser) -> Result<ApiResponse<UserPermissionsResponse>> {
    if current_user.is_super_admin {
        return Ok(ApiResponse::ok(UserPermissionsResponse {
            is_super_admin: true,
            permissions: Vec::new(),
        }));
    }

    let permissions = if current_user.role_ids.is_empty() {
        Vec::new()
    } else {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Permissions::new(&mut conn).for_roles(&current_user.role_ids).await?
    };

    Ok(ApiResponse::ok(UserPermissionsResponse {
        is_super_admin: false,
        permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
    }))
}
