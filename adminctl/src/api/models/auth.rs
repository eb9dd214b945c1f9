//! Authentication request/response models.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::{
        permissions::PermissionResponse,
        response::ApiResponse,
        users::{RoleRef, UserResponse},
    },
    types::UserId,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Required when the login captcha is enabled
    pub captcha_id: Option<String>,
    pub captcha_val: Option<String>,
}

/// Profile returned alongside a fresh session.
#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: UserId,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub kind: i16,
    pub is_super_admin: bool,
    pub roles: Vec<RoleRef>,
}

impl LoginUser {
    pub fn new(user: UserResponse, is_super_admin: bool) -> Self {
        Self {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            avatar: user.avatar,
            kind: user.kind,
            is_super_admin,
            roles: user.roles,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginData {
    pub token: String,
    pub user: LoginUser,
}

/// Login result plus the `Set-Cookie` value carrying the session.
#[derive(Debug)]
pub struct LoginResponse {
    pub data: LoginData,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::SET_COOKIE, self.cookie)],
            ApiResponse::with_message(self.data, "Login successful"),
        )
            .into_response()
    }
}

/// Logout acknowledgement plus the `Set-Cookie` value clearing the session.
#[derive(Debug)]
pub struct LogoutResponse {
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [(header::SET_COOKIE, self.cookie)], ApiResponse::message("Logout successful")).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar: String,
}

/// What the caller may do. Super admins get an empty list: they are not limited by it.
#[derive(Debug, Clone, Serialize)]
pub struct UserPermissionsResponse {
    pub is_super_admin: bool,
    pub permissions: Vec<PermissionResponse>,
}
