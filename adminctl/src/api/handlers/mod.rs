//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Business logic execution via database repositories
//! - Response serialization into the [`ApiResponse`](crate::api::models::response::ApiResponse) envelope
//!
//! # Handler Modules
//!
//! - [`auth`]: Captcha, login, logout, password and avatar changes, own permissions
//! - [`dictionaries`]: Dictionary type and item CRUD
//! - [`operation_logs`]: Operation log listing
//! - [`permissions`]: Route permission CRUD and batch deletion
//! - [`roles`]: Role CRUD and permission assignment
//! - [`users`]: User CRUD, password reset and status toggling
//!
//! # Authentication
//!
//! Handlers do not check permissions themselves. The guards in [`crate::auth::middleware`] are
//! layered over each route when it is registered (see [`crate::api::routing`]), and handlers that
//! need the caller take a [`CurrentUser`](crate::api::models::users::CurrentUser) argument.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod auth;
pub mod dictionaries;
pub mod operation_logs;
pub mod permissions;
pub mod roles;
pub mod users;
