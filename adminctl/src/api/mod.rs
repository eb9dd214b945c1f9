//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`routing`]**: Route declaration, feeding both the router and the permission registry
//!
//! # API Structure
//!
//! - **Public** (`/api/*`): captcha and login
//! - **Session** (`/admin/api/logout`, `/admin/api/profile/*`, `/admin/api/user/permissions`):
//!   any signed-in user
//! - **Protected** (`/admin/api/users`, `roles`, `permissions`, `dictionaries`,
//!   `operation-logs`): require a permission matching the request

pub mod handlers;
pub mod models;
pub mod routing;
