//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **No secrets on the wire**: password hashes and token versions never appear in responses
//! - **Uniform envelopes**: successes are wrapped in [`response::ApiResponse`], lists in
//!   [`pagination::PaginatedResponse`]
//!
//! # Model Categories
//!
//! - [`users`]: User profiles, the request-scoped [`users::CurrentUser`], create/update payloads
//! - [`roles`]: Roles and permission assignment
//! - [`permissions`]: Route permissions
//! - [`dictionaries`]: Dictionary types and items
//! - [`operation_logs`]: Audit trail entries
//! - [`auth`]: Login, logout and profile payloads
//! - [`pagination`]: Query parameters and list wrapper shared by list endpoints

pub mod auth;
pub mod dictionaries;
pub mod operation_logs;
pub mod pagination;
pub mod permissions;
pub mod response;
pub mod roles;
pub mod users;
