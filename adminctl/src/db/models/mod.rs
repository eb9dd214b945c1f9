//! Database record models matching table schemas.
//!
//! These are the request and response types repositories accept and return. They are distinct
//! from the API models in [`crate::api::models`] so storage and wire representations can evolve
//! independently.
//!
//! - [`users`]: User accounts and their role assignments
//! - [`roles`]: Roles and their permission assignments
//! - [`permissions`]: Route permissions (path + method)
//! - [`dictionaries`]: Dictionary types and items
//! - [`operation_logs`]: Audit trail entries

pub mod dictionaries;
pub mod operation_logs;
pub mod permissions;
pub mod roles;
pub mod users;
