//! Reconciliation of declared state into the database.
//!
//! - [`route_permissions`]: permission rows for every declared admin route

pub mod route_permissions;
