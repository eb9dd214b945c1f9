//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts, role assignments and token versions
//! - [`Roles`]: Roles and their permission sets
//! - [`Permissions`]: Route permission rows
//! - [`DictTypes`] / [`DictItems`]: Key/value dictionaries
//! - [`OperationLogs`]: Audit trail (append, list, retention; not a [`Repository`])
//!
//! # Common Pattern
//!
//! ```ignore
//! use adminctl::db::handlers::{Users, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Users::new(&mut conn);
//!
//!     let filter = UserFilter::new(0, 10);
//!     let users = repo.list(&filter).await?;
//!     let total = repo.count(&filter).await?;
//!     Ok(())
//! }
//! ```

pub mod dictionaries;
pub mod operation_logs;
pub mod permissions;
pub mod repository;
pub mod roles;
pub mod users;

pub use dictionaries::{DictItems, DictTypes};
pub use operation_logs::OperationLogs;
pub use permissions::Permissions;
pub use repository::Repository;
pub use roles::Roles;
pub use users::Users;

use crate::{
    db::errors::{DbError, Result},
    types::Status,
};

/// Status columns carry a check constraint, so a bad value means the schema and code disagree.
pub(crate) fn decode_status(raw: i16) -> Result<Status> {
    Status::try_from(raw).map_err(|e| DbError::Other(anyhow::anyhow!(e)))
}
