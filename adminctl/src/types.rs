//! Common type definitions shared by the auth core, the repositories and the API layer.
//!
//! # ID Types
//!
//! Entity IDs are Postgres `BIGSERIAL` values wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`RoleId`]: Role identifier
//! - [`PermissionId`]: Permission row identifier
//! - [`DictTypeId`] / [`DictItemId`]: Dictionary identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for IDs
pub type UserId = i64;
pub type RoleId = i64;
pub type PermissionId = i64;
pub type DictTypeId = i64;
pub type DictItemId = i64;
pub type OperationLogId = i64;

/// Account status stored as a small integer (`0` disabled, `1` enabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Status {
    Disabled,
    Enabled,
}

impl Status {
    pub fn is_enabled(self) -> bool {
        matches!(self, Status::Enabled)
    }

    /// The opposite status, used by the toggle endpoint.
    pub fn toggled(self) -> Self {
        match self {
            Status::Disabled => Status::Enabled,
            Status::Enabled => Status::Disabled,
        }
    }
}

impl From<Status> for i16 {
    fn from(status: Status) -> Self {
        match status {
            Status::Disabled => 0,
            Status::Enabled => 1,
        }
    }
}

impl TryFrom<i16> for Status {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Disabled),
            1 => Ok(Status::Enabled),
            other => Err(format!("invalid status {other}, expected 0 or 1")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Disabled => write!(f, "disabled"),
            Status::Enabled => write!(f, "enabled"),
        }
    }
}

/// Sort direction for list queries. Lists default to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
