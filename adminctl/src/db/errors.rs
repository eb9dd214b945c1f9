//! Repository errors.
//!
//! Constraint failures keep the constraint and table names so the API layer can turn them into
//! messages like "This username is already taken". Anything else is opaque.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// No row with the requested id, or a batch referenced ids that do not exist
    #[error("Entity not found")]
    NotFound,

    #[error("Unique constraint violation on {}", table.as_deref().unwrap_or("unknown table"))]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error("Foreign key constraint violation on {}", table.as_deref().unwrap_or("unknown table"))]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error("Check constraint violation on {}", table.as_deref().unwrap_or("unknown table"))]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = &err else {
            return match err {
                sqlx::Error::RowNotFound => DbError::NotFound,
                other => DbError::Other(other.into()),
            };
        };

        let constraint = db_err.constraint().map(str::to_string);
        let table = db_err.table().map(str::to_string);
        let message = db_err.message().to_string();

        if db_err.is_unique_violation() {
            DbError::UniqueViolation { constraint, table, message }
        } else if db_err.is_foreign_key_violation() {
            DbError::ForeignKeyViolation { constraint, table, message }
        } else if db_err.is_check_violation() {
            DbError::CheckViolation { constraint, table, message }
        } else {
            DbError::Other(err.into())
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
