//! Postgres persistence.
//!
//! One repository per table lives in [`handlers`], each wrapping a `&mut PgConnection` so callers
//! choose between a pooled connection and a transaction. [`models`] holds the create/update
//! requests and the rows repositories hand back. [`PgAuthStore`] adapts the user and permission
//! repositories to the storage traits the access decision is written against.
//!
//! Multi-table writes (a user and its role links, a role and its permission set) run inside the
//! caller's transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let user = Users::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! Schema changes live in `migrations/` and are applied at startup through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    auth::stores::{AuthUser, PermissionGrant, RoleStore, UserStore},
    db::handlers::{Permissions, Users},
    types::{RoleId, UserId},
};

/// [`UserStore`] and [`RoleStore`] over the application's connection pool.
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgAuthStore {
    async fn find_for_auth(&self, id: UserId) -> errors::Result<Option<AuthUser>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).find_for_auth(id).await
    }

    async fn increment_token_version(&self, id: UserId) -> errors::Result<()> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).increment_token_version(id).await
    }
}

#[async_trait]
impl RoleStore for PgAuthStore {
    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> errors::Result<Vec<PermissionGrant>> {
        let mut conn = self.pool.acquire().await?;
        let permissions = Permissions::new(&mut conn).for_roles(role_ids).await?;
        Ok(permissions
            .into_iter()
            .map(|p| PermissionGrant {
                id: p.id,
                method: p.method,
                path: p.path,
            })
            .collect())
    }
}
