//! Database repository for roles.

use std::collections::HashMap;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
    },
    types::{PermissionId, RoleId, SortOrder},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, query_builder::QueryBuilder};
use tracing::instrument;

/// Filter for listing roles
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub skip: i64,
    pub limit: i64,
    /// Substring of the role name
    pub name: Option<String>,
    pub order: SortOrder,
}

impl RoleFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(name) = &self.name {
            query.push(" AND name ILIKE ");
            query.push_bind(format!("%{name}%"));
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Vec<PermissionId>, Role)> for RoleDBResponse {
    fn from((permission_ids, role): (Vec<PermissionId>, Role)) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            permission_ids,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>("INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING *")
            .bind(&request.name)
            .bind(&request.description)
            .fetch_one(&mut *tx)
            .await?;

        replace_permissions(&mut *tx, role.id, &request.permission_ids).await?;
        let permission_ids = permissions_for(&mut *tx, &[role.id]).await?.remove(&role.id).unwrap_or_default();

        tx.commit().await?;

        Ok(RoleDBResponse::from((permission_ids, role)))
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => {
                let permission_ids = permissions_for(&mut *self.db, &[role.id]).await?.remove(&role.id).unwrap_or_default();
                Ok(Some(RoleDBResponse::from((permission_ids, role))))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM roles WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(" ORDER BY id {} LIMIT ", filter.order.as_sql()));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let roles = query.build_query_as::<Role>().fetch_all(&mut *self.db).await?;

        let ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        let mut permissions = permissions_for(&mut *self.db, &ids).await?;

        Ok(roles
            .into_iter()
            .map(|role| {
                let permission_ids = permissions.remove(&role.id).unwrap_or_default();
                RoleDBResponse::from((permission_ids, role))
            })
            .collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM roles WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// User and permission associations go with the role (ON DELETE CASCADE).
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.description.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        let permission_ids = permissions_for(&mut *self.db, &[id]).await?.remove(&id).unwrap_or_default();
        Ok(RoleDBResponse::from((permission_ids, role)))
    }
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => {
                let permission_ids = permissions_for(&mut *self.db, &[role.id]).await?.remove(&role.id).unwrap_or_default();
                Ok(Some(RoleDBResponse::from((permission_ids, role))))
            }
            None => Ok(None),
        }
    }

    /// Replace the role's permission set.
    #[instrument(skip(self, permission_ids), fields(count = permission_ids.len()), err)]
    pub async fn set_permissions(&mut self, id: RoleId, permission_ids: &[PermissionId]) -> Result<RoleDBResponse> {
        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>("UPDATE roles SET updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        replace_permissions(&mut *tx, id, permission_ids).await?;
        let permission_ids = permissions_for(&mut *tx, &[id]).await?.remove(&id).unwrap_or_default();

        tx.commit().await?;

        Ok(RoleDBResponse::from((permission_ids, role)))
    }
}

async fn replace_permissions(conn: &mut PgConnection, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    if !permission_ids.is_empty() {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING")
            .bind(role_id)
            .bind(permission_ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn permissions_for(conn: &mut PgConnection, role_ids: &[RoleId]) -> Result<HashMap<RoleId, Vec<PermissionId>>> {
    if role_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(RoleId, PermissionId)> =
        sqlx::query_as("SELECT role_id, permission_id FROM role_permissions WHERE role_id = ANY($1) ORDER BY permission_id")
            .bind(role_ids)
            .fetch_all(&mut *conn)
            .await?;

    let mut result: HashMap<RoleId, Vec<PermissionId>> = HashMap::new();
    for (role_id, permission_id) in rows {
        result.entry(role_id).or_default().push(permission_id);
    }
    Ok(result)
}
