//! Database repository for route permissions.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionUpdateDBRequest},
    },
    types::{PermissionId, RoleId, SortOrder},
};
use sqlx::{Connection, PgConnection, Postgres, query_builder::QueryBuilder};
use tracing::instrument;

/// Filter for listing permissions
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub skip: i64,
    pub limit: i64,
    pub path: Option<String>,
    pub name: Option<String>,
    pub group_name: Option<String>,
    /// Exact, case-insensitive
    pub method: Option<String>,
    pub order: SortOrder,
}

impl PermissionFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(path) = &self.path {
            query.push(" AND path ILIKE ");
            query.push_bind(format!("%{path}%"));
        }
        if let Some(name) = &self.name {
            query.push(" AND name ILIKE ");
            query.push_bind(format!("%{name}%"));
        }
        if let Some(group_name) = &self.group_name {
            query.push(" AND group_name ILIKE ");
            query.push_bind(format!("%{group_name}%"));
        }
        if let Some(method) = &self.method {
            query.push(" AND method = ");
            query.push_bind(method.to_uppercase());
        }
    }
}

/// What reconciling one declared route did to the permissions table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSync {
    Inserted,
    Updated,
    Unchanged,
}

pub struct Permissions<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Permissions<'c> {
    type CreateRequest = PermissionCreateDBRequest;
    type UpdateRequest = PermissionUpdateDBRequest;
    type Response = PermissionDBResponse;
    type Id = PermissionId;
    type Filter = PermissionFilter;

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            INSERT INTO permissions (path, method, name, group_name, description, auto_import)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.path)
        .bind(request.method.to_uppercase())
        .bind(&request.name)
        .bind(&request.group_name)
        .bind(&request.description)
        .bind(request.auto_import)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(permission)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>("SELECT * FROM permissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(permission)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM permissions WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(" ORDER BY id {} LIMIT ", filter.order.as_sql()));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let permissions = query.build_query_as::<PermissionDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(permissions)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM permissions WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            UPDATE permissions SET
                name = COALESCE($2, name),
                group_name = COALESCE($3, group_name),
                description = COALESCE($4, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.name.as_deref())
        .bind(request.group_name.as_deref())
        .bind(request.description.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(permission)
    }
}

impl<'c> Permissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Delete all of `ids` or none of them. Fails with [`DbError::NotFound`] if any id is unknown.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn delete_many(&mut self, ids: &[PermissionId]) -> Result<u64> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut tx = self.db.begin().await?;

        let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM permissions WHERE id = ANY($1)")
            .bind(&unique)
            .fetch_one(&mut *tx)
            .await?;
        if existing.0 != unique.len() as i64 {
            return Err(DbError::NotFound);
        }

        let result = sqlx::query("DELETE FROM permissions WHERE id = ANY($1)")
            .bind(&unique)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_route(&mut self, method: &str, path: &str) -> Result<Option<PermissionDBResponse>> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>("SELECT * FROM permissions WHERE method = $1 AND path = $2")
            .bind(method.to_uppercase())
            .bind(path)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(permission)
    }

    /// Union of the permissions granted to `role_ids`, one row per permission.
    #[instrument(skip(self, role_ids), fields(roles = role_ids.len()), err)]
    pub async fn for_roles(&mut self, role_ids: &[RoleId]) -> Result<Vec<PermissionDBResponse>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let permissions = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            SELECT DISTINCT p.*
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = ANY($1)
            ORDER BY p.id
            "#,
        )
        .bind(role_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(permissions)
    }

    /// Make the row for `(method, path)` carry the declared name and group, flagged as imported.
    #[instrument(skip(self, name, group_name), err)]
    pub async fn sync_route(&mut self, method: &str, path: &str, name: &str, group_name: &str) -> Result<RouteSync> {
        let Some(existing) = self.get_by_route(method, path).await? else {
            self.create(&PermissionCreateDBRequest {
                path: path.to_string(),
                method: method.to_string(),
                name: name.to_string(),
                group_name: group_name.to_string(),
                description: String::new(),
                auto_import: true,
            })
            .await?;
            return Ok(RouteSync::Inserted);
        };

        if existing.name == name && existing.group_name == group_name && existing.auto_import {
            return Ok(RouteSync::Unchanged);
        }

        sqlx::query("UPDATE permissions SET name = $2, group_name = $3, auto_import = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(existing.id)
            .bind(name)
            .bind(group_name)
            .execute(&mut *self.db)
            .await?;
        Ok(RouteSync::Updated)
    }
}
