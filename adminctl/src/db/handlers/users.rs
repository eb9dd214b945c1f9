//! Database repository for users.

use std::collections::HashMap;

use crate::{
    auth::stores::AuthUser,
    db::{
        errors::{DbError, Result},
        handlers::{decode_status, repository::Repository},
        models::users::{UserCreateDBRequest, UserDBResponse, UserRoleRef, UserUpdateDBRequest},
    },
    types::{RoleId, SortOrder, Status, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, query_builder::QueryBuilder};
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    /// Substring of the username
    pub username: Option<String>,
    /// Substring of the nickname
    pub nickname: Option<String>,
    pub kind: Option<i16>,
    pub status: Option<Status>,
    /// Only users holding this role
    pub role_id: Option<RoleId>,
    pub order: SortOrder,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(username) = &self.username {
            query.push(" AND username ILIKE ");
            query.push_bind(format!("%{username}%"));
        }
        if let Some(nickname) = &self.nickname {
            query.push(" AND nickname ILIKE ");
            query.push_bind(format!("%{nickname}%"));
        }
        if let Some(kind) = self.kind {
            query.push(" AND kind = ");
            query.push_bind(kind);
        }
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(i16::from(status));
        }
        if let Some(role_id) = self.role_id {
            query.push(" AND id IN (SELECT user_id FROM user_roles WHERE role_id = ");
            query.push_bind(role_id);
            query.push(")");
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub avatar: String,
    pub kind: i16,
    pub status: i16,
    pub token_version: i64,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UserRoleRow {
    user_id: UserId,
    role_id: RoleId,
    name: String,
}

impl User {
    fn into_response(self, roles: Vec<UserRoleRef>) -> Result<UserDBResponse> {
        Ok(UserDBResponse {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            nickname: self.nickname,
            avatar: self.avatar,
            kind: self.kind,
            status: decode_status(self.status)?,
            token_version: self.token_version,
            remark: self.remark,
            roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, nickname, avatar, kind, status, remark)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.nickname)
        .bind(&request.avatar)
        .bind(request.kind)
        .bind(i16::from(request.status))
        .bind(&request.remark)
        .fetch_one(&mut *tx)
        .await?;

        replace_roles(&mut *tx, user.id, &request.role_ids).await?;
        let roles = roles_for_users(&mut *tx, &[user.id]).await?.remove(&user.id).unwrap_or_default();

        tx.commit().await?;

        user.into_response(roles)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = roles_for_users(&mut *self.db, &[user.id]).await?.remove(&user.id).unwrap_or_default();
                Ok(Some(user.into_response(roles)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM users WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(" ORDER BY id {} LIMIT ", filter.order.as_sql()));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let users = query.build_query_as::<User>().fetch_all(&mut *self.db).await?;

        let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
        let mut roles = roles_for_users(&mut *self.db, &ids).await?;

        users
            .into_iter()
            .map(|user| {
                let user_roles = roles.remove(&user.id).unwrap_or_default();
                user.into_response(user_roles)
            })
            .collect()
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(revokes_sessions = request.revokes_sessions()), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // This update touches multiple tables, so regardless of the connection passed in, we still need a transaction.
        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                nickname = COALESCE($2, nickname),
                avatar = COALESCE($3, avatar),
                kind = COALESCE($4, kind),
                remark = COALESCE($5, remark),
                status = COALESCE($6, status),
                password_hash = COALESCE($7, password_hash),
                token_version = token_version + CASE WHEN $8 THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.nickname.as_deref())
        .bind(request.avatar.as_deref())
        .bind(request.kind)
        .bind(request.remark.as_deref())
        .bind(request.status.map(i16::from))
        .bind(request.password_hash.as_deref())
        .bind(request.revokes_sessions())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if let Some(role_ids) = &request.role_ids {
            replace_roles(&mut *tx, id, role_ids).await?;
        }
        let roles = roles_for_users(&mut *tx, &[id]).await?.remove(&id).unwrap_or_default();

        tx.commit().await?;

        user.into_response(roles)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        match user {
            Some(user) => {
                let roles = roles_for_users(&mut *self.db, &[user.id]).await?.remove(&user.id).unwrap_or_default();
                Ok(Some(user.into_response(roles)?))
            }
            None => Ok(None),
        }
    }

    /// The fields the access decision reads on every request.
    #[instrument(skip(self), err)]
    pub async fn find_for_auth(&mut self, id: UserId) -> Result<Option<AuthUser>> {
        let row: Option<(UserId, i16, i64)> = sqlx::query_as("SELECT id, status, token_version FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        row.map(|(id, status, token_version)| {
            Ok(AuthUser {
                id,
                status: decode_status(status)?,
                token_version,
            })
        })
        .transpose()
    }

    /// Invalidate every session issued to the user so far.
    #[instrument(skip(self), err)]
    pub async fn increment_token_version(&mut self, id: UserId) -> Result<()> {
        let result = sqlx::query("UPDATE users SET token_version = token_version + 1, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

async fn replace_roles(conn: &mut PgConnection, user_id: UserId, role_ids: &[RoleId]) -> Result<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if !role_ids.is_empty() {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role_ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn roles_for_users(conn: &mut PgConnection, user_ids: &[UserId]) -> Result<HashMap<UserId, Vec<UserRoleRef>>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, UserRoleRow>(
        r#"
        SELECT ur.user_id, ur.role_id, r.name
        FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = ANY($1)
        ORDER BY r.id
        "#,
    )
    .bind(user_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut result: HashMap<UserId, Vec<UserRoleRef>> = HashMap::new();
    for row in rows {
        result.entry(row.user_id).or_default().push(UserRoleRef {
            id: row.role_id,
            name: row.name,
        });
    }
    Ok(result)
}
