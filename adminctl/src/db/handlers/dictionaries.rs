//! Database repositories for dictionary types and items.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::{decode_status, repository::Repository},
        models::dictionaries::{
            DictItemCreateDBRequest, DictItemDBResponse, DictItemUpdateDBRequest, DictTypeCreateDBRequest, DictTypeDBResponse,
            DictTypeUpdateDBRequest,
        },
    },
    types::{DictItemId, DictTypeId, SortOrder, Status},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, query_builder::QueryBuilder};
use tracing::instrument;

/// Filter for listing dictionary types
#[derive(Debug, Clone, Default)]
pub struct DictTypeFilter {
    pub skip: i64,
    pub limit: i64,
    pub code: Option<String>,
    pub name: Option<String>,
    pub order: SortOrder,
}

impl DictTypeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(code) = &self.code {
            query.push(" AND code ILIKE ");
            query.push_bind(format!("%{code}%"));
        }
        if let Some(name) = &self.name {
            query.push(" AND name ILIKE ");
            query.push_bind(format!("%{name}%"));
        }
    }
}

pub struct DictTypes<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for DictTypes<'c> {
    type CreateRequest = DictTypeCreateDBRequest;
    type UpdateRequest = DictTypeUpdateDBRequest;
    type Response = DictTypeDBResponse;
    type Id = DictTypeId;
    type Filter = DictTypeFilter;

    #[instrument(skip(self, request), fields(code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let dict_type = sqlx::query_as::<_, DictTypeDBResponse>("INSERT INTO dict_types (code, name, remark) VALUES ($1, $2, $3) RETURNING *")
            .bind(&request.code)
            .bind(&request.name)
            .bind(&request.remark)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(dict_type)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let dict_type = sqlx::query_as::<_, DictTypeDBResponse>("SELECT * FROM dict_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(dict_type)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM dict_types WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(" ORDER BY id {} LIMIT ", filter.order.as_sql()));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let types = query.build_query_as::<DictTypeDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(types)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM dict_types WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    /// Items of the type are removed with it (ON DELETE CASCADE).
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dict_types WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let dict_type = sqlx::query_as::<_, DictTypeDBResponse>(
            r#"
            UPDATE dict_types SET
                code = COALESCE($2, code),
                name = COALESCE($3, name),
                remark = COALESCE($4, remark),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.code.as_deref())
        .bind(request.name.as_deref())
        .bind(request.remark.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(dict_type)
    }
}

impl<'c> DictTypes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_code(&mut self, code: &str) -> Result<Option<DictTypeDBResponse>> {
        let dict_type = sqlx::query_as::<_, DictTypeDBResponse>("SELECT * FROM dict_types WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(dict_type)
    }
}

/// Filter for listing dictionary items
#[derive(Debug, Clone, Default)]
pub struct DictItemFilter {
    pub skip: i64,
    pub limit: i64,
    pub type_id: Option<DictTypeId>,
    /// Resolved through `dict_types.code`
    pub type_code: Option<String>,
    /// Substring of the label
    pub label: Option<String>,
    pub status: Option<Status>,
    pub order: SortOrder,
}

impl DictItemFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(type_id) = self.type_id {
            query.push(" AND type_id = ");
            query.push_bind(type_id);
        }
        if let Some(type_code) = &self.type_code {
            query.push(" AND type_id IN (SELECT id FROM dict_types WHERE code = ");
            query.push_bind(type_code.clone());
            query.push(")");
        }
        if let Some(label) = &self.label {
            query.push(" AND label ILIKE ");
            query.push_bind(format!("%{label}%"));
        }
        if let Some(status) = self.status {
            query.push(" AND status = ");
            query.push_bind(i16::from(status));
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DictItem {
    pub id: DictItemId,
    pub type_id: DictTypeId,
    pub label: String,
    pub value: String,
    pub sort: i32,
    pub status: i16,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DictItem> for DictItemDBResponse {
    type Error = DbError;

    fn try_from(item: DictItem) -> Result<Self> {
        Ok(Self {
            id: item.id,
            type_id: item.type_id,
            label: item.label,
            value: item.value,
            sort: item.sort,
            status: decode_status(item.status)?,
            remark: item.remark,
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }
}

pub struct DictItems<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for DictItems<'c> {
    type CreateRequest = DictItemCreateDBRequest;
    type UpdateRequest = DictItemUpdateDBRequest;
    type Response = DictItemDBResponse;
    type Id = DictItemId;
    type Filter = DictItemFilter;

    #[instrument(skip(self, request), fields(type_id = request.type_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, DictItem>(
            r#"
            INSERT INTO dict_items (type_id, label, value, sort, status, remark)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(request.type_id)
        .bind(&request.label)
        .bind(&request.value)
        .bind(request.sort)
        .bind(i16::from(request.status))
        .bind(&request.remark)
        .fetch_one(&mut *self.db)
        .await?;

        item.try_into()
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let item = sqlx::query_as::<_, DictItem>("SELECT * FROM dict_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        item.map(DictItemDBResponse::try_from).transpose()
    }

    /// Items come back in display order: `sort` ascending, then id in the requested direction.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM dict_items WHERE 1=1");
        filter.push_conditions(&mut query);
        query.push(format!(" ORDER BY sort ASC, id {} LIMIT ", filter.order.as_sql()));
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let items = query.build_query_as::<DictItem>().fetch_all(&mut *self.db).await?;
        items.into_iter().map(DictItemDBResponse::try_from).collect()
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM dict_items WHERE 1=1");
        filter.push_conditions(&mut query);

        let count: (i64,) = query.build_query_as().fetch_one(&mut *self.db).await?;
        Ok(count.0)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dict_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, DictItem>(
            r#"
            UPDATE dict_items SET
                label = COALESCE($2, label),
                value = COALESCE($3, value),
                sort = COALESCE($4, sort),
                status = COALESCE($5, status),
                remark = COALESCE($6, remark),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.label.as_deref())
        .bind(request.value.as_deref())
        .bind(request.sort)
        .bind(request.status.map(i16::from))
        .bind(request.remark.as_deref())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        item.try_into()
    }
}

impl<'c> DictItems<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Enabled items of the type with this code, in display order. Unknown codes yield nothing.
    #[instrument(skip(self), err)]
    pub async fn enabled_by_code(&mut self, code: &str) -> Result<Vec<DictItemDBResponse>> {
        let items = sqlx::query_as::<_, DictItem>(
            r#"
            SELECT i.*
            FROM dict_items i
            JOIN dict_types t ON t.id = i.type_id
            WHERE t.code = $1 AND i.status = 1
            ORDER BY i.sort ASC, i.id ASC
            "#,
        )
        .bind(code)
        .fetch_all(&mut *self.db)
        .await?;

        items.into_iter().map(DictItemDBResponse::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_items_by_code_are_enabled_and_sorted(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let dict_type = DictTypes::new(&mut conn)
            .create(&DictTypeCreateDBRequest {
                code: "gender".to_string(),
                name: "Gender".to_string(),
                remark: String::new(),
            })
            .await
            .unwrap();

        let mut items = DictItems::new(&mut conn);
        for (label, sort, status) in [("b", 2, Status::Enabled), ("a", 1, Status::Enabled), ("hidden", 0, Status::Disabled)] {
            items
                .create(&DictItemCreateDBRequest {
                    type_id: dict_type.id,
                    label: label.to_string(),
                    value: label.to_string(),
                    sort,
                    status,
                    remark: String::new(),
                })
                .await
                .unwrap();
        }

        let labels: Vec<String> = items.enabled_by_code("gender").await.unwrap().into_iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(items.enabled_by_code("missing").await.unwrap().is_empty());

        let filter = DictItemFilter {
            type_code: Some("gender".to_string()),
            ..DictItemFilter::new(0, 10)
        };
        assert_eq!(items.count(&filter).await.unwrap(), 3);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres database (DATABASE_URL)"]
    async fn test_deleting_type_deletes_items(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let dict_type = DictTypes::new(&mut conn)
            .create(&DictTypeCreateDBRequest {
                code: "color".to_string(),
                name: "Color".to_string(),
                remark: String::new(),
            })
            .await
            .unwrap();
        let item = DictItems::new(&mut conn)
            .create(&DictItemCreateDBRequest {
                type_id: dict_type.id,
                label: "red".to_string(),
                value: "#f00".to_string(),
                sort: 0,
                status: Status::Enabled,
                remark: String::new(),
            })
            .await
            .unwrap();

        assert!(DictTypes::new(&mut conn).delete(dict_type.id).await.unwrap());
        assert!(DictItems::new(&mut conn).get_by_id(item.id).await.unwrap().is_none());
    }
}
