//! Dictionary types and their items.
//!
//! A type is a named, coded list (e.g. `user_kind`); items are its label/value entries. Front ends
//! read enabled items through [`items_by_code`].

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    AppState,
    api::models::{
        dictionaries::{
            DictItemCreate, DictItemResponse, DictItemUpdate, DictTypeCreate, DictTypeResponse, DictTypeUpdate, ItemsByCodeQuery,
            ListDictItemsQuery, ListDictTypesQuery,
        },
        pagination::PaginatedResponse,
        response::ApiResponse,
    },
    db::{
        handlers::{
            DictItems, DictTypes, Repository,
            dictionaries::{DictItemFilter, DictTypeFilter},
        },
        models::dictionaries::{DictItemCreateDBRequest, DictItemUpdateDBRequest, DictTypeCreateDBRequest, DictTypeUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{DictItemId, DictTypeId, Status},
};

fn not_found(resource: &str, id: i64) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(value.to_string())
}

#[tracing::instrument(skip_all)]
pub async fn list_dict_types(
    State(state): State<AppState>,
    Query(query): Query<ListDictTypesQuery>,
) -> Result<ApiResponse<PaginatedResponse<DictTypeResponse>>> {
    let filter = DictTypeFilter {
        code: query.code.filter(|s| !s.is_empty()),
        name: query.name.filter(|s| !s.is_empty()),
        order: query.pagination.order()?,
        ..DictTypeFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DictTypes::new(&mut conn);
    let types = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        types.into_iter().map(DictTypeResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

#[tracing::instrument(skip_all)]
pub async fn create_dict_type(State(state): State<AppState>, Json(request): Json<DictTypeCreate>) -> Result<ApiResponse<DictTypeResponse>> {
    let create = DictTypeCreateDBRequest {
        code: required("Code", &request.code)?,
        name: required("Name", &request.name)?,
        remark: request.remark,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let dict_type = DictTypes::new(&mut conn).create(&create).await?;

    Ok(ApiResponse::with_message(DictTypeResponse::from(dict_type), "Dictionary type created"))
}

#[tracing::instrument(skip_all, fields(type_id = id))]
pub async fn update_dict_type(
    State(state): State<AppState>,
    Path(id): Path<DictTypeId>,
    Json(request): Json<DictTypeUpdate>,
) -> Result<ApiResponse<DictTypeResponse>> {
    let update = DictTypeUpdateDBRequest {
        code: request.code.as_deref().map(|code| required("Code", code)).transpose()?,
        name: request.name.as_deref().map(|name| required("Name", name)).transpose()?,
        remark: request.remark,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let dict_type = DictTypes::new(&mut conn).update(id, &update).await?;

    Ok(ApiResponse::with_message(DictTypeResponse::from(dict_type), "Dictionary type updated"))
}

/// Delete a type together with all of its items
#[tracing::instrument(skip_all, fields(type_id = id))]
pub async fn delete_dict_type(State(state): State<AppState>, Path(id): Path<DictTypeId>) -> Result<ApiResponse<()>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !DictTypes::new(&mut conn).delete(id).await? {
        return Err(not_found("Dictionary type", id));
    }

    Ok(ApiResponse::message("Dictionary type deleted"))
}

#[tracing::instrument(skip_all)]
pub async fn list_dict_items(
    State(state): State<AppState>,
    Query(query): Query<ListDictItemsQuery>,
) -> Result<ApiResponse<PaginatedResponse<DictItemResponse>>> {
    let status = query
        .status
        .map(Status::try_from)
        .transpose()
        .map_err(|message| Error::BadRequest { message })?;

    let filter = DictItemFilter {
        type_id: query.type_id,
        type_code: query.type_code.filter(|s| !s.is_empty()),
        label: query.label.filter(|s| !s.is_empty()),
        status,
        order: query.pagination.order()?,
        ..DictItemFilter::new(query.pagination.skip(), query.pagination.page_size())
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = DictItems::new(&mut conn);
    let items = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items.into_iter().map(DictItemResponse::from).collect(),
        total,
        &query.pagination,
    )))
}

/// Enabled items of a type, in display order
#[tracing::instrument(skip_all, fields(code = %query.code))]
pub async fn items_by_code(State(state): State<AppState>, Query(query): Query<ItemsByCodeQuery>) -> Result<ApiResponse<Vec<DictItemResponse>>> {
    let code = required("Code", &query.code)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let items = DictItems::new(&mut conn).enabled_by_code(&code).await?;

    Ok(ApiResponse::ok(items.into_iter().map(DictItemResponse::from).collect()))
}

#[tracing::instrument(skip_all, fields(type_id = request.type_id))]
pub async fn create_dict_item(State(state): State<AppState>, Json(request): Json<DictItemCreate>) -> Result<ApiResponse<DictItemResponse>> {
    let create = DictItemCreateDBRequest {
        type_id: request.type_id,
        label: required("Label", &request.label)?,
        value: required("Value", &request.value)?,
        sort: request.sort,
        status: request.status.unwrap_or(Status::Enabled),
        remark: request.remark,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    if DictTypes::new(&mut tx).get_by_id(request.type_id).await?.is_none() {
        return Err(not_found("Dictionary type", request.type_id));
    }
    let item = DictItems::new(&mut tx).create(&create).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(ApiResponse::with_message(DictItemResponse::from(item), "Dictionary item created"))
}

#[tracing::instrument(skip_all, fields(item_id = id))]
pub async fn update_dict_item(
    State(state): State<AppState>,
    Path(id): Path<DictItemId>,
    Json(request): Json<DictItemUpdate>,
) -> Result<ApiResponse<DictItemResponse>> {
    let update = DictItemUpdateDBRequest {
        label: request.label.as_deref().map(|label| required("Label", label)).transpose()?,
        value: request.value.as_deref().map(|value| required("Value", value)).transpose()?,
        sort: request.sort,
        status: request.status,
        remark: request.remark,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let item = DictItems::new(&mut conn).update(id, &update).await?;

    Ok(ApiResponse::with_message(DictItemResponse::from(item), "Dictionary item updated"))
}

#[tracing::instrument(skip_all, fields(item_id = id))]
pub async fn delete_dict_item(State(state): State<AppState>, Path(id): Path<DictItemId>) -> Result<ApiResponse<()>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !DictItems::new(&mut conn).delete(id).await? {
        return Err(not_found("Dictionary item", id));
    }

    Ok(ApiResponse::message("Dictionary item deleted"))
}
