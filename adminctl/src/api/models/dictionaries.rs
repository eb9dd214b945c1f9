//! API request/response models for dictionary types and items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{
    api::models::pagination::Pagination,
    db::models::dictionaries::{DictItemDBResponse, DictTypeDBResponse},
    types::{DictItemId, DictTypeId, Status},
};

#[derive(Debug, Clone, Serialize)]
pub struct DictTypeResponse {
    pub id: DictTypeId,
    pub code: String,
    pub name: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DictTypeDBResponse> for DictTypeResponse {
    fn from(db: DictTypeDBResponse) -> Self {
        Self {
            id: db.id,
            code: db.code,
            name: db.name,
            remark: db.remark,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictTypeCreate {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DictTypeUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDictTypesQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DictItemResponse {
    pub id: DictItemId,
    pub type_id: DictTypeId,
    pub label: String,
    pub value: String,
    pub sort: i32,
    pub status: Status,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DictItemDBResponse> for DictItemResponse {
    fn from(db: DictItemDBResponse) -> Self {
        Self {
            id: db.id,
            type_id: db.type_id,
            label: db.label,
            value: db.value,
            sort: db.sort,
            status: db.status,
            remark: db.remark,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DictItemCreate {
    pub type_id: DictTypeId,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub sort: i32,
    pub status: Option<Status>,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DictItemUpdate {
    pub label: Option<String>,
    pub value: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<Status>,
    pub remark: Option<String>,
}

/// Items are listed for one type, named either by id or by code.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ListDictItemsQuery {
    #[serde(flatten)]
    pub pagination: Pagination,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub type_id: Option<DictTypeId>,
    pub type_code: Option<String>,
    pub label: Option<String>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsByCodeQuery {
    pub code: String,
}
