//! Shared pagination types for API query parameters.
//!
//! All admin list endpoints use page-based pagination with `page` and `page_size` parameters
//! and an optional `order_by`.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::{db::handlers::operation_logs::OperationLogOrder, errors::Error, types::SortOrder};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Standard pagination parameters for admin API list endpoints.
///
/// - `page`: 1-based page number (default: 1)
/// - `page_size`: items per page (default: 10, clamped to 1..=100)
/// - `order_by`: `id`, `id_asc` or `id_desc` (default: `id_desc`)
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page_size: Option<i64>,

    pub order_by: Option<String>,
}

impl Pagination {
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[inline]
    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip for the requested page.
    #[inline]
    pub fn skip(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }

    /// Sort direction over `id`. `id` alone means ascending.
    pub fn order(&self) -> Result<SortOrder, Error> {
        match self.order_by.as_deref() {
            None | Some("") | Some("id_desc") => Ok(SortOrder::Desc),
            Some("id") | Some("id_asc") => Ok(SortOrder::Asc),
            Some(other) => Err(invalid_order(other)),
        }
    }

    /// Operation logs can also be ordered by creation time.
    pub fn operation_log_order(&self) -> Result<(OperationLogOrder, SortOrder), Error> {
        match self.order_by.as_deref() {
            Some("created_at") | Some("created_at_asc") => Ok((OperationLogOrder::CreatedAt, SortOrder::Asc)),
            Some("created_at_desc") => Ok((OperationLogOrder::CreatedAt, SortOrder::Desc)),
            _ => Ok((OperationLogOrder::Id, self.order()?)),
        }
    }
}

fn invalid_order(value: &str) -> Error {
    Error::BadRequest {
        message: format!("Invalid order_by '{value}'"),
    }
}

/// Paginated list wrapper returned in the `data` field of list responses.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    /// The items for the current page
    pub list: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(list: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            list,
            total,
            page: pagination.page(),
            page_size: pagination.page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Pagination {
        serde_urlencoded::from_str(query).unwrap()
    }

    #[test]
    fn test_defaults() {
        let p = parse("");
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.skip(), 0);
        assert_eq!(p.order().unwrap(), SortOrder::Desc);
    }

    #[test]
    fn test_clamping() {
        let p = parse("page=0&page_size=1000");
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);

        let p = parse("page=3&page_size=20");
        assert_eq!(p.skip(), 40);

        assert_eq!(parse("page_size=-5").page_size(), 1);
    }

    #[test]
    fn test_order_by() {
        assert_eq!(parse("order_by=id").order().unwrap(), SortOrder::Asc);
        assert_eq!(parse("order_by=id_asc").order().unwrap(), SortOrder::Asc);
        assert_eq!(parse("order_by=id_desc").order().unwrap(), SortOrder::Desc);
        assert!(matches!(parse("order_by=name").order(), Err(Error::BadRequest { .. })));

        assert_eq!(
            parse("order_by=created_at_desc").operation_log_order().unwrap(),
            (OperationLogOrder::CreatedAt, SortOrder::Desc)
        );
        assert_eq!(parse("").operation_log_order().unwrap(), (OperationLogOrder::Id, SortOrder::Desc));
        assert!(parse("order_by=created_at").order().is_err());
    }

    #[test]
    fn test_non_numeric_page_is_rejected() {
        assert!(serde_urlencoded::from_str::<Pagination>("page=abc").is_err());
    }
}
