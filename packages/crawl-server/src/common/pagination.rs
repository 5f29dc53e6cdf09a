//! Offset pagination for page listings.
//!
//! Pages are 1-indexed. A missing or non-positive page becomes 1, a missing or
//! non-positive limit becomes [`DEFAULT_PAGE_LIMIT`].

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Raw pagination input as received from a caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PaginationArgs {
    pub page: Option<i64>,
    pub page_limit: Option<i64>,
}

/// Pagination after defaults have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPagination {
    pub page: i64,
    pub limit: i64,
}

impl PaginationArgs {
    pub fn new(page: i64, page_limit: i64) -> Self {
        Self {
            page: Some(page),
            page_limit: Some(page_limit),
        }
    }

    pub fn validate(&self) -> ValidatedPagination {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self
            .page_limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        ValidatedPagination { page, limit }
    }
}

impl ValidatedPagination {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}
