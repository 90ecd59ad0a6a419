//! Data models shared across database access and API handlers.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// `?limit=&offset=` on list endpoints. Out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct PaginationQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl PaginationQuery {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of results plus the total matching count.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Echoes the effective (clamped) window of `page`.
    pub fn for_page<S>(items: Vec<S>, total: i64, page: &PaginationQuery) -> Self
    where
        S: Into<T>,
    {
        Self {
            data: items.into_iter().map(Into::into).collect(),
            total,
            limit: page.limit(),
            offset: page.offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped() {
        let page = PaginationQuery {
            limit: 10_000,
            offset: -3,
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
        assert_eq!(PaginationQuery { limit: 0, offset: 0 }.limit(), 1);
    }

    #[test]
    fn page_echoes_the_effective_window() {
        let page = PaginationQuery {
            limit: 0,
            offset: 4,
        };
        let response: PaginatedResponse<String> = PaginatedResponse::for_page(vec!["a"], 9, &page);
        assert_eq!(response.data, vec!["a".to_string()]);
        assert_eq!((response.total, response.limit, response.offset), (9, 1, 4));
    }
}

pub mod account;
pub mod book;
pub mod opinion;
pub mod password_reset;
pub mod session_record;
pub mod sign_in_method;
