pub mod banners;
pub mod categories;
pub mod comments;
pub mod health;
pub mod leads;
pub mod products;
pub mod subcategories;
pub mod users;

use serde::Deserialize;
use shared::PageRequest;

/// `?page&limit` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn request(&self, default_limit: i64) -> PageRequest {
        PageRequest::new(self.page, self.limit, default_limit)
    }
}

/// `?q=` search parameter
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// Trimmed query text, 400 when missing or blank
    pub fn required(&self) -> crate::models::ApiResult<&str> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| crate::models::ApiError::bad_request("Search query is required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.request(50), PageRequest { page: 1, limit: 50 });

        let query = PageQuery { page: Some(3), limit: Some(5) };
        assert_eq!(query.request(50).offset(), 10);
    }

    #[test]
    fn test_search_query_required() {
        let query = SearchQuery { q: Some("  valve ".into()) };
        assert_eq!(query.required().unwrap(), "valve");
        assert!(SearchQuery { q: Some("   ".into()) }.required().is_err());
        assert!(SearchQuery::default().required().is_err());
    }
}
