use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Core identifier types
pub type UserId = Uuid;
pub type CategoryId = Uuid;
pub type SubCategoryId = Uuid;
pub type ProductId = Uuid;
pub type LeadId = Uuid;

/// Dashboard roles. Stored as the Postgres enum `user_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    Admin,
    Manager,
    Sales,
    ProductManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Sales => "Sales",
            Role::ProductManager => "ProductManager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "Sales" => Ok(Role::Sales),
            "ProductManager" => Ok(Role::ProductManager),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Sales pipeline state of a lead. Stored as the Postgres enum `lead_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status")]
pub enum LeadStatus {
    #[default]
    #[serde(rename = "onprocess")]
    #[sqlx(rename = "onprocess")]
    OnProcess,
    #[serde(rename = "Converted")]
    #[sqlx(rename = "Converted")]
    Converted,
    #[serde(rename = "notinterested")]
    #[sqlx(rename = "notinterested")]
    NotInterested,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::OnProcess => "onprocess",
            LeadStatus::Converted => "Converted",
            LeadStatus::NotInterested => "notinterested",
        }
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "onprocess" => Ok(LeadStatus::OnProcess),
            "Converted" | "converted" => Ok(LeadStatus::Converted),
            "notinterested" => Ok(LeadStatus::NotInterested),
            other => Err(format!("Unknown lead type: {}", other)),
        }
    }
}

/// Upper bound on a single page, matching the largest default used by the export endpoints.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Highest page number accepted from a query string.
pub const MAX_PAGE: i64 = 1_000_000;

/// Normalised page/limit pair taken from query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Build a request from raw query values, falling back to `default_limit`.
    ///
    /// Pages start at 1. Non-positive values fall back to the defaults, the
    /// page is capped at [`MAX_PAGE`] and the limit at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(MAX_PAGE_SIZE);

        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(self.limit.max(0))
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta::new(total, self.page, self.limit)
    }
}

/// Pagination metadata returned alongside list payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };

        Self {
            total,
            total_pages,
            current_page: page,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_request_defaults() {
        let req = PageRequest::new(None, None, 50);
        assert_eq!(req, PageRequest { page: 1, limit: 50 });
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_page_request_rejects_non_positive_values() {
        let req = PageRequest::new(Some(0), Some(-5), 10);
        assert_eq!(req, PageRequest { page: 1, limit: 10 });
    }

    #[test]
    fn test_page_request_caps_limit() {
        let req = PageRequest::new(Some(3), Some(50_000), 10);
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn test_huge_page_does_not_overflow_offset() {
        let req = PageRequest::new(Some(i64::MAX), Some(10), 10);
        assert_eq!(req.page, MAX_PAGE);
        assert_eq!(req.offset(), (MAX_PAGE - 1) * 10);

        let raw = PageRequest { page: i64::MAX, limit: i64::MAX };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn test_page_meta() {
        let meta = PageMeta::new(21, 2, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let last = PageMeta::new(20, 2, 10);
        assert_eq!(last.total_pages, 2);
        assert!(!last.has_next_page);

        let empty = PageMeta::new(0, 1, 10);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [Role::Admin, Role::Manager, Role::Sales, Role::ProductManager] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_lead_status_serialization() {
        assert_eq!(
            serde_json::to_string(&LeadStatus::NotInterested).unwrap(),
            "\"notinterested\""
        );
        assert_eq!(LeadStatus::default(), LeadStatus::OnProcess);
        assert_eq!("Converted".parse::<LeadStatus>(), Ok(LeadStatus::Converted));
    }
}
