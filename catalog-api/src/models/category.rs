use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::product::ProductDetail;

/// Name of the fallback category every orphaned product is moved to
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Image shown for subcategories without an upload
pub const PLACEHOLDER_IMAGE: &str = "/place.jpeg";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn is_uncategorized(&self) -> bool {
        self.name == UNCATEGORIZED
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategory {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `{id, name}` reference used inside product and subcategory payloads
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub products: i64,
    pub sub_categories: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategorySummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Category with its subcategories, as listed on the dashboard
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOverview {
    #[serde(flatten)]
    pub category: Category,
    pub sub_categories: Vec<SubCategorySummary>,
    #[serde(rename = "_count")]
    pub count: CategoryCounts,
}

/// Row shape of the category listing query
#[derive(Debug, Clone, FromRow)]
pub struct CategoryCountRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product_count: i64,
    pub sub_category_count: i64,
}

impl CategoryCountRow {
    pub fn into_overview(self, sub_categories: Vec<SubCategorySummary>) -> CategoryOverview {
        CategoryOverview {
            category: Category {
                id: self.id,
                name: self.name,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            sub_categories,
            count: CategoryCounts {
                products: self.product_count,
                sub_categories: self.sub_category_count,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    pub categories: Vec<CategoryOverview>,
    pub total_categories: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

/// Row shape of the subcategory listing query
#[derive(Debug, Clone, FromRow)]
pub struct SubCategoryListRow {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub category_id: Uuid,
    pub category_name: String,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductCount {
    pub products: i64,
}

/// Subcategory with its parent and product count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryListItem {
    #[serde(flatten)]
    pub sub_category: SubCategory,
    pub category: NamedRef,
    #[serde(rename = "_count")]
    pub count: ProductCount,
}

impl From<SubCategoryListRow> for SubCategoryListItem {
    fn from(row: SubCategoryListRow) -> Self {
        Self {
            sub_category: SubCategory {
                id: row.id,
                name: row.name,
                image: row.image,
                category_id: row.category_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            category: NamedRef {
                id: row.category_id,
                name: row.category_name,
            },
            count: ProductCount {
                products: row.product_count,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryPage {
    pub sub_categories: Vec<SubCategoryListItem>,
    pub total_sub_categories: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Subcategory detail with parent and linked products
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryDetail {
    #[serde(flatten)]
    pub sub_category: SubCategory,
    pub category: NamedRef,
    pub products: Vec<ProductRef>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductRef {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithSubcategories {
    #[serde(flatten)]
    pub category: Category,
    pub sub_categories: Vec<SubCategorySummary>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryRef {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
}

/// Public subcategory card; `image` falls back to the placeholder
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryCard {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub product_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SubCategoryCardRow {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub product_count: i64,
}

impl From<SubCategoryCardRow> for SubCategoryCard {
    fn from(row: SubCategoryCardRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row
                .image
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            product_count: row.product_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySubcategoryCards {
    pub category: NamedRef,
    pub subcategories: Vec<SubCategoryCard>,
}

/// Products of one subcategory with pagination figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubCategoryProducts {
    pub sub_category: Option<NamedRef>,
    pub category: Option<NamedRef>,
    pub products: Vec<ProductDetail>,
    pub total_products: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

impl SubCategoryProducts {
    /// Page returned when no subcategory matches
    pub fn empty(current_page: i64) -> Self {
        Self {
            sub_category: None,
            category: None,
            products: Vec::new(),
            total_products: 0,
            total_pages: 0,
            current_page,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryNameRequest {
    pub name: String,
}
