use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::category::{NamedRef, UNCATEGORIZED};

/// Text stored in export rows for missing values
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub short_desc: Option<String>,
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    pub image: String,
    pub slug: String,
    pub seo_title: Option<String>,
    pub seo_desc: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub id: Uuid,
    pub url: String,
}

/// Gallery row with its owner, used when loading relations in bulk
#[derive(Debug, Clone, FromRow)]
pub struct ProductImageRow {
    pub id: Uuid,
    pub url: String,
    pub product_id: Uuid,
}

/// Category or subcategory link with its owner, used when loading relations in bulk
#[derive(Debug, Clone, FromRow)]
pub struct ProductLinkRow {
    pub product_id: Uuid,
    pub id: Uuid,
    pub name: String,
}

/// Product with its relations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub categories: Vec<NamedRef>,
    pub sub_categories: Vec<NamedRef>,
    pub images: Vec<ImageRef>,
}

impl ProductDetail {
    /// Every stored object referenced by this product
    pub fn image_urls(&self) -> Vec<String> {
        std::iter::once(self.product.image.clone())
            .chain(self.images.iter().map(|i| i.url.clone()))
            .filter(|u| !u.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductDetail>,
    pub total_products: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Flattened product used by the export endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductExportRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_desc: String,
    pub price: String,
    pub sale_price: String,
    pub seo_title: String,
    pub seo_desc: String,
    pub image: String,
    pub images: Vec<String>,
    pub categories: String,
    pub sub_categories: String,
    pub created_at: DateTime<Utc>,
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn join_names(refs: &[NamedRef]) -> String {
    if refs.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        refs.iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<ProductDetail> for ProductExportRow {
    fn from(detail: ProductDetail) -> Self {
        let categories = join_names(&detail.categories);
        let sub_categories = join_names(&detail.sub_categories);
        let images = detail.images.into_iter().map(|i| i.url).collect();
        let p = detail.product;

        Self {
            id: p.id,
            title: p.title,
            slug: p.slug,
            description: or_na(p.description),
            short_desc: or_na(p.short_desc),
            price: or_na(p.price.map(|v| v.to_string())),
            sale_price: or_na(p.sale_price.map(|v| v.to_string())),
            seo_title: or_na(p.seo_title),
            seo_desc: or_na(p.seo_desc),
            image: p.image,
            images,
            categories,
            sub_categories,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductExportPage {
    pub products: Vec<ProductExportRow>,
    pub total_products: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Row returned by the storefront search box
#[derive(Debug, Clone, FromRow)]
pub struct ProductSearchRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub image: String,
    pub short_desc: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchHit {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub image: String,
    pub short_desc: Option<String>,
    pub category: String,
}

impl From<ProductSearchRow> for ProductSearchHit {
    fn from(row: ProductSearchRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            image: row.image,
            short_desc: row.short_desc,
            category: row.category.unwrap_or_else(|| UNCATEGORIZED.to_string()),
        }
    }
}

/// Validated product fields ready to be written
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub title: String,
    pub description: Option<String>,
    pub short_desc: Option<String>,
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    pub seo_title: Option<String>,
    pub seo_desc: Option<String>,
    pub category_ids: Vec<Uuid>,
    pub sub_category_ids: Vec<Uuid>,
}

/// Partial update; `None` leaves the stored value alone
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_desc: Option<String>,
    pub price: Option<f64>,
    pub sale_price: Option<f64>,
    pub seo_title: Option<String>,
    pub seo_desc: Option<String>,
    pub category_ids: Option<Vec<Uuid>>,
    pub sub_category_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    pub image_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> ProductDetail {
        let now = Utc::now();
        ProductDetail {
            product: Product {
                id: Uuid::nil(),
                title: "Ball Valve".into(),
                description: None,
                short_desc: Some("  ".into()),
                price: Some(12.5),
                sale_price: None,
                image: "https://cdn/thumb.jpg".into(),
                slug: "ball-valve".into(),
                seo_title: Some("Ball Valve".into()),
                seo_desc: None,
                created_at: now,
                updated_at: now,
            },
            categories: vec![
                NamedRef { id: Uuid::new_v4(), name: "valves".into() },
                NamedRef { id: Uuid::new_v4(), name: "plumbing".into() },
            ],
            sub_categories: vec![],
            images: vec![ImageRef { id: Uuid::new_v4(), url: "https://cdn/g1.jpg".into() }],
        }
    }

    #[test]
    fn test_export_row_fills_missing_values() {
        let row = ProductExportRow::from(detail());
        assert_eq!(row.description, NOT_AVAILABLE);
        assert_eq!(row.short_desc, NOT_AVAILABLE);
        assert_eq!(row.price, "12.5");
        assert_eq!(row.sale_price, NOT_AVAILABLE);
        assert_eq!(row.categories, "valves, plumbing");
        assert_eq!(row.sub_categories, NOT_AVAILABLE);
        assert_eq!(row.images, vec!["https://cdn/g1.jpg".to_string()]);
    }

    #[test]
    fn test_image_urls_include_thumbnail_and_gallery() {
        assert_eq!(
            detail().image_urls(),
            vec!["https://cdn/thumb.jpg".to_string(), "https://cdn/g1.jpg".to_string()]
        );
    }

    #[test]
    fn test_search_hit_defaults_category() {
        let hit = ProductSearchHit::from(ProductSearchRow {
            id: Uuid::nil(),
            title: "Pump".into(),
            slug: "pump".into(),
            image: "x".into(),
            short_desc: None,
            category: None,
        });
        assert_eq!(hit.category, UNCATEGORIZED);
    }
}
