use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{PageQuery, SearchQuery};
use crate::middleware::AuthUser;
use crate::models::product::{
    DeleteImageRequest, ProductChanges, ProductDetail, ProductDraft, ProductExportPage,
    ProductPage, ProductSearchHit,
};
use crate::models::{ApiError, ApiResponse, ApiResult};
use crate::utils::multipart::MultipartForm;
use crate::utils::text::clean_search_query;
use crate::utils::validation::{parse_price, required_text};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_EXPORT_PAGE_SIZE: i64 = 1000;
const MIN_STOREFRONT_QUERY: usize = 2;

fn optional_text(form: &MultipartForm, key: &str) -> Option<String> {
    form.text(key).map(|v| v.trim().to_string())
}

fn draft_from_form(form: &MultipartForm) -> ApiResult<ProductDraft> {
    Ok(ProductDraft {
        title: required_text(form.text("title"), "title")?,
        description: form.non_empty("description"),
        short_desc: form.non_empty("shortDesc"),
        price: parse_price(form.text("price"), "price")?,
        sale_price: parse_price(form.text("salePrice"), "salePrice")?,
        seo_title: form.non_empty("seoTitle"),
        seo_desc: form.non_empty("seoDesc"),
        category_ids: form.uuid_list("categoryIds"),
        sub_category_ids: form.uuid_list("subCategoryIds"),
    })
}

/// Only fields present in the form are changed; an empty id list resets the links
fn changes_from_form(form: &MultipartForm) -> ApiResult<ProductChanges> {
    Ok(ProductChanges {
        title: form.non_empty("title"),
        description: optional_text(form, "description"),
        short_desc: optional_text(form, "shortDesc"),
        price: parse_price(form.text("price"), "price")?,
        sale_price: parse_price(form.text("salePrice"), "salePrice")?,
        seo_title: form.non_empty("seoTitle"),
        seo_desc: form.non_empty("seoDesc"),
        category_ids: form
            .has_field("categoryIds")
            .then(|| form.uuid_list("categoryIds")),
        sub_category_ids: form
            .has_field("subCategoryIds")
            .then(|| form.uuid_list("subCategoryIds")),
    })
}

pub async fn create_product(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    multipart: Multipart,
) -> ApiResult<ApiResponse<ProductDetail>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let draft = draft_from_form(&form)?;
    let thumbnail = form
        .single_file("image")?
        .ok_or_else(|| ApiError::bad_request("Product image is required"))?;
    let gallery = form.files_at_most("images", state.config.storage.max_gallery_images)?;

    let product = state.products.create(draft, thumbnail, gallery).await?;

    Ok(ApiResponse::created(product, "Product created successfully"))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<ProductDetail>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let changes = changes_from_form(&form)?;
    let thumbnail = form.single_file("image")?;
    let gallery = form.files_at_most("images", state.config.storage.max_gallery_images)?;

    let product = state
        .products
        .update(&slug, changes, thumbnail, gallery)
        .await?;

    Ok(ApiResponse::ok(product, "Product updated successfully"))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    state.products.delete(&slug).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}

pub async fn delete_product_image(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<DeleteImageRequest>,
) -> ApiResult<ApiResponse<()>> {
    let image_id = req
        .image_id
        .ok_or_else(|| ApiError::bad_request("imageId is required"))?;

    state.products.delete_image(image_id).await?;
    Ok(ApiResponse::message("Image deleted successfully"))
}

pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ApiResponse<ProductPage>> {
    let page = state.products.list(query.request(DEFAULT_PAGE_SIZE)).await?;
    Ok(ApiResponse::ok(page, "Products fetched successfully"))
}

/// Dashboard product detail
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<ApiResponse<ProductDetail>> {
    let product = state.products.get_by_slug(&slug).await?;
    Ok(ApiResponse::ok(product, "Product fetched successfully"))
}

/// Storefront product page
pub async fn product_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<ApiResponse<ProductDetail>> {
    let product = state.products.get_by_slug(&slug).await?;
    Ok(ApiResponse::ok(product, "Product fetched successfully"))
}

pub async fn search_products(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<ApiResponse<Vec<ProductDetail>>> {
    let products = state.products.search(query.required()?).await?;
    Ok(ApiResponse::ok(products, "Products fetched successfully"))
}

/// Storefront search box
pub async fn user_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<ApiResponse<Vec<ProductSearchHit>>> {
    let cleaned = clean_search_query(query.required()?);

    if cleaned.chars().count() < MIN_STOREFRONT_QUERY {
        return Ok(ApiResponse::ok(
            Vec::new(),
            "Please enter at least 2 characters to search",
        ));
    }

    let hits = state.products.storefront_search(&cleaned).await?;
    let message = if hits.is_empty() {
        "No products found"
    } else {
        "Products fetched successfully"
    };
    Ok(ApiResponse::ok(hits, message))
}

/// Export listing
pub async fn all_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ApiResponse<ProductExportPage>> {
    let page = state
        .products
        .export(query.request(DEFAULT_EXPORT_PAGE_SIZE))
        .await?;
    Ok(ApiResponse::ok(page, "Products fetched successfully"))
}

pub async fn product_length(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<i64>> {
    let total = state.products.count().await?;
    Ok(ApiResponse::ok(total, "Products counted successfully"))
}

pub async fn product_length_date(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let total = state.products.count().await?;
    let dates = state.products.creation_dates().await?;

    Ok(ApiResponse::ok(
        json!({ "totalProducts": total, "creationDates": dates }),
        "Products counted successfully",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn test_draft_requires_title() {
        let form = MultipartForm::default();
        assert!(matches!(draft_from_form(&form), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_draft_parses_fields() {
        let category = Uuid::new_v4();
        let mut form = MultipartForm::default();
        form.insert_text("title", " Gate Valve ");
        form.insert_text("price", "120.50");
        form.insert_text("salePrice", "");
        form.insert_text("categoryIds[]", category.to_string());
        form.insert_text("categoryIds[]", "junk");

        let draft = draft_from_form(&form).unwrap();
        assert_eq!(draft.title, "Gate Valve");
        assert_eq!(draft.price, Some(120.5));
        assert_eq!(draft.sale_price, None);
        assert_eq!(draft.category_ids, vec![category]);
        assert!(draft.sub_category_ids.is_empty());
    }

    #[test]
    fn test_invalid_price_is_rejected() {
        let mut form = MultipartForm::default();
        form.insert_text("title", "Pump");
        form.insert_text("price", "ten");
        assert!(matches!(draft_from_form(&form), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_changes_only_touch_present_fields() {
        let mut form = MultipartForm::default();
        form.insert_text("shortDesc", "");
        form.insert_text("categoryIds", "[]");

        let changes = changes_from_form(&form).unwrap();
        assert_eq!(changes.title, None);
        assert_eq!(changes.short_desc.as_deref(), Some(""));
        assert_eq!(changes.category_ids, Some(vec![]));
        assert_eq!(changes.sub_category_ids, None);
    }
}
