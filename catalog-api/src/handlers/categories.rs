use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::AuthUser;
use crate::models::category::{
    Category, CategoryNameRequest, CategoryPage, CategoryWithSubcategories, SubCategoryRef,
};
use crate::models::product::ProductPage;
use crate::models::{ApiResponse, ApiResult};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const DEFAULT_PRODUCT_PAGE_SIZE: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct CategoryProductsQuery {
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryLookupQuery {
    pub category: Option<String>,
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<CategoryNameRequest>,
) -> ApiResult<ApiResponse<Category>> {
    let category = state.categories.create(&req.name).await?;
    Ok(ApiResponse::created(category, "Category created successfully"))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<ApiResponse<CategoryPage>> {
    let page = state.categories.list(query.request(DEFAULT_PAGE_SIZE)).await?;
    Ok(ApiResponse::ok(page, "Categories fetched successfully"))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<CategoryNameRequest>,
) -> ApiResult<ApiResponse<Category>> {
    let category = state.categories.update(id, &req.name).await?;
    Ok(ApiResponse::ok(category, "Category updated successfully"))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    state.categories.delete(id).await?;
    Ok(ApiResponse::message(
        "Category and its subcategories deleted successfully",
    ))
}

pub async fn categories_length(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<i64>> {
    let total = state.categories.count().await?;
    Ok(ApiResponse::ok(total, "Categories counted successfully"))
}

pub async fn categories_length_date(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let total = state.categories.count().await?;
    let dates = state.categories.creation_dates().await?;

    Ok(ApiResponse::ok(
        json!({ "totalCategories": total, "creationDates": dates }),
        "Categories counted successfully",
    ))
}

/// Storefront product listing for one category (or all of them)
pub async fn category_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryProductsQuery>,
) -> ApiResult<ApiResponse<ProductPage>> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .request(DEFAULT_PRODUCT_PAGE_SIZE);

    match state
        .categories
        .products(query.category.as_deref(), page)
        .await?
    {
        Some(products) => Ok(ApiResponse::ok(products, "Products fetched successfully")),
        None => Ok(ApiResponse::miss(
            ProductPage {
                products: Vec::new(),
                total_products: 0,
                total_pages: 0,
                current_page: page.page,
            },
            "Category not found",
        )),
    }
}

pub async fn with_subcategories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryLookupQuery>,
) -> ApiResult<ApiResponse<Vec<CategoryWithSubcategories>>> {
    let categories = state
        .categories
        .with_subcategories(query.category.as_deref())
        .await?;
    Ok(ApiResponse::ok(
        categories,
        "Categories with subcategories fetched successfully",
    ))
}

pub async fn category_subcategories(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<ApiResponse<Vec<SubCategoryRef>>> {
    let subcategories = state.categories.subcategories_of(&category).await?;
    Ok(ApiResponse::ok(subcategories, "Subcategories fetched successfully"))
}
