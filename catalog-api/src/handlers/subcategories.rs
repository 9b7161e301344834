use axum::extract::{Multipart, Path, Query, State};
use serde::Deserialize;
use shared::PageRequest;
use std::sync::Arc;
use uuid::Uuid;

use super::PageQuery;
use crate::middleware::AuthUser;
use crate::models::category::{
    CategorySubcategoryCards, NamedRef, SubCategory, SubCategoryDetail, SubCategoryListItem,
    SubCategoryPage, SubCategoryProducts,
};
use crate::models::{ApiError, ApiResponse, ApiResult};
use crate::services::subcategories::SubCategoryChanges;
use crate::utils::multipart::MultipartForm;
use crate::utils::validation::required_text;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SubCategoryProductsQuery {
    pub subcategory: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ByCategoryQuery {
    pub category: Option<String>,
}

fn category_id_field(form: &MultipartForm) -> ApiResult<Option<Uuid>> {
    form.non_empty("categoryId")
        .map(|raw| {
            Uuid::parse_str(&raw).map_err(|_| ApiError::bad_request("Invalid categoryId"))
        })
        .transpose()
}

pub async fn subcategory_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubCategoryProductsQuery>,
) -> ApiResult<ApiResponse<SubCategoryProducts>> {
    let term = query
        .subcategory
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Subcategory is required"))?;

    // Only paginate when the caller asks for a specific page
    let page = match (query.page, query.limit) {
        (Some(page), Some(limit)) => Some(PageRequest::new(Some(page), Some(limit), limit)),
        _ => None,
    };

    match state.subcategories.products(term, page).await? {
        Some(products) => Ok(ApiResponse::ok(products, "Products fetched successfully")),
        None => Ok(ApiResponse::miss(
            SubCategoryProducts::empty(page.map(|p| p.page).unwrap_or(1)),
            "Subcategory not found",
        )),
    }
}

pub async fn subcategories_by_category(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByCategoryQuery>,
) -> ApiResult<ApiResponse<Option<CategorySubcategoryCards>>> {
    let term = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Category is required"))?;

    match state.subcategories.by_category(term).await? {
        Some(cards) => Ok(ApiResponse::ok(Some(cards), "Subcategories fetched successfully")),
        None => Ok(ApiResponse::miss(None, "Category not found")),
    }
}

pub async fn subcategory_info(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<ApiResponse<SubCategoryListItem>> {
    let info = state.subcategories.info(&name).await?;
    Ok(ApiResponse::ok(info, "Subcategory fetched successfully"))
}

pub async fn create_subcategory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    multipart: Multipart,
) -> ApiResult<ApiResponse<SubCategory>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let name = required_text(form.text("name"), "name")?;
    let category_id = category_id_field(&form)?
        .ok_or_else(|| ApiError::Validation("categoryId is required".into()))?;
    let image = form.single_file("image")?;

    let sub_category = state
        .subcategories
        .create(&name, category_id, image)
        .await?;

    Ok(ApiResponse::created(sub_category, "Subcategory created successfully"))
}

pub async fn list_subcategories(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<ApiResponse<SubCategoryPage>> {
    let page = state
        .subcategories
        .list(query.request(DEFAULT_PAGE_SIZE))
        .await?;
    Ok(ApiResponse::ok(page, "Subcategories fetched successfully"))
}

pub async fn get_subcategory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<SubCategoryDetail>> {
    let detail = state.subcategories.get(id).await?;
    Ok(ApiResponse::ok(detail, "Subcategory fetched successfully"))
}

pub async fn update_subcategory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<SubCategory>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let changes = SubCategoryChanges {
        name: form.non_empty("name"),
        category_id: category_id_field(&form)?,
        image: form.single_file("image")?,
    };

    let sub_category = state.subcategories.update(id, changes).await?;

    Ok(ApiResponse::ok(sub_category, "Subcategory updated successfully"))
}

pub async fn delete_subcategory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<NamedRef>> {
    let existing = state.subcategories.get(id).await?;
    state.subcategories.delete(id).await?;

    Ok(ApiResponse::ok(
        NamedRef {
            id,
            name: existing.sub_category.name,
        },
        "Subcategory deleted successfully",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_id_field() {
        let mut form = MultipartForm::default();
        assert_eq!(category_id_field(&form).unwrap(), None);

        let id = Uuid::new_v4();
        form.insert_text("categoryId", id.to_string());
        assert_eq!(category_id_field(&form).unwrap(), Some(id));

        let mut form = MultipartForm::default();
        form.insert_text("categoryId", "not-a-uuid");
        assert!(matches!(category_id_field(&form), Err(ApiError::BadRequest(_))));
    }
}
