use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::banner::{Banner, BannerChanges, BannerFields, UpdatePositionRequest};
use crate::models::{ApiError, ApiResponse, ApiResult};
use crate::utils::multipart::MultipartForm;
use crate::utils::validation::required_text;
use crate::AppState;

/// Checkbox values arrive as strings; anything but `"true"` is off
fn is_active_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim) == Some("true")
}

fn fields_from_form(form: &MultipartForm) -> ApiResult<BannerFields> {
    Ok(BannerFields {
        title: required_text(form.text("title"), "title")?,
        link_url: form.non_empty("linkUrl"),
        description: form.non_empty("description"),
        is_active: is_active_flag(form.text("isActive")),
    })
}

fn changes_from_form(form: &MultipartForm) -> BannerChanges {
    BannerChanges {
        title: form.non_empty("title"),
        link_url: form.text("linkUrl").map(|v| v.trim().to_string()),
        description: form.text("description").map(|v| v.trim().to_string()),
        is_active: form
            .has_field("isActive")
            .then(|| is_active_flag(form.text("isActive"))),
    }
}

/// Storefront carousel
pub async fn list_active(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse<Vec<Banner>>> {
    let banners = state.banners.list_active().await?;
    Ok(ApiResponse::ok(banners, "Banners fetched successfully"))
}

pub async fn list_banners(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ApiResponse<Vec<Banner>>> {
    let banners = state.banners.list_all().await?;
    Ok(ApiResponse::ok(banners, "Banners fetched successfully"))
}

pub async fn get_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Banner>> {
    let banner = state.banners.get(id).await?;
    Ok(ApiResponse::ok(banner, "Banner fetched successfully"))
}

pub async fn create_banner(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Banner>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let fields = fields_from_form(&form)?;
    let image = form
        .single_file("image")?
        .ok_or_else(|| ApiError::bad_request("Banner image is required"))?;

    let banner = state.banners.create(fields, image).await?;
    Ok(ApiResponse::created(banner, "Banner created successfully"))
}

pub async fn update_banner(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Banner>> {
    let form = MultipartForm::from_multipart(multipart).await?;

    let changes = changes_from_form(&form);
    let image = form.single_file("image")?;

    let banner = state.banners.update(id, changes, image).await?;
    Ok(ApiResponse::ok(banner, "Banner updated successfully"))
}

pub async fn delete_banner(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    state.banners.delete(id).await?;
    Ok(ApiResponse::message("Banner deleted successfully"))
}

pub async fn update_position(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePositionRequest>,
) -> ApiResult<ApiResponse<Vec<Banner>>> {
    let banners = state.banners.move_to(id, req.new_position).await?;
    Ok(ApiResponse::ok(banners, "Banner position updated successfully"))
}

pub async fn assign_positions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Vec<Banner>>> {
    let banners = state.banners.assign_positions().await?;
    Ok(ApiResponse::ok(banners, "Banner positions assigned successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_active_only_for_literal_true() {
        assert!(is_active_flag(Some("true")));
        assert!(!is_active_flag(Some("TRUE")));
        assert!(!is_active_flag(Some("on")));
        assert!(!is_active_flag(None));
    }

    #[test]
    fn test_create_requires_title() {
        let mut form = MultipartForm::default();
        form.insert_text("isActive", "true");
        assert!(matches!(fields_from_form(&form), Err(ApiError::Validation(_))));

        form.insert_text("title", "Summer sale");
        let fields = fields_from_form(&form).unwrap();
        assert_eq!(fields.title, "Summer sale");
        assert!(fields.is_active);
        assert_eq!(fields.link_url, None);
    }

    #[test]
    fn test_changes_leave_absent_fields() {
        let mut form = MultipartForm::default();
        form.insert_text("isActive", "false");

        let changes = changes_from_form(&form);
        assert_eq!(changes.title, None);
        assert_eq!(changes.is_active, Some(false));
        assert_eq!(changes.description, None);
    }
}
