use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::SearchQuery;
use crate::middleware::AuthUser;
use crate::models::lead::{CreateLeadRequest, Lead, LeadPage, UpdateLeadRequest};
use crate::models::{ApiResponse, ApiResult};
use crate::services::leads::parse_type_filter;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub lead_type: Option<String>,
}

/// Contact form submission from the storefront
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLeadRequest>,
) -> ApiResult<ApiResponse<Lead>> {
    let lead = state.leads.create(req).await?;
    Ok(ApiResponse::created(lead, "Lead created successfully"))
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<LeadListQuery>,
) -> ApiResult<ApiResponse<LeadPage>> {
    let status = parse_type_filter(query.lead_type.as_deref())?;
    let page = shared::PageRequest::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let leads = state.leads.list(page, status).await?;
    Ok(ApiResponse::ok(leads, "Leads fetched successfully"))
}

pub async fn recent_leads(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Vec<Lead>>> {
    let leads = state.leads.recent().await?;
    Ok(ApiResponse::ok(leads, "Recent leads fetched successfully"))
}

pub async fn all_leads(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Vec<Lead>>> {
    let leads = state.leads.all().await?;
    Ok(ApiResponse::ok(leads, "Leads fetched successfully"))
}

pub async fn leads_length(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<i64>> {
    let total = state.leads.count().await?;
    Ok(ApiResponse::ok(total, "Leads counted successfully"))
}

pub async fn leads_length_date(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<ApiResponse<Value>> {
    let total = state.leads.count().await?;
    let dates = state.leads.creation_dates().await?;

    Ok(ApiResponse::ok(
        json!({ "totalLeads": total, "creationDates": dates }),
        "Leads counted successfully",
    ))
}

pub async fn search_leads(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<ApiResponse<Vec<Lead>>> {
    let leads = state.leads.search(query.required()?).await?;
    Ok(ApiResponse::ok(leads, "Leads fetched successfully"))
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<ApiResponse<Lead>> {
    let lead = state.leads.get(&slug).await?;
    Ok(ApiResponse::ok(lead, "Lead fetched successfully"))
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
    Json(req): Json<UpdateLeadRequest>,
) -> ApiResult<ApiResponse<Lead>> {
    let lead = state.leads.update(&slug, req).await?;
    Ok(ApiResponse::ok(lead, "Lead updated successfully"))
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    state.leads.delete(&slug).await?;
    Ok(ApiResponse::message("Lead deleted successfully"))
}
