use shared::{LeadStatus, PageRequest};
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::models::lead::{CreateLeadRequest, Lead, LeadPage, UpdateLeadRequest};
use crate::models::{ApiError, ApiResult};
use crate::utils::slug::{pick_unique, slugify};
use crate::utils::text::{contains_pattern, date_label, escape_like};
use crate::utils::validation::normalize_email;

const LEAD_COLUMNS: &str =
    "id, name, email, phone, subject, message, slug, type, created_at, updated_at";

pub const RECENT_LEADS: i64 = 5;

/// Parse the `type` query filter; absent, empty or `all` means no filter
pub fn parse_type_filter(raw: Option<&str>) -> ApiResult<Option<LeadStatus>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) if t.eq_ignore_ascii_case("all") => Ok(None),
        Some(t) => t
            .parse::<LeadStatus>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Unknown lead type: {}", t))),
    }
}

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
}

impl LeadService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn unique_slug(&self, name: &str) -> ApiResult<String> {
        let base = slugify(name);
        let taken: Vec<String> =
            sqlx::query_scalar("SELECT slug FROM leads WHERE slug = $1 OR slug LIKE $2")
                .bind(&base)
                .bind(format!("{}-%", escape_like(&base)))
                .fetch_all(&self.pool)
                .await?;

        Ok(pick_unique(&base, &taken))
    }

    /// Store an enquiry from the public contact form
    pub async fn create(&self, request: CreateLeadRequest) -> ApiResult<Lead> {
        request.validate()?;
        let email = normalize_email(&request.email)?;
        let slug = self.unique_slug(&request.name).await?;

        let lead = sqlx::query_as::<_, Lead>(&format!(
            "INSERT INTO leads (name, email, phone, subject, message, slug, type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            LEAD_COLUMNS
        ))
        .bind(request.name.trim())
        .bind(&email)
        .bind(request.phone.trim())
        .bind(request.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .bind(request.message.trim())
        .bind(&slug)
        .bind(LeadStatus::OnProcess)
        .fetch_one(&self.pool)
        .await?;

        info!(lead_id = %lead.id, slug = %lead.slug, "Lead received");
        Ok(lead)
    }

    /// Newest first, optionally filtered by status
    pub async fn list(&self, page: PageRequest, status: Option<LeadStatus>) -> ApiResult<LeadPage> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM leads WHERE ($1::lead_status IS NULL OR type = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let leads = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads
             WHERE ($1::lead_status IS NULL OR type = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
            LEAD_COLUMNS
        ))
        .bind(status)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let meta = page.meta(total);
        Ok(LeadPage {
            leads,
            total_leads: total,
            total_pages: meta.total_pages,
            current_page: meta.current_page,
        })
    }

    pub async fn recent(&self) -> ApiResult<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads ORDER BY created_at DESC LIMIT $1",
            LEAD_COLUMNS
        ))
        .bind(RECENT_LEADS)
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    pub async fn all(&self) -> ApiResult<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads ORDER BY created_at DESC",
            LEAD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    pub async fn count(&self) -> ApiResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn creation_dates(&self) -> ApiResult<Vec<String>> {
        let dates: Vec<chrono::DateTime<chrono::Utc>> =
            sqlx::query_scalar("SELECT created_at FROM leads ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(dates.iter().map(date_label).collect())
    }

    pub async fn search(&self, query: &str) -> ApiResult<Vec<Lead>> {
        let leads = sqlx::query_as::<_, Lead>(&format!(
            "SELECT {} FROM leads
             WHERE name ILIKE $1 OR email ILIKE $1 OR phone ILIKE $1
                OR subject ILIKE $1 OR message ILIKE $1
             ORDER BY created_at DESC",
            LEAD_COLUMNS
        ))
        .bind(contains_pattern(query.trim()))
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    pub async fn get(&self, slug: &str) -> ApiResult<Lead> {
        sqlx::query_as::<_, Lead>(&format!("SELECT {} FROM leads WHERE slug = $1", LEAD_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Lead not found"))
    }

    pub async fn update(&self, slug: &str, request: UpdateLeadRequest) -> ApiResult<Lead> {
        request.validate()?;
        let email = request.email.as_deref().map(normalize_email).transpose()?;

        let lead = sqlx::query_as::<_, Lead>(&format!(
            "UPDATE leads SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                subject = COALESCE($5, subject),
                message = COALESCE($6, message),
                type = COALESCE($7, type),
                updated_at = NOW()
             WHERE slug = $1
             RETURNING {}",
            LEAD_COLUMNS
        ))
        .bind(slug)
        .bind(request.name.as_deref().map(str::trim))
        .bind(email)
        .bind(request.phone.as_deref().map(str::trim))
        .bind(&request.subject)
        .bind(&request.message)
        .bind(request.lead_type)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Lead not found"))?;

        info!(lead_id = %lead.id, status = %lead.lead_type.as_str(), "Lead updated");
        Ok(lead)
    }

    /// Delete a lead; its comments go with it
    pub async fn delete(&self, slug: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM leads WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Lead not found"));
        }

        info!(slug = %slug, "Lead deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_filter() {
        assert_eq!(parse_type_filter(None).unwrap(), None);
        assert_eq!(parse_type_filter(Some("all")).unwrap(), None);
        assert_eq!(parse_type_filter(Some(" ")).unwrap(), None);
        assert_eq!(
            parse_type_filter(Some("Converted")).unwrap(),
            Some(LeadStatus::Converted)
        );
        assert!(matches!(
            parse_type_filter(Some("lost")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
