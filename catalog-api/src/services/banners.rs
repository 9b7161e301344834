use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::images::MediaStore;
use super::ordering::{next_position, plan_delete, plan_move, renumber, PositionUpdate, Slot};
use crate::models::banner::{Banner, BannerChanges, BannerFields};
use crate::models::{ApiError, ApiResult};
use crate::utils::multipart::UploadedFile;

const BANNER_COLUMNS: &str =
    "id, title, image_url, link_url, description, position, is_active, created_at, updated_at";

/// Homepage banners and their display order
#[derive(Clone)]
pub struct BannerService {
    pool: PgPool,
    media: MediaStore,
}

impl BannerService {
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    /// Lock the banner table and every row, then return the slots in display
    /// order. Every banner write goes through here first so they all queue on
    /// the same table lock.
    async fn lock_slots(tx: &mut Transaction<'_, Postgres>) -> ApiResult<Vec<Slot>> {
        sqlx::query("LOCK TABLE banners IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut **tx)
            .await?;

        let rows: Vec<(Uuid, i32)> = sqlx::query_as(
            "SELECT id, position FROM banners ORDER BY position ASC, created_at ASC FOR UPDATE",
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(|(id, position)| Slot::new(id, position)).collect())
    }

    async fn apply_positions(
        tx: &mut Transaction<'_, Postgres>,
        updates: &[PositionUpdate],
    ) -> ApiResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let positions: Vec<i32> = updates.iter().map(|u| u.position).collect();

        sqlx::query(
            "UPDATE banners AS b
             SET position = u.position, updated_at = NOW()
             FROM UNNEST($1::uuid[], $2::int4[]) AS u(id, position)
             WHERE b.id = u.id",
        )
        .bind(&ids)
        .bind(&positions)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Active banners in display order
    pub async fn list_active(&self) -> ApiResult<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(&format!(
            "SELECT {} FROM banners WHERE is_active = TRUE ORDER BY position ASC, created_at ASC",
            BANNER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(banners)
    }

    pub async fn list_all(&self) -> ApiResult<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(&format!(
            "SELECT {} FROM banners ORDER BY position ASC, created_at ASC",
            BANNER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(banners)
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Banner> {
        sqlx::query_as::<_, Banner>(&format!("SELECT {} FROM banners WHERE id = $1", BANNER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Banner not found"))
    }

    /// Append a banner after the current last position
    pub async fn create(&self, fields: BannerFields, image: &UploadedFile) -> ApiResult<Banner> {
        let image_url = self.media.upload_image(image).await?;

        let result: ApiResult<Banner> = async {
            let mut tx = self.pool.begin().await?;
            let slots = Self::lock_slots(&mut tx).await?;
            let position = next_position(&slots);

            let banner = sqlx::query_as::<_, Banner>(&format!(
                "INSERT INTO banners (title, image_url, link_url, description, position, is_active)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {}",
                BANNER_COLUMNS
            ))
            .bind(fields.title.trim())
            .bind(&image_url)
            .bind(&fields.link_url)
            .bind(&fields.description)
            .bind(position)
            .bind(fields.is_active)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(banner)
        }
        .await;

        match result {
            Ok(banner) => {
                info!(banner_id = %banner.id, position = banner.position, "Banner created");
                Ok(banner)
            }
            Err(e) => {
                self.media.discard(&[image_url]).await;
                Err(e)
            }
        }
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: BannerChanges,
        image: Option<&UploadedFile>,
    ) -> ApiResult<Banner> {
        let existing = self.get(id).await?;

        let new_image = match image {
            Some(file) => Some(self.media.upload_image(file).await?),
            None => None,
        };

        let updated = sqlx::query_as::<_, Banner>(&format!(
            "UPDATE banners SET
                title = COALESCE($2, title),
                link_url = COALESCE($3, link_url),
                description = COALESCE($4, description),
                is_active = COALESCE($5, is_active),
                image_url = COALESCE($6, image_url),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            BANNER_COLUMNS
        ))
        .bind(id)
        .bind(changes.title.as_deref().map(str::trim))
        .bind(&changes.link_url)
        .bind(&changes.description)
        .bind(changes.is_active)
        .bind(&new_image)
        .fetch_one(&self.pool)
        .await;

        let banner = match updated {
            Ok(banner) => banner,
            Err(e) => {
                if let Some(url) = new_image {
                    self.media.discard(&[url]).await;
                }
                return Err(e.into());
            }
        };

        if new_image.is_some() {
            self.media.discard(&[existing.image_url]).await;
        }

        info!(banner_id = %id, "Banner updated");
        Ok(banner)
    }

    /// Delete a banner and close the gap it leaves
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let slots = Self::lock_slots(&mut tx).await?;

        let (position, image_url): (i32, String) =
            sqlx::query_as("DELETE FROM banners WHERE id = $1 RETURNING position, image_url")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::not_found("Banner not found"))?;

        let remaining: Vec<Slot> = slots.into_iter().filter(|s| s.id != id).collect();
        let updates = plan_delete(&remaining, position);
        Self::apply_positions(&mut tx, &updates).await?;
        tx.commit().await?;

        info!(banner_id = %id, shifted = updates.len(), "Banner deleted");
        self.media.discard(&[image_url]).await;
        Ok(())
    }

    /// Move a banner to `new_position` (clamped to the banner count) and
    /// return every banner in the new order
    pub async fn move_to(&self, id: Uuid, new_position: i32) -> ApiResult<Vec<Banner>> {
        let mut tx = self.pool.begin().await?;
        let slots = Self::lock_slots(&mut tx).await?;

        let updates = plan_move(&slots, id, new_position)
            .ok_or_else(|| ApiError::not_found("Banner not found"))?;
        Self::apply_positions(&mut tx, &updates).await?;
        tx.commit().await?;

        info!(banner_id = %id, new_position, shifted = updates.len(), "Banner moved");
        self.list_all().await
    }

    /// Renumber every banner to 1..n in the current display order
    pub async fn assign_positions(&self) -> ApiResult<Vec<Banner>> {
        let mut tx = self.pool.begin().await?;
        let slots = Self::lock_slots(&mut tx).await?;

        let updates = renumber(&slots);
        Self::apply_positions(&mut tx, &updates).await?;
        tx.commit().await?;

        info!(renumbered = updates.len(), "Banner positions reassigned");
        self.list_all().await
    }
}
