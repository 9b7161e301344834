use shared::PageRequest;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::images::MediaStore;
use super::products::{load_details, PRODUCT_COLUMNS};
use crate::models::category::{
    CategorySubcategoryCards, NamedRef, ProductRef, SubCategory, SubCategoryCard,
    SubCategoryCardRow, SubCategoryDetail, SubCategoryListItem, SubCategoryListRow,
    SubCategoryPage, SubCategoryProducts,
};
use crate::models::product::Product;
use crate::models::{ApiError, ApiResult};
use crate::utils::multipart::UploadedFile;
use crate::utils::text::{
    alphanumeric_only, and_variants, contains_pattern, dash_variants, lookup_key, subcategory_name,
};

const SUBCATEGORY_COLUMNS: &str = "id, name, image, category_id, created_at, updated_at";

const LIST_SELECT: &str = "SELECT s.id, s.name, s.image, s.category_id, s.created_at, s.updated_at,
        c.name AS category_name,
        (SELECT COUNT(*) FROM product_sub_categories ps WHERE ps.sub_category_id = s.id) AS product_count
     FROM sub_categories s
     JOIN categories c ON c.id = s.category_id";

/// Normalised lowercase name column, comparable with `lookup_key` output
const NAME_KEY: &str = "LOWER(REPLACE(name, '-', ' '))";

/// Subcategory fields from a multipart edit; `None` keeps the stored value
#[derive(Debug, Default)]
pub struct SubCategoryChanges<'a> {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub image: Option<&'a UploadedFile>,
}

impl SubCategoryChanges<'_> {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.category_id.is_none() && self.image.is_none()
    }
}

#[derive(Clone)]
pub struct SubCategoryService {
    pool: PgPool,
    media: MediaStore,
}

impl SubCategoryService {
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    async fn ensure_category(&self, category_id: Uuid) -> ApiResult<NamedRef> {
        sqlx::query_as::<_, NamedRef>("SELECT id, name FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Category not found"))
    }

    async fn name_taken(&self, name: &str, exclude: Option<Uuid>) -> ApiResult<bool> {
        let taken = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM sub_categories WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2)
             )",
        )
        .bind(name)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn find(&self, id: Uuid) -> ApiResult<SubCategory> {
        sqlx::query_as::<_, SubCategory>(&format!(
            "SELECT {} FROM sub_categories WHERE id = $1",
            SUBCATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Subcategory not found"))
    }

    pub async fn create(
        &self,
        raw_name: &str,
        category_id: Uuid,
        image: Option<&UploadedFile>,
    ) -> ApiResult<SubCategory> {
        let name = subcategory_name(raw_name);
        if name.is_empty() {
            return Err(ApiError::bad_request("Subcategory name is required"));
        }
        if self.name_taken(&name, None).await? {
            return Err(ApiError::bad_request("Subcategory with this name already exists"));
        }
        self.ensure_category(category_id).await?;

        let image_url = match image {
            Some(file) => Some(self.media.upload_image(file).await?),
            None => None,
        };

        let inserted = sqlx::query_as::<_, SubCategory>(&format!(
            "INSERT INTO sub_categories (id, name, image, category_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {}",
            SUBCATEGORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&name)
        .bind(&image_url)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(sub_category) => {
                info!(sub_category_id = %sub_category.id, name = %sub_category.name, "Subcategory created");
                Ok(sub_category)
            }
            Err(e) => {
                if let Some(url) = image_url {
                    self.media.discard(&[url]).await;
                }
                Err(e.into())
            }
        }
    }

    /// Dashboard listing, newest first
    pub async fn list(&self, page: PageRequest) -> ApiResult<SubCategoryPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_categories")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, SubCategoryListRow>(&format!(
            "{} ORDER BY s.created_at DESC LIMIT $1 OFFSET $2",
            LIST_SELECT
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let meta = page.meta(total);
        Ok(SubCategoryPage {
            sub_categories: rows.into_iter().map(SubCategoryListItem::from).collect(),
            total_sub_categories: total,
            total_pages: meta.total_pages,
            current_page: meta.current_page,
        })
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<SubCategoryDetail> {
        let sub_category = self.find(id).await?;
        let category = self.ensure_category(sub_category.category_id).await?;

        let products = sqlx::query_as::<_, ProductRef>(
            "SELECT p.id, p.title, p.slug
             FROM products p
             JOIN product_sub_categories ps ON ps.product_id = p.id
             WHERE ps.sub_category_id = $1
             ORDER BY p.created_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(SubCategoryDetail {
            sub_category,
            category,
            products,
        })
    }

    /// Apply a partial edit. A replaced image is deleted once the row is saved;
    /// a fresh upload is deleted again when the save fails.
    pub async fn update(&self, id: Uuid, changes: SubCategoryChanges<'_>) -> ApiResult<SubCategory> {
        if changes.is_empty() {
            return Err(ApiError::bad_request(
                "Provide at least one of name, categoryId or image",
            ));
        }

        let existing = self.find(id).await?;

        let name = match changes.name.as_deref() {
            Some(raw) => {
                let name = subcategory_name(raw);
                if name.is_empty() {
                    return Err(ApiError::bad_request("Subcategory name is required"));
                }
                if self.name_taken(&name, Some(id)).await? {
                    return Err(ApiError::bad_request("Subcategory with this name already exists"));
                }
                Some(name)
            }
            None => None,
        };

        if let Some(category_id) = changes.category_id {
            self.ensure_category(category_id).await?;
        }

        let new_image = match changes.image {
            Some(file) => Some(self.media.upload_image(file).await?),
            None => None,
        };

        let updated = sqlx::query_as::<_, SubCategory>(&format!(
            "UPDATE sub_categories SET
                name = COALESCE($2, name),
                category_id = COALESCE($3, category_id),
                image = COALESCE($4, image),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            SUBCATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(&name)
        .bind(changes.category_id)
        .bind(&new_image)
        .fetch_one(&self.pool)
        .await;

        let sub_category = match updated {
            Ok(sub_category) => sub_category,
            Err(e) => {
                if let Some(url) = new_image {
                    self.media.discard(&[url]).await;
                }
                return Err(e.into());
            }
        };

        // Product links to the old parent's category are left as they are
        if new_image.is_some() {
            if let Some(old) = existing.image.filter(|u| !u.trim().is_empty()) {
                self.media.discard(&[old]).await;
            }
        }

        info!(sub_category_id = %id, "Subcategory updated");
        Ok(sub_category)
    }

    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let image: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT image FROM sub_categories WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Subcategory not found"))?;

        sqlx::query("DELETE FROM product_sub_categories WHERE sub_category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sub_categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(sub_category_id = %id, "Subcategory deleted");
        if let Some(url) = image.filter(|u| !u.trim().is_empty()) {
            self.media.discard(&[url]).await;
        }
        Ok(())
    }

    async fn first_match(&self, clause: &str, value: &str) -> ApiResult<Option<Uuid>> {
        let id = sqlx::query_scalar(&format!(
            "SELECT id FROM sub_categories WHERE {} ORDER BY LENGTH(name), created_at LIMIT 1",
            clause
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn first_match_any(&self, values: &[String]) -> ApiResult<Option<Uuid>> {
        if values.is_empty() {
            return Ok(None);
        }

        let id = sqlx::query_scalar(
            "SELECT id FROM sub_categories WHERE LOWER(name) = ANY($1)
             ORDER BY LENGTH(name), created_at LIMIT 1",
        )
        .bind(values)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Resolve a storefront URL term to a subcategory.
    ///
    /// Tries an exact match, then a substring match, then the dash and
    /// `and`/`&` spellings of the term.
    async fn resolve(&self, term: &str) -> ApiResult<Option<Uuid>> {
        let key = lookup_key(term);
        if key.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.first_match(&format!("{} = $1", NAME_KEY), &key).await? {
            return Ok(Some(id));
        }
        if let Some(id) = self
            .first_match(&format!("{} LIKE $1", NAME_KEY), &contains_pattern(&key))
            .await?
        {
            return Ok(Some(id));
        }
        if let Some(id) = self.first_match_any(&dash_variants(&term.to_lowercase())).await? {
            return Ok(Some(id));
        }

        debug!(term = %term, "Falling back to and/& spellings");
        self.first_match_any(&and_variants(&key)).await
    }

    /// Products of the subcategory named by `term`; `None` when nothing matches.
    ///
    /// Without `page` every product is returned.
    pub async fn products(&self, term: &str, page: Option<PageRequest>) -> ApiResult<Option<SubCategoryProducts>> {
        let Some(id) = self.resolve(term).await? else {
            return Ok(None);
        };
        let sub_category = self.find(id).await?;
        let category = self.ensure_category(sub_category.category_id).await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_sub_categories WHERE sub_category_id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM products p
             JOIN product_sub_categories ps ON ps.product_id = p.id
             WHERE ps.sub_category_id = $1
             ORDER BY p.created_at DESC",
            PRODUCT_COLUMNS
        );
        let products = match page {
            Some(page) => {
                sqlx::query_as::<_, Product>(&format!("{} LIMIT $2 OFFSET $3", sql))
                    .bind(id)
                    .bind(page.limit)
                    .bind(page.offset())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Product>(&sql)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let (total_pages, current_page) = match page {
            Some(page) => {
                let meta = page.meta(total);
                (meta.total_pages, meta.current_page)
            }
            None => (1, 1),
        };

        Ok(Some(SubCategoryProducts {
            sub_category: Some(NamedRef {
                id: sub_category.id,
                name: sub_category.name,
            }),
            category: Some(category),
            products: load_details(&self.pool, products).await?,
            total_products: total,
            total_pages,
            current_page,
        }))
    }

    /// Subcategory cards of the category matching `term`; `None` when no category matches
    pub async fn by_category(&self, term: &str) -> ApiResult<Option<CategorySubcategoryCards>> {
        let key = lookup_key(term);

        let mut category = sqlx::query_as::<_, NamedRef>(&format!(
            "SELECT id, name FROM categories WHERE {} = $1 LIMIT 1",
            NAME_KEY
        ))
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        if category.is_none() {
            category = sqlx::query_as::<_, NamedRef>(&format!(
                "SELECT id, name FROM categories WHERE {} LIKE $1 ORDER BY LENGTH(name) LIMIT 1",
                NAME_KEY
            ))
            .bind(contains_pattern(&key))
            .fetch_optional(&self.pool)
            .await?;
        }

        let Some(category) = category else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, SubCategoryCardRow>(
            "SELECT s.id, s.name, s.image,
                (SELECT COUNT(*) FROM product_sub_categories ps WHERE ps.sub_category_id = s.id) AS product_count
             FROM sub_categories s
             WHERE s.category_id = $1
             ORDER BY s.name",
        )
        .bind(category.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CategorySubcategoryCards {
            category,
            subcategories: rows.into_iter().map(SubCategoryCard::from).collect(),
        }))
    }

    /// Subcategory by a loosely written name: exact, contains, then letters and digits only
    pub async fn info(&self, raw_name: &str) -> ApiResult<SubCategoryListItem> {
        let key = lookup_key(raw_name);
        if key.is_empty() {
            return Err(ApiError::bad_request("Subcategory name is required"));
        }

        let mut found = self.first_match(&format!("{} = $1", NAME_KEY), &key).await?;
        if found.is_none() {
            found = self
                .first_match(&format!("{} LIKE $1", NAME_KEY), &contains_pattern(&key))
                .await?;
        }
        if found.is_none() {
            found = self
                .first_match(
                    "TRIM(REGEXP_REPLACE(LOWER(name), '[^a-z0-9]+', ' ', 'g')) = $1",
                    &alphanumeric_only(raw_name),
                )
                .await?;
        }

        let id = found.ok_or_else(|| ApiError::not_found("Subcategory not found"))?;

        let row = sqlx::query_as::<_, SubCategoryListRow>(&format!("{} WHERE s.id = $1", LIST_SELECT))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}
