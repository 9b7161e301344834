use shared::PageRequest;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::images::MediaStore;
use crate::models::category::{NamedRef, UNCATEGORIZED};
use crate::models::product::{
    ImageRef, Product, ProductChanges, ProductDetail, ProductDraft, ProductExportPage,
    ProductExportRow, ProductImageRow, ProductLinkRow, ProductPage, ProductSearchHit,
    ProductSearchRow,
};
use crate::models::{ApiError, ApiResult};
use crate::utils::multipart::UploadedFile;
use crate::utils::slug::{pick_unique, slugify};
use crate::utils::text::{contains_pattern, date_label, escape_like, meta_description};

/// Product columns, selected from `products p`
pub const PRODUCT_COLUMNS: &str = "p.id, p.title, p.description, p.short_desc, p.price, \
     p.sale_price, p.image, p.slug, p.seo_title, p.seo_desc, p.created_at, p.updated_at";

/// Storefront search returns at most this many hits
pub const STOREFRONT_SEARCH_LIMIT: i64 = 10;

fn group_refs(rows: Vec<ProductLinkRow>) -> HashMap<Uuid, Vec<NamedRef>> {
    let mut grouped: HashMap<Uuid, Vec<NamedRef>> = HashMap::new();
    for row in rows {
        grouped.entry(row.product_id).or_default().push(NamedRef {
            id: row.id,
            name: row.name,
        });
    }
    grouped
}

/// Attach categories, subcategories and gallery images to `products`,
/// keeping their order
pub async fn load_details(pool: &PgPool, products: Vec<Product>) -> ApiResult<Vec<ProductDetail>> {
    if products.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

    let categories = sqlx::query_as::<_, ProductLinkRow>(
        "SELECT pc.product_id, c.id, c.name
         FROM product_categories pc
         JOIN categories c ON c.id = pc.category_id
         WHERE pc.product_id = ANY($1)
         ORDER BY c.name",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let sub_categories = sqlx::query_as::<_, ProductLinkRow>(
        "SELECT ps.product_id, s.id, s.name
         FROM product_sub_categories ps
         JOIN sub_categories s ON s.id = ps.sub_category_id
         WHERE ps.product_id = ANY($1)
         ORDER BY s.name",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let images = sqlx::query_as::<_, ProductImageRow>(
        "SELECT id, url, product_id FROM product_images
         WHERE product_id = ANY($1)
         ORDER BY created_at ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut categories = group_refs(categories);
    let mut sub_categories = group_refs(sub_categories);
    let mut gallery: HashMap<Uuid, Vec<ImageRef>> = HashMap::new();
    for row in images {
        gallery.entry(row.product_id).or_default().push(ImageRef {
            id: row.id,
            url: row.url,
        });
    }

    Ok(products
        .into_iter()
        .map(|product| ProductDetail {
            categories: categories.remove(&product.id).unwrap_or_default(),
            sub_categories: sub_categories.remove(&product.id).unwrap_or_default(),
            images: gallery.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect())
}

/// Keep the requested ids that appear in `existing`, in request order
fn retain_known(requested: &[Uuid], existing: &[Uuid]) -> Vec<Uuid> {
    requested
        .iter()
        .copied()
        .filter(|id| existing.contains(id))
        .collect()
}

/// SEO fields fall back to the title and a description excerpt
fn seo_defaults(
    title: &str,
    description: Option<&str>,
    seo_title: Option<String>,
    seo_desc: Option<String>,
) -> (String, Option<String>) {
    let seo_title = seo_title.unwrap_or_else(|| title.to_string());
    let seo_desc = seo_desc.or_else(|| {
        description
            .map(meta_description)
            .filter(|d| !d.is_empty())
    });
    (seo_title, seo_desc)
}

#[derive(Clone)]
pub struct ProductService {
    pool: PgPool,
    media: MediaStore,
}

impl ProductService {
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    async fn find_by_slug(&self, slug: &str) -> ApiResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products p WHERE p.slug = $1",
            PRODUCT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
    }

    async fn detail(&self, product: Product) -> ApiResult<ProductDetail> {
        load_details(&self.pool, vec![product])
            .await?
            .pop()
            .ok_or_else(|| ApiError::internal("Product relations could not be loaded"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> ApiResult<ProductDetail> {
        let product = self.find_by_slug(slug).await?;
        self.detail(product).await
    }

    async fn get_by_id(&self, id: Uuid) -> ApiResult<ProductDetail> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products p WHERE p.id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

        self.detail(product).await
    }

    async fn unique_slug(&self, title: &str, exclude: Option<Uuid>) -> ApiResult<String> {
        let base = slugify(title);
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT slug FROM products
             WHERE (slug = $1 OR slug LIKE $2)
               AND ($3::uuid IS NULL OR id <> $3)",
        )
        .bind(&base)
        .bind(format!("{}-%", escape_like(&base)))
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;

        Ok(pick_unique(&base, &taken))
    }

    /// Category ids to link: the known subset of `requested`, or `Uncategorized` when empty
    async fn resolve_categories(&self, requested: &[Uuid]) -> ApiResult<Vec<Uuid>> {
        if requested.is_empty() {
            let uncategorized: Uuid = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
                .bind(UNCATEGORIZED)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ApiError::internal("Uncategorized category not found"))?;
            return Ok(vec![uncategorized]);
        }

        let existing: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ANY($1)")
            .bind(requested)
            .fetch_all(&self.pool)
            .await?;

        let known = retain_known(requested, &existing);
        if known.is_empty() {
            return Err(ApiError::not_found("No valid categories found"));
        }
        Ok(known)
    }

    /// Subcategories from `requested` that belong to one of `category_ids`
    async fn resolve_subcategories(&self, requested: &[Uuid], category_ids: &[Uuid]) -> ApiResult<Vec<Uuid>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM sub_categories WHERE id = ANY($1) AND category_id = ANY($2)",
        )
        .bind(requested)
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(retain_known(requested, &existing))
    }

    async fn replace_links(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        category_ids: &[Uuid],
        sub_category_ids: &[Uuid],
    ) -> ApiResult<()> {
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM product_sub_categories WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO product_categories (product_id, category_id)
             SELECT $1, category_id FROM UNNEST($2::uuid[]) AS category_id",
        )
        .bind(product_id)
        .bind(category_ids)
        .execute(&mut **tx)
        .await?;

        if !sub_category_ids.is_empty() {
            sqlx::query(
                "INSERT INTO product_sub_categories (product_id, sub_category_id)
                 SELECT $1, sub_category_id FROM UNNEST($2::uuid[]) AS sub_category_id",
            )
            .bind(product_id)
            .bind(sub_category_ids)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn insert_gallery(
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        urls: &[String],
    ) -> ApiResult<()> {
        if urls.is_empty() {
            return Ok(());
        }

        // ORDINALITY keeps created_at in upload order
        sqlx::query(
            "INSERT INTO product_images (url, product_id, created_at)
             SELECT g.url, $1, NOW() + (g.n * INTERVAL '1 microsecond')
             FROM UNNEST($2::text[]) WITH ORDINALITY AS g(url, n)",
        )
        .bind(product_id)
        .bind(urls)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Create a product with its thumbnail and gallery.
    ///
    /// Uploaded objects are removed again if the database write fails.
    pub async fn create(
        &self,
        draft: ProductDraft,
        thumbnail: &UploadedFile,
        gallery: &[UploadedFile],
    ) -> ApiResult<ProductDetail> {
        let category_ids = self.resolve_categories(&draft.category_ids).await?;
        let sub_category_ids = self
            .resolve_subcategories(&draft.sub_category_ids, &category_ids)
            .await?;
        let slug = self.unique_slug(&draft.title, None).await?;
        let (seo_title, seo_desc) = seo_defaults(
            &draft.title,
            draft.description.as_deref(),
            draft.seo_title.clone(),
            draft.seo_desc.clone(),
        );

        let image = self.media.upload_image(thumbnail).await?;
        let gallery_urls = match self.media.upload_images(gallery).await {
            Ok(urls) => urls,
            Err(e) => {
                self.media.discard(&[image]).await;
                return Err(e);
            }
        };

        let id = Uuid::new_v4();
        let result: ApiResult<()> = async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO products
                    (id, title, description, short_desc, price, sale_price, image, slug, seo_title, seo_desc)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(id)
            .bind(draft.title.trim())
            .bind(&draft.description)
            .bind(&draft.short_desc)
            .bind(draft.price)
            .bind(draft.sale_price)
            .bind(&image)
            .bind(&slug)
            .bind(&seo_title)
            .bind(&seo_desc)
            .execute(&mut *tx)
            .await?;

            Self::replace_links(&mut tx, id, &category_ids, &sub_category_ids).await?;
            Self::insert_gallery(&mut tx, id, &gallery_urls).await?;

            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let mut uploaded = gallery_urls;
            uploaded.push(image);
            self.media.discard(&uploaded).await;
            return Err(e);
        }

        info!(product_id = %id, slug = %slug, "Product created");
        self.get_by_id(id).await
    }

    /// Partially update a product. A new thumbnail or gallery replaces the
    /// stored one; the replaced objects are deleted after commit.
    pub async fn update(
        &self,
        slug: &str,
        changes: ProductChanges,
        thumbnail: Option<&UploadedFile>,
        gallery: &[UploadedFile],
    ) -> ApiResult<ProductDetail> {
        let existing = self.get_by_slug(slug).await?;
        let id = existing.product.id;

        let title = changes
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let new_slug = match title {
            Some(t) if t != existing.product.title => Some(self.unique_slug(t, Some(id)).await?),
            _ => None,
        };

        let category_ids = match &changes.category_ids {
            Some(requested) => Some(self.resolve_categories(requested).await?),
            None => None,
        };
        let sub_category_ids = match (&changes.sub_category_ids, &category_ids) {
            (None, None) => None,
            (requested, categories) => {
                let categories = categories
                    .clone()
                    .unwrap_or_else(|| existing.categories.iter().map(|c| c.id).collect());
                let requested = requested
                    .clone()
                    .unwrap_or_else(|| existing.sub_categories.iter().map(|s| s.id).collect());
                Some(self.resolve_subcategories(&requested, &categories).await?)
            }
        };

        let new_image = match thumbnail {
            Some(file) => Some(self.media.upload_image(file).await?),
            None => None,
        };
        let new_gallery = if gallery.is_empty() {
            None
        } else {
            match self.media.upload_images(gallery).await {
                Ok(urls) => Some(urls),
                Err(e) => {
                    self.media.discard(&new_image.into_iter().collect::<Vec<_>>()).await;
                    return Err(e);
                }
            }
        };

        let result: ApiResult<()> = async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "UPDATE products SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    short_desc = COALESCE($4, short_desc),
                    price = COALESCE($5, price),
                    sale_price = COALESCE($6, sale_price),
                    image = COALESCE($7, image),
                    slug = COALESCE($8, slug),
                    seo_title = COALESCE($9, seo_title),
                    seo_desc = COALESCE($10, seo_desc),
                    updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(title)
            .bind(&changes.description)
            .bind(&changes.short_desc)
            .bind(changes.price)
            .bind(changes.sale_price)
            .bind(&new_image)
            .bind(&new_slug)
            .bind(&changes.seo_title)
            .bind(&changes.seo_desc)
            .execute(&mut *tx)
            .await?;

            if category_ids.is_some() || sub_category_ids.is_some() {
                let categories = category_ids
                    .clone()
                    .unwrap_or_else(|| existing.categories.iter().map(|c| c.id).collect());
                let subs = sub_category_ids.clone().unwrap_or_default();
                Self::replace_links(&mut tx, id, &categories, &subs).await?;
            }

            if let Some(urls) = &new_gallery {
                sqlx::query("DELETE FROM product_images WHERE product_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                Self::insert_gallery(&mut tx, id, urls).await?;
            }

            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let mut uploaded: Vec<String> = new_gallery.unwrap_or_default();
            uploaded.extend(new_image);
            self.media.discard(&uploaded).await;
            return Err(e);
        }

        let mut replaced: Vec<String> = Vec::new();
        if new_image.is_some() {
            replaced.push(existing.product.image.clone());
        }
        if new_gallery.is_some() {
            replaced.extend(existing.images.iter().map(|i| i.url.clone()));
        }
        if !replaced.is_empty() {
            self.media.discard(&replaced).await;
        }

        info!(product_id = %id, "Product updated");
        self.get_by_id(id).await
    }

    pub async fn delete(&self, slug: &str) -> ApiResult<()> {
        let existing = self.get_by_slug(slug).await?;
        let id = existing.product.id;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM product_images WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM product_sub_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(product_id = %id, slug = %slug, "Product deleted");
        self.media.discard(&existing.image_urls()).await;
        Ok(())
    }

    /// Remove one gallery image
    pub async fn delete_image(&self, image_id: Uuid) -> ApiResult<()> {
        let url: String = sqlx::query_scalar("DELETE FROM product_images WHERE id = $1 RETURNING url")
            .bind(image_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Image not found"))?;

        if let Err(e) = self.media.delete_url(&url).await {
            warn!(image_id = %image_id, error = %e, "Gallery image row removed but object delete failed");
        }

        info!(image_id = %image_id, "Gallery image deleted");
        Ok(())
    }

    /// Dashboard listing, oldest first
    pub async fn list(&self, page: PageRequest) -> ApiResult<ProductPage> {
        let total = self.count().await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products p ORDER BY p.created_at ASC LIMIT $1 OFFSET $2",
            PRODUCT_COLUMNS
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let meta = page.meta(total);
        Ok(ProductPage {
            products: load_details(&self.pool, products).await?,
            total_products: total,
            total_pages: meta.total_pages,
            current_page: meta.current_page,
        })
    }

    /// Title or description contains `query`, newest first
    pub async fn search(&self, query: &str) -> ApiResult<Vec<ProductDetail>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products p
             WHERE p.title ILIKE $1 OR p.description ILIKE $1
             ORDER BY p.created_at DESC
             LIMIT $2",
            PRODUCT_COLUMNS
        ))
        .bind(contains_pattern(query.trim()))
        .bind(shared::types::common::MAX_PAGE_SIZE)
        .fetch_all(&self.pool)
        .await?;

        load_details(&self.pool, products).await
    }

    /// Storefront search over an already cleaned query
    pub async fn storefront_search(&self, query: &str) -> ApiResult<Vec<ProductSearchHit>> {
        let rows = sqlx::query_as::<_, ProductSearchRow>(
            "SELECT p.id, p.title, p.slug, p.image, p.short_desc,
                (SELECT c.name FROM product_categories pc
                 JOIN categories c ON c.id = pc.category_id
                 WHERE pc.product_id = p.id
                 ORDER BY c.name
                 LIMIT 1) AS category
             FROM products p
             WHERE p.title ILIKE $1 OR p.short_desc ILIKE $1 OR p.description ILIKE $1
             ORDER BY p.created_at DESC
             LIMIT $2",
        )
        .bind(contains_pattern(query))
        .bind(STOREFRONT_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProductSearchHit::from).collect())
    }

    /// Flattened rows for spreadsheet export, oldest first
    pub async fn export(&self, page: PageRequest) -> ApiResult<ProductExportPage> {
        let listing = self.list(page).await?;

        Ok(ProductExportPage {
            products: listing
                .products
                .into_iter()
                .map(ProductExportRow::from)
                .collect(),
            total_products: listing.total_products,
            total_pages: listing.total_pages,
            current_page: listing.current_page,
        })
    }

    pub async fn count(&self) -> ApiResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn creation_dates(&self) -> ApiResult<Vec<String>> {
        let dates: Vec<chrono::DateTime<chrono::Utc>> =
            sqlx::query_scalar("SELECT created_at FROM products ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(dates.iter().map(date_label).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retain_known_keeps_request_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(retain_known(&[c, a, b], &[a, c]), vec![c, a]);
        assert!(retain_known(&[a], &[]).is_empty());
    }

    #[test]
    fn test_seo_defaults_from_title_and_description() {
        let (title, desc) = seo_defaults(
            "Ball Valve",
            Some("<p>Forged&nbsp;brass, PN-16.</p>"),
            None,
            None,
        );
        assert_eq!(title, "Ball Valve");
        assert_eq!(desc.as_deref(), Some("Forged brass PN 16"));
    }

    #[test]
    fn test_seo_defaults_keep_explicit_values() {
        let (title, desc) = seo_defaults(
            "Ball Valve",
            Some("long text"),
            Some("Custom".into()),
            Some("Meta".into()),
        );
        assert_eq!(title, "Custom");
        assert_eq!(desc.as_deref(), Some("Meta"));
    }

    #[test]
    fn test_seo_description_absent_without_text() {
        let (_, desc) = seo_defaults("Pump", Some("<br/>"), None, None);
        assert!(desc.is_none());
    }

    #[test]
    fn test_group_refs() {
        let product = Uuid::new_v4();
        let grouped = group_refs(vec![
            ProductLinkRow { product_id: product, id: Uuid::nil(), name: "a".into() },
            ProductLinkRow { product_id: product, id: Uuid::nil(), name: "b".into() },
        ]);
        assert_eq!(grouped[&product].len(), 2);
    }
}
