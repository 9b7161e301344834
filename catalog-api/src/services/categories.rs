use shared::PageRequest;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use super::images::MediaStore;
use super::products::{load_details, PRODUCT_COLUMNS};
use crate::models::category::{
    Category, CategoryCountRow, CategoryPage, CategoryWithSubcategories, SubCategoryRef,
    SubCategorySummary, UNCATEGORIZED,
};
use crate::models::product::{Product, ProductPage};
use crate::models::{ApiError, ApiResult};
use crate::utils::text::{category_name, contains_pattern, date_label, lookup_key, lookup_key_with_and};

const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";

/// Category link of a product that also sits in the category being deleted
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct CategoryLink {
    pub product_id: Uuid,
    pub category_id: Uuid,
}

/// Products that would be left without any category once `deleted` goes away
pub fn orphaned_products(links: &[CategoryLink], deleted: Uuid) -> Vec<Uuid> {
    let mut in_deleted: Vec<Uuid> = Vec::new();
    let mut elsewhere: HashSet<Uuid> = HashSet::new();

    for link in links {
        if link.category_id == deleted {
            if !in_deleted.contains(&link.product_id) {
                in_deleted.push(link.product_id);
            }
        } else {
            elsewhere.insert(link.product_id);
        }
    }

    in_deleted
        .into_iter()
        .filter(|id| !elsewhere.contains(id))
        .collect()
}

/// Normalised name for a create or rename. `Uncategorized` is reserved in any case.
fn assignable_name(raw_name: &str) -> ApiResult<String> {
    let name = category_name(raw_name);
    if name.is_empty() {
        return Err(ApiError::bad_request("Category name is required"));
    }
    if name.eq_ignore_ascii_case(UNCATEGORIZED) {
        return Err(ApiError::bad_request("Uncategorized is a reserved category name"));
    }
    Ok(name)
}

#[derive(Clone)]
pub struct CategoryService {
    pool: PgPool,
    media: MediaStore,
}

impl CategoryService {
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    pub async fn create(&self, raw_name: &str) -> ApiResult<Category> {
        let name = assignable_name(raw_name)?;

        let category = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&name)
        .fetch_one(&self.pool)
        .await?;

        info!(category_id = %category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn list(&self, page: PageRequest) -> ApiResult<CategoryPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, CategoryCountRow>(
            "SELECT c.id, c.name, c.created_at, c.updated_at,
                (SELECT COUNT(*) FROM product_categories pc WHERE pc.category_id = c.id) AS product_count,
                (SELECT COUNT(*) FROM sub_categories s WHERE s.category_id = c.id) AS sub_category_count
             FROM categories c
             ORDER BY c.created_at ASC
             LIMIT $1 OFFSET $2",
        )
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut subs = self.subcategories_by_parent(&ids).await?;

        let meta = page.meta(total);
        Ok(CategoryPage {
            categories: rows
                .into_iter()
                .map(|row| {
                    let children = subs.remove(&row.id).unwrap_or_default();
                    row.into_overview(children)
                })
                .collect(),
            total_categories: total,
            total_pages: meta.total_pages,
            current_page: meta.current_page,
            has_next_page: meta.has_next_page,
            has_prev_page: meta.has_prev_page,
        })
    }

    async fn subcategories_by_parent(
        &self,
        category_ids: &[Uuid],
    ) -> ApiResult<HashMap<Uuid, Vec<SubCategorySummary>>> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, SubCategorySummary>(
            "SELECT id, name, image, category_id, created_at
             FROM sub_categories
             WHERE category_id = ANY($1)
             ORDER BY created_at ASC",
        )
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<SubCategorySummary>> = HashMap::new();
        for row in rows {
            grouped.entry(row.category_id).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn find(&self, id: Uuid) -> ApiResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))
    }

    pub async fn update(&self, id: Uuid, raw_name: &str) -> ApiResult<Category> {
        let name = assignable_name(raw_name)?;

        let existing = self.find(id).await?;
        if existing.is_uncategorized() {
            return Err(ApiError::bad_request("Cannot rename Uncategorized category"));
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(&name)
        .fetch_one(&self.pool)
        .await?;

        info!(category_id = %id, name = %category.name, "Category renamed");
        Ok(category)
    }

    /// Delete a category with its subcategories.
    ///
    /// Products whose only category was this one move to `Uncategorized`;
    /// products in other categories just lose the link. Subcategory images
    /// are removed from storage once the transaction has committed.
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = $1 FOR UPDATE",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

        if category.is_uncategorized() {
            return Err(ApiError::bad_request("Cannot delete Uncategorized category"));
        }

        let uncategorized: Uuid = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
            .bind(UNCATEGORIZED)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::internal("Uncategorized category not found"))?;

        let images: Vec<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT image FROM sub_categories WHERE category_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .flatten()
        .filter(|url| !url.trim().is_empty())
        .collect();

        sqlx::query(
            "DELETE FROM product_sub_categories
             WHERE sub_category_id IN (SELECT id FROM sub_categories WHERE category_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let links = sqlx::query_as::<_, CategoryLink>(
            "SELECT product_id, category_id FROM product_categories
             WHERE product_id IN (SELECT product_id FROM product_categories WHERE category_id = $1)",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let orphans = orphaned_products(&links, id);
        if !orphans.is_empty() {
            sqlx::query(
                "INSERT INTO product_categories (product_id, category_id)
                 SELECT product_id, $2 FROM UNNEST($1::uuid[]) AS product_id
                 ON CONFLICT DO NOTHING",
            )
            .bind(&orphans)
            .bind(uncategorized)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM product_categories WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed_subcategories = sqlx::query("DELETE FROM sub_categories WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            category_id = %id,
            name = %category.name,
            moved_to_uncategorized = orphans.len(),
            removed_subcategories,
            "Category deleted"
        );

        if !images.is_empty() {
            self.media.discard(&images).await;
        }
        Ok(())
    }

    pub async fn count(&self) -> ApiResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn creation_dates(&self) -> ApiResult<Vec<String>> {
        let dates: Vec<chrono::DateTime<chrono::Utc>> =
            sqlx::query_scalar("SELECT created_at FROM categories ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(dates.iter().map(date_label).collect())
    }

    /// Resolve a category from a URL term: exact match first, then contains
    async fn resolve(&self, term: &str) -> ApiResult<Option<Category>> {
        let key = lookup_key(term);

        let exact = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories
             WHERE LOWER(REPLACE(name, '-', ' ')) = $1
             ORDER BY created_at ASC
             LIMIT 1",
            CATEGORY_COLUMNS
        ))
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        if exact.is_some() {
            return Ok(exact);
        }

        let partial = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories
             WHERE LOWER(REPLACE(name, '-', ' ')) LIKE $1
             ORDER BY LENGTH(name), created_at
             LIMIT 1",
            CATEGORY_COLUMNS
        ))
        .bind(contains_pattern(&key))
        .fetch_optional(&self.pool)
        .await?;

        Ok(partial)
    }

    /// Products of the category named by `term`, newest first.
    ///
    /// A missing term or `all` selects every product. `None` when no category matches.
    pub async fn products(&self, term: Option<&str>, page: PageRequest) -> ApiResult<Option<ProductPage>> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());

        let category = match term {
            None => None,
            Some(t) if t.eq_ignore_ascii_case("all") => None,
            Some(t) => match self.resolve(t).await? {
                Some(category) => Some(category),
                None => return Ok(None),
            },
        };

        let (total, products): (i64, Vec<Product>) = match &category {
            Some(category) => {
                let total = sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT product_id) FROM product_categories WHERE category_id = $1",
                )
                .bind(category.id)
                .fetch_one(&self.pool)
                .await?;

                let products = sqlx::query_as::<_, Product>(&format!(
                    "SELECT {} FROM products p
                     WHERE EXISTS (
                        SELECT 1 FROM product_categories pc
                        WHERE pc.product_id = p.id AND pc.category_id = $1
                     )
                     ORDER BY p.created_at DESC
                     LIMIT $2 OFFSET $3",
                    PRODUCT_COLUMNS
                ))
                .bind(category.id)
                .bind(page.limit)
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await?;

                (total, products)
            }
            None => {
                let total = sqlx::query_scalar("SELECT COUNT(*) FROM products")
                    .fetch_one(&self.pool)
                    .await?;

                let products = sqlx::query_as::<_, Product>(&format!(
                    "SELECT {} FROM products p ORDER BY p.created_at DESC LIMIT $1 OFFSET $2",
                    PRODUCT_COLUMNS
                ))
                .bind(page.limit)
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await?;

                (total, products)
            }
        };

        let meta = page.meta(total);
        Ok(Some(ProductPage {
            products: load_details(&self.pool, products).await?,
            total_products: total,
            total_pages: meta.total_pages,
            current_page: meta.current_page,
        }))
    }

    /// Every category with its subcategories, or the first one matching `term`
    pub async fn with_subcategories(&self, term: Option<&str>) -> ApiResult<Vec<CategoryWithSubcategories>> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());

        let categories = match term {
            None => {
                sqlx::query_as::<_, Category>(&format!(
                    "SELECT {} FROM categories ORDER BY created_at ASC",
                    CATEGORY_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
            Some(t) => {
                let key = lookup_key_with_and(t);
                let found = sqlx::query_as::<_, Category>(&format!(
                    "SELECT {} FROM categories
                     WHERE LOWER(REPLACE(name, '-', ' ')) LIKE $1
                     ORDER BY created_at ASC
                     LIMIT 1",
                    CATEGORY_COLUMNS
                ))
                .bind(contains_pattern(&key))
                .fetch_optional(&self.pool)
                .await?;

                match found {
                    Some(category) => vec![category],
                    None => {
                        warn!(term = %t, "No category matched lookup");
                        return Err(ApiError::not_found("Category not found"));
                    }
                }
            }
        };

        let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
        let mut subs = self.subcategories_by_parent(&ids).await?;

        Ok(categories
            .into_iter()
            .map(|category| CategoryWithSubcategories {
                sub_categories: subs.remove(&category.id).unwrap_or_default(),
                category,
            })
            .collect())
    }

    /// Subcategories of the category with this name, ignoring case
    pub async fn subcategories_of(&self, name: &str) -> ApiResult<Vec<SubCategoryRef>> {
        let name = category_name(name);

        let category_id: Uuid = sqlx::query_scalar(
            "SELECT id FROM categories WHERE LOWER(name) = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(&name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

        let subcategories = sqlx::query_as::<_, SubCategoryRef>(
            "SELECT id, name, category_id FROM sub_categories
             WHERE category_id = $1
             ORDER BY created_at ASC",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subcategories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::services::storage::MockObjectStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_uncategorized_is_reserved_in_any_case() {
        for raw in ["Uncategorized", "uncategorized", "  UNCATEGORIZED "] {
            assert!(matches!(assignable_name(raw), Err(ApiError::BadRequest(_))), "{}", raw);
        }
        assert!(matches!(assignable_name("   "), Err(ApiError::BadRequest(_))));
        assert_eq!(assignable_name(" Pumps ").unwrap(), "pumps");
    }

    #[test]
    fn test_only_single_category_products_are_orphaned() {
        let deleted = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (only_here, shared, elsewhere) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let links = vec![
            CategoryLink { product_id: only_here, category_id: deleted },
            CategoryLink { product_id: shared, category_id: deleted },
            CategoryLink { product_id: shared, category_id: other },
            CategoryLink { product_id: elsewhere, category_id: other },
        ];

        assert_eq!(orphaned_products(&links, deleted), vec![only_here]);
    }

    #[test]
    fn test_no_links_no_orphans() {
        assert!(orphaned_products(&[], Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_duplicate_links_reported_once() {
        let deleted = Uuid::new_v4();
        let product = Uuid::new_v4();
        let links = vec![
            CategoryLink { product_id: product, category_id: deleted },
            CategoryLink { product_id: product, category_id: deleted },
        ];
        assert_eq!(orphaned_products(&links, deleted), vec![product]);
    }

    async fn insert_product(pool: &PgPool, slug: &str, categories: &[Uuid]) -> Uuid {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO products (title, image, slug) VALUES ($1, '/p.jpg', $1) RETURNING id",
        )
        .bind(slug)
        .fetch_one(pool)
        .await
        .unwrap();

        for category_id in categories {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(id)
                .bind(category_id)
                .execute(pool)
                .await
                .unwrap();
        }
        id
    }

    async fn categories_of(pool: &PgPool, product_id: Uuid) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT c.name FROM product_categories pc
             JOIN categories c ON c.id = pc.category_id
             WHERE pc.product_id = $1
             ORDER BY c.name",
        )
        .bind(product_id)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_delete_moves_orphans_to_uncategorized(pool: PgPool) {
        let mut store = MockObjectStore::new();
        store
            .expect_delete_object()
            .withf(|key| key == "uploads/1-centrifugal.jpg")
            .times(1)
            .returning(|_| Ok(()));
        let media = MediaStore::new(Arc::new(store), &StorageConfig::default());
        let service = CategoryService::new(pool.clone(), media.clone());

        let pumps = service.create("Pumps").await.unwrap();
        let valves = service.create("Valves").await.unwrap();
        let only_pumps = insert_product(&pool, "monoblock-pump", &[pumps.id]).await;
        let both = insert_product(&pool, "pump-valve-kit", &[pumps.id, valves.id]).await;

        let subcategory: Uuid = sqlx::query_scalar(
            "INSERT INTO sub_categories (name, image, category_id) VALUES ('centrifugal', $1, $2)
             RETURNING id",
        )
        .bind(media.public_url("uploads/1-centrifugal.jpg"))
        .bind(pumps.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO product_sub_categories (product_id, sub_category_id) VALUES ($1, $2)")
            .bind(only_pumps)
            .bind(subcategory)
            .execute(&pool)
            .await
            .unwrap();

        service.delete(pumps.id).await.unwrap();

        assert_eq!(categories_of(&pool, only_pumps).await, vec![UNCATEGORIZED.to_string()]);
        assert_eq!(categories_of(&pool, both).await, vec!["valves".to_string()]);

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_sub_categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        let subcategories: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sub_categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((links, subcategories), (0, 0));
        assert!(matches!(service.find(pumps.id).await, Err(ApiError::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn test_uncategorized_cannot_be_deleted_or_duplicated(pool: PgPool) {
        let media = MediaStore::new(Arc::new(MockObjectStore::new()), &StorageConfig::default());
        let service = CategoryService::new(pool.clone(), media);

        let uncategorized: Uuid = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
            .bind(UNCATEGORIZED)
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(matches!(service.delete(uncategorized).await, Err(ApiError::BadRequest(_))));
        assert!(matches!(service.create("UNCATEGORIZED").await, Err(ApiError::BadRequest(_))));

        let total = service.count().await.unwrap();
        assert_eq!(total, 1);
    }
}
