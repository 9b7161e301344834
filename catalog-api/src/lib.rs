//! Admin backend for a B2B product catalog
//!
//! Serves the dashboard and storefront JSON API under `/api/v1`: catalog
//! (categories, subcategories, products), leads with comments, homepage
//! banners and dashboard users.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use sqlx::PgPool;
use std::sync::Arc;

use config::AppConfig;
use middleware::ResponseCache;
use services::{
    AuthService, BannerService, CategoryService, CommentService, LeadService, MediaStore,
    ObjectStore, ProductService, SubCategoryService, UserService,
};

pub use routes::create_router;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: PgPool,
    pub auth: Arc<AuthService>,
    pub media: MediaStore,
    pub cache: ResponseCache,
    pub users: UserService,
    pub categories: CategoryService,
    pub subcategories: SubCategoryService,
    pub products: ProductService,
    pub leads: LeadService,
    pub comments: CommentService,
    pub banners: BannerService,
}

impl AppState {
    pub fn new(config: AppConfig, db: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        let auth = Arc::new(AuthService::new(config.auth.clone()));
        let media = MediaStore::new(store, &config.storage);
        let cache = ResponseCache::new(config.cache.enabled);

        Self {
            users: UserService::new(db.clone(), auth.clone()),
            categories: CategoryService::new(db.clone(), media.clone()),
            subcategories: SubCategoryService::new(db.clone(), media.clone()),
            products: ProductService::new(db.clone(), media.clone()),
            leads: LeadService::new(db.clone()),
            comments: CommentService::new(db.clone()),
            banners: BannerService::new(db.clone(), media.clone()),
            config: Arc::new(config),
            db,
            auth,
            media,
            cache,
        }
    }
}
