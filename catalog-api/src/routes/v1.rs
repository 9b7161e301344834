use axum::{
    handler::Handler,
    middleware as axum_middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use std::{sync::Arc, time::Duration};

use crate::{
    handlers::{banners, categories, comments, leads, products, subcategories, users},
    middleware::{cache_response, invalidate_catalog, require_auth, CachePolicy},
    AppState,
};

const ONE_MINUTE: Duration = Duration::from_secs(60);
const TWO_MINUTES: Duration = Duration::from_secs(2 * 60);
const THREE_MINUTES: Duration = Duration::from_secs(3 * 60);

/// Create all routes for API v1
pub fn create_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/user", user_routes())
        .nest("/product", product_routes(state))
        .nest("/leads", lead_routes())
        .nest("/comments", comment_routes())
        .nest("/category", category_routes(state))
        .nest("/banner", banner_routes())
        .nest("/subcategory", subcategory_routes(state))
}

/// `GET` route whose successful responses are cached for `ttl`
fn cached<H, T>(state: &Arc<AppState>, ttl: Duration, handler: H) -> MethodRouter<Arc<AppState>>
where
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    get(handler).layer(axum_middleware::from_fn_with_state(
        CachePolicy::new(&state.cache, ttl),
        cache_response,
    ))
}

/// Writes anywhere in `router` drop the cached catalog responses
fn invalidating(state: &Arc<AppState>, router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    router.layer(axum_middleware::from_fn_with_state(
        state.cache.clone(),
        invalidate_catalog,
    ))
}

/// Authenticate before anything already layered on `route` runs
fn protected(state: &Arc<AppState>, route: MethodRouter<Arc<AppState>>) -> MethodRouter<Arc<AppState>> {
    route.layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/active-status",
            get(users::active_status).put(users::update_active_status),
        )
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh-token", post(users::refresh_token))
        .route("/logout", post(users::logout))
        .route("/get-user", get(users::get_user))
        .route("/check-auth", get(users::check_auth))
        .route("/create-role", post(users::create_role))
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/user-limit", get(users::user_limit))
        .route("/user-limit/:id", put(users::update_user_limit))
        .route("/change-password", put(users::change_password))
}

fn product_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let counters_ttl = Duration::from_secs(state.config.cache.default_ttl_seconds);

    let routes = Router::new()
        .route(
            "/",
            cached(state, TWO_MINUTES, products::list_products).post(products::create_product),
        )
        .route("/delete-image", post(products::delete_product_image))
        .route(
            "/search",
            protected(state, cached(state, ONE_MINUTE, products::search_products)),
        )
        .route(
            "/user-search",
            cached(state, ONE_MINUTE, products::user_search),
        )
        .route("/all", cached(state, THREE_MINUTES, products::all_products))
        .route(
            "/product-length",
            protected(state, cached(state, counters_ttl, products::product_length)),
        )
        .route(
            "/length-date",
            protected(state, cached(state, counters_ttl, products::product_length_date)),
        )
        .route(
            "/product/:slug",
            cached(state, TWO_MINUTES, products::product_by_slug),
        )
        .route(
            "/:slug",
            protected(state, cached(state, TWO_MINUTES, products::get_product))
                .put(products::update_product)
                .delete(products::delete_product),
        );

    invalidating(state, routes)
}

fn lead_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(leads::create_lead).get(leads::list_leads))
        .route("/recent", get(leads::recent_leads))
        .route("/all", get(leads::all_leads))
        .route("/leads-length", get(leads::leads_length))
        .route("/length-date", get(leads::leads_length_date))
        .route("/search", get(leads::search_leads))
        .route(
            "/:slug",
            get(leads::get_lead)
                .put(leads::update_lead)
                .delete(leads::delete_lead),
        )
}

fn comment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(comments::create_comment))
        .route("/lead/:lead_id", get(comments::lead_comments))
        .route(
            "/:id",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
}

fn category_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let routes = Router::new()
        .route(
            "/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/length", get(categories::categories_length))
        .route("/length-date", get(categories::categories_length_date))
        .route("/products", get(categories::category_products))
        .route("/with-subcategories", get(categories::with_subcategories))
        .route(
            "/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        // Same segment as `/:id`, so it must share the parameter name
        .route("/:id/subcategories", get(categories::category_subcategories));

    invalidating(state, routes)
}

fn banner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(banners::list_active))
        .route(
            "/banners",
            get(banners::list_banners).post(banners::create_banner),
        )
        .route(
            "/banners/:id",
            get(banners::get_banner)
                .put(banners::update_banner)
                .delete(banners::delete_banner),
        )
        .route("/banners/:id/position", put(banners::update_position))
        .route("/assign-positions", get(banners::assign_positions))
}

fn subcategory_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let routes = Router::new()
        .route("/products", get(subcategories::subcategory_products))
        .route("/by-category", get(subcategories::subcategories_by_category))
        .route("/info/:name", get(subcategories::subcategory_info))
        .route(
            "/",
            get(subcategories::list_subcategories).post(subcategories::create_subcategory),
        )
        .route(
            "/:id",
            get(subcategories::get_subcategory)
                .patch(subcategories::update_subcategory)
                .delete(subcategories::delete_subcategory),
        );

    invalidating(state, routes)
}
