pub mod auth;
pub mod groups;
pub mod middleware;
pub mod parts;
pub mod protocol;
pub mod rest;
pub mod seo;
pub mod state;
pub mod ws_handler;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use middleware::{optional_auth, require_auth};
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the complete application router: public, optionally-authenticated
/// and protected routes plus the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/stats", get(rest::stats_handler))
        .route("/ws", get(ws_handler))
        .route("/sitemap.xml", get(seo::sitemap_handler))
        .route("/robots.txt", get(seo::robots_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/groups/{id}", get(groups::get_group_handler));

    // Routes that serve anonymous visitors differently
    let optional_routes = Router::new()
        .route("/groups", get(groups::list_groups_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/groups", post(groups::create_group_handler))
        .route("/groups/counts", get(groups::group_counts_handler))
        .route("/groups/{id}", axum::routing::put(groups::update_group_handler))
        .route("/groups/{id}/members", post(groups::join_group_handler))
        .route("/groups/{id}/members/admin", post(groups::toggle_admin_handler))
        .route("/groups/{id}/parts", post(parts::request_part_handler))
        .route("/groups/{id}/parts/{part}", delete(parts::abandon_part_handler))
        .route("/groups/{id}/parts/{part}/finish", post(parts::finish_part_handler))
        .route("/maintenance/sweep", post(parts::sweep_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi()))
}
