pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{docs::ApiDoc, middleware as auth_middleware, state::AppState};

/// Builds the full application: public, signed-in and admin routes plus shared layers.
pub fn build_router(state: AppState) -> Router {
    // Build public routes (no auth)
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route(
            "/api/auth/oauth/{provider}/url",
            get(handlers::auth::oauth_authorization_url),
        )
        .route(
            "/api/auth/oauth/{provider}/sign-in",
            post(handlers::auth::oauth_sign_in),
        )
        .route("/api/auth/link/confirm", post(handlers::auth::confirm_link))
        .route(
            "/api/auth/password-reset",
            post(handlers::password_reset::request_password_reset),
        )
        .route(
            "/api/auth/password-reset/{token}",
            get(handlers::password_reset::verify_password_reset),
        )
        .route(
            "/api/auth/password-reset/confirm",
            post(handlers::password_reset::reset_password),
        )
        .route("/api/books", get(handlers::books::list_books))
        .route("/api/books/{id}", get(handlers::books::get_book))
        .route("/api/opinions", get(handlers::opinions::list_opinions))
        .route(
            "/api/opinions/stream",
            get(handlers::opinions::stream_opinions),
        )
        .route("/api/opinions/{id}", get(handlers::opinions::get_opinion));

    // Build user-protected routes (auth required)
    let user_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/change-password",
            put(handlers::auth::change_password),
        )
        .route("/api/accounts/me", get(handlers::accounts::me))
        .route(
            "/api/accounts/me/methods/password",
            post(handlers::accounts::set_password),
        )
        .route(
            "/api/accounts/me/methods/{method}",
            post(handlers::accounts::link_provider).delete(handlers::accounts::unlink_method),
        )
        .route("/api/sessions/unload", post(handlers::sessions::unload))
        .route("/api/books", post(handlers::books::create_book))
        .route(
            "/api/books/{id}",
            put(handlers::books::update_book).delete(handlers::books::delete_book),
        )
        .route("/api/opinions", post(handlers::opinions::create_opinion))
        .route(
            "/api/opinions/{id}",
            put(handlers::opinions::update_opinion).delete(handlers::opinions::delete_opinion),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth,
        ));

    // Build admin-protected routes (auth + admin role)
    let admin_routes = Router::new()
        .route(
            "/api/admin/sessions",
            get(handlers::admin::list_sessions),
        )
        .route(
            "/api/admin/sessions/summary",
            get(handlers::admin::session_summary),
        )
        .route(
            "/api/admin/sessions/export",
            get(handlers::admin::export_session_log),
        )
        .route(
            "/api/admin/accounts/{id}/sessions",
            get(handlers::admin::account_sessions),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth_admin,
        ));

    let cors = cors_layer(&state.config.cors_allow_origins);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(auth_middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// Credentials (the access cookie) rule out a wildcard origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(24 * 60 * 60))
}
