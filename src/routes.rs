//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod auth;
mod users;

pub use users::INITIALIZE_OWNER_HEADER;

use crate::auth::require_auth;
use crate::config::CorsConfig;
use crate::state::SharedState;
use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, cors: &CorsConfig) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(cors);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let layers = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Bearer-protected routes
    let protected = Router::new()
        .route("/current_user/me", get(auth::me))
        .route("/users/create", post(users::create_user))
        .route("/users/edit/{user_id}", put(users::update_user))
        .route("/users/delete/{user_id}", delete(users::delete_user))
        .route("/users/list", get(users::list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Token lifecycle
        .route("/user_auth/token", post(auth::login))
        .route("/user_auth/refresh-token", post(auth::refresh))
        .route("/user_auth/logout", post(auth::logout))

        // Owner bootstrap (shared-secret header)
        .route("/users/initialize_owner", post(users::initialize_owner))

        .merge(protected)

        // Apply middleware and state
        .layer(layers)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    layer
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(INITIALIZE_OWNER_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
