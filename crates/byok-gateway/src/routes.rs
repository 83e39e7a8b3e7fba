//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);
    let cors = cors_layer(&state);

    Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))
        // Consent endpoints
        .route("/api/consent/token", post(handlers::issue_token))
        .route("/api/consent/validate", post(handlers::validate_token))
        .route("/api/consent/revoke", post(handlers::revoke_token))
        // Trust link endpoints
        .route("/api/trust-links", post(handlers::create_trust_link))
        .route("/api/trust-links/verify", post(handlers::verify_trust_link))
        // World model endpoints
        .route(
            "/api/world-model/attributes",
            post(handlers::store_attribute).get(handlers::get_attributes),
        )
        .route(
            "/api/world-model/attributes/{domain}/{attribute_key}",
            delete(handlers::delete_attribute),
        )
        .route("/api/world-model/metadata", get(handlers::get_metadata))
        .route("/api/world-model/index", get(handlers::get_index))
        // Apply middleware (last added runs first)
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let config = &state.config;
    if !config.cors_enabled {
        return CorsLayer::new();
    }

    let origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
