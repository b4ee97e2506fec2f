use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::auth;
use crate::state::AppState;

/// Build the primary axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>, cors: &credgate_config::CorsConfig) -> Router {
    Router::new()
        .route(
            "/login",
            post(auth::login::login)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/update-login",
            post(auth::update_login::update_login)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Router used when the store endpoint or service credential is absent.
/// Auth routes stay registered but answer with the misconfigured error;
/// liveness keeps reporting OK so the process is not restarted for a
/// configuration problem.
pub fn build_degraded_router(cors: &credgate_config::CorsConfig) -> Router {
    Router::new()
        .route(
            "/login",
            post(misconfigured)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/update-login",
            post(misconfigured)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route("/health", get(health_handler))
        .route(
            "/ready",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "store not configured") }),
        )
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(cfg: &credgate_config::CorsConfig) -> CorsLayer {
    if cfg.allow_all_origins || cfg.allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Pre-flight requests short-circuit with a success status and no body.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn misconfigured() -> ApiError {
    ApiError::Misconfigured
}

async fn health_handler() -> impl IntoResponse {
    // Liveness: always return 200 OK when process is alive.
    (StatusCode::OK, "OK")
}

async fn ready_handler() -> impl IntoResponse {
    // Readiness: the degraded router overrides this with a 503.
    (StatusCode::OK, "OK")
}
