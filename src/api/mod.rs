//! HTTP transport layer (§6). Thin handlers only: validation and side effects all live
//! in the [`crate::coordinator::UploadCoordinator`]; every handler here just translates
//! HTTP in and out.

pub mod cancel;
pub mod finalize;
pub mod health;
pub mod resume;
pub mod status;
pub mod upload_binary;
pub mod upload_chunk;

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::middleware::logging_middleware;

/// Assembles the full router (§6 HTTP surface table), grounded on the teacher's
/// `bootstrap::build_router` — `CorsLayer` from [`crate::config::CorsConfig`],
/// `TraceLayer` for span-per-request tracing, a body-size limit derived from
/// `max_chunk_size`, and the request-scoped [`logging_middleware`] on top.
pub fn router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors);
    let body_limit = state.config.storage.max_chunk_size as usize;

    Router::new()
        .route("/health", get(health::handle))
        .route("/upload", post(upload_chunk::handle))
        .route("/upload", get(status::handle_all))
        .route("/upload/binary", post(upload_binary::handle))
        .route("/upload/resumable", get(status::handle_resumable))
        .route("/upload/{id}/complete", post(finalize::handle))
        .route("/upload/{id}/resume", post(resume::handle))
        .route("/upload/{id}", get(status::handle_one))
        .route("/upload/{id}", delete(cancel::handle))
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn build_cors_layer(cors: &crate::config::CorsConfig) -> CorsLayer {
    let origin = if cors.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(methods)
        .max_age(Duration::from_secs(cors.max_age_secs));

    if cors.allowed_headers.iter().any(|h| h == "*") {
        layer = layer.allow_headers(tower_http::cors::Any);
    } else {
        let headers: Vec<HeaderName> = cors
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        layer = layer.allow_headers(headers);
    }

    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}
