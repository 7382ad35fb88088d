//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (user store selection, schema bootstrap)
//! - `routes/`: HTTP routes + handlers
//! - `envelope.rs`: the uniform response envelope
//! - `dto.rs`: request/response DTOs and extractors
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use userhub_infra::{AppConfig, StoreError};

use crate::middleware::{self, RateLimitState};

pub mod dto;
pub mod envelope;
pub mod errors;
pub mod routes;
pub mod services;

/// Largest accepted JSON body.
pub const BODY_LIMIT_BYTES: usize = 100 * 1024;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called from within a Tokio runtime (background tasks are spawned).
pub fn build_app(config: &AppConfig) -> Result<Router, StoreError> {
    let services = services::build_services(config)?;
    Ok(build_app_with_services(config, services))
}

/// Build the router around already constructed services.
pub fn build_app_with_services(config: &AppConfig, services: services::AppServices) -> Router {
    let rate_limit = RateLimitState::new(config.rate_limit_max, config.rate_limit_window);
    rate_limit.spawn_housekeeping();

    routes::router(&config.users_base_path())
        .layer(Extension(Arc::new(services)))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(errors::panic_response))
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    middleware::rate_limit_middleware,
                )),
        )
}
