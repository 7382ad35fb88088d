use axum::{routing::get, Router};

pub mod system;
pub mod users;

/// Full route tree: health at the root, users under the versioned prefix.
pub fn router(users_base_path: &str) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest(users_base_path, users::router())
        .fallback(system::not_found)
}
