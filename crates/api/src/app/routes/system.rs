use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::errors::ApiError;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Liveness probe; never touches storage.
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "OK",
        timestamp: Utc::now(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
