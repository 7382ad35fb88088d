use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    routing::get,
    Router,
};
use chrono::Utc;

use userhub_core::{NewUser, User, UserId, UserPatch};

use crate::app::dto::{ApiJson, ListUsersQuery, UserList};
use crate::app::envelope::ApiResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

/// `PUT` and `PATCH` are both accepted for updates; both merge the given
/// fields onto the existing record.
pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<ApiResponse<UserList>, ApiError> {
    let request = query
        .map(|Query(q)| q.page_request())
        .unwrap_or_default();

    let users = services
        .store
        .find_page(request.offset(), request.limit())
        .await?;
    let total = services.store.count().await?;

    Ok(ApiResponse::success(UserList {
        users,
        pagination: request.describe(total),
    }))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<NewUser>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = body.into_user(UserId::new(), Utc::now())?;

    if services
        .store
        .find_by_email(user.email.as_str(), None)
        .await?
        .is_some()
    {
        return Err(ApiError::EmailExists);
    }

    let created = services.store.insert(user).await?;
    tracing::info!(user_id = %created.id, "user created");

    Ok(ApiResponse::with_status(
        created,
        StatusCode::CREATED,
        Some("User created successfully"),
    ))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<User>, ApiError> {
    let id: UserId = id.parse()?;

    match services.store.find_by_id(id).await? {
        Some(user) => Ok(ApiResponse::success(user)),
        None => Err(ApiError::UserNotFound),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> Result<ApiResponse<User>, ApiError> {
    let id: UserId = id.parse()?;

    if let Some(email) = patch.email() {
        if services.store.find_by_email(email, Some(id)).await?.is_some() {
            return Err(ApiError::EmailExists);
        }
    }

    let Some(updated) = services.store.update(id, &patch, Utc::now()).await? else {
        return Err(ApiError::UserNotFound);
    };
    tracing::info!(user_id = %updated.id, "user updated");

    Ok(ApiResponse::with_status(
        updated,
        StatusCode::OK,
        Some("User updated successfully"),
    ))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let id: UserId = id.parse()?;

    if !services.store.delete(id).await? {
        return Err(ApiError::UserNotFound);
    }
    tracing::info!(user_id = %id, "user deleted");

    Ok(ApiResponse::with_status(
        (),
        StatusCode::OK,
        Some("User deleted successfully"),
    ))
}
