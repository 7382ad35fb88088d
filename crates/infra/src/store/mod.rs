//! User storage boundary.
//!
//! `UserStore` is the single persistence seam of the service: one collection
//! of user documents, with email uniqueness enforced by the backend itself.
//! Handlers may pre-check uniqueness for a friendlier fast path, but only the
//! store's own constraint is authoritative (a concurrent insert that slips past
//! the pre-check comes back as [`StoreError::DuplicateEmail`]).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use userhub_core::{DomainError, User, UserId, UserPatch};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;

/// Storage operation error.
///
/// These are **infrastructure errors** except for `DuplicateEmail` and
/// `Validation`, which surface domain rules the store enforces atomically.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique email constraint rejected the write.
    #[error("email already in use")]
    DuplicateEmail,

    /// A merged update failed field validation; nothing was written.
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// The backend could not be reached (pool timeout, connection refused, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Persistence operations over the users collection.
///
/// Listing order is creation order; `find_page` and `count` are separate calls,
/// so a page and its total are not a consistent snapshot.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Up to `limit` users, skipping the first `offset`.
    async fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError>;

    /// Number of users in the collection.
    async fn count(&self) -> Result<u64, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Exact-match email lookup, optionally ignoring one record.
    async fn find_by_email(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, StoreError>;

    /// Insert a fully validated record.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Merge `patch` onto the record `id` and persist the validated result.
    ///
    /// Returns `Ok(None)` when no record has that id.
    async fn update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Remove the record; `false` when nothing matched.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        (**self).find_page(offset, limit).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        (**self).count().await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email, excluding).await
    }

    async fn insert(&self, user: User) -> Result<User, StoreError> {
        (**self).insert(user).await
    }

    async fn update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        (**self).update(id, patch, now).await
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }
}
