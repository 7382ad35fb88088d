//! Postgres-backed users collection.
//!
//! Postgres is used as a document store: each user is one row with its
//! identity, email and timestamps as columns, and everything else (`name` plus
//! the open-ended profile) in a `JSONB` document.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `DuplicateEmail` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut / PoolClosed / Io / Tls | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |
//!
//! ## Internal version
//!
//! The `version` column counts updates to a row. It is bookkeeping for the
//! store only and never leaves this module.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use userhub_core::{Email, User, UserId, UserPatch};

use super::{StoreError, UserStore};

/// How long a request waits for a pooled connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Postgres-backed document store for users.
///
/// ## Thread Safety
///
/// `PgPool` is internally reference counted and safe to share; cloning the
/// store is cheap.
///
/// ## Uniqueness
///
/// A unique index on `email` is the real guarantee. Concurrent inserts or
/// updates that race past a handler's pre-check fail with `23505`, mapped to
/// `StoreError::DuplicateEmail`.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

/// JSONB payload: every user attribute that is not a column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(flatten)]
    profile: Map<String, Value>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    document: Json<UserDocument>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let UserDocument { name, profile } = self.document.0;
        let email = Email::parse(self.email)
            .map_err(|e| StoreError::Backend(format!("stored row {} is corrupt: {e}", self.id)))?;

        Ok(User {
            id: UserId::from_uuid(self.id),
            email,
            name,
            profile,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn document_of(user: &User) -> Json<UserDocument> {
    Json(UserDocument {
        name: user.name.clone(),
        profile: user.profile.clone(),
    })
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a store over a lazily connected pool.
    ///
    /// No connection is attempted here: the first query (or
    /// [`ensure_schema`](Self::ensure_schema)) opens one. Only a malformed URL
    /// fails.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy(database_url)
            .map_err(|e| map_sqlx_error("connect_lazy", e))?;
        Ok(Self::new(pool))
    }

    /// Create the users collection and its unique email index if missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id          UUID PRIMARY KEY,
                email       TEXT NOT NULL,
                document    JSONB NOT NULL DEFAULT '{}'::jsonb,
                version     BIGINT NOT NULL DEFAULT 0,
                created_at  TIMESTAMPTZ NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email)")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS users_created_at_idx ON users (created_at, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, document, created_at, updated_at
            FROM users
            ORDER BY created_at ASC, id ASC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_page", e))?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    #[instrument(skip(self), err)]
    async fn count(&self) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;

        Ok(u64::try_from(total).unwrap_or(0))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, document, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.map(UserRow::into_user).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn find_by_email(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, document, created_at, updated_at
            FROM users
            WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(excluding.map(Uuid::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.map(UserRow::into_user).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, document, version, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING id, email, document, created_at, updated_at
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(document_of(&user))
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        row.into_user()
    }

    #[instrument(skip(self, patch), fields(user_id = %id), err)]
    async fn update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update", e))?;

        let current: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, document, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        let Some(current) = current else {
            return Ok(None);
        };

        // Validation failures drop `tx`, which rolls back.
        let next = patch.apply_to(&current.into_user()?, now)?;

        let row: UserRow = sqlx::query_as(
            r#"
            UPDATE users
            SET email = $2,
                document = $3,
                version = version + 1,
                updated_at = $4
            WHERE id = $1
            RETURNING id, email, document, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(next.email.as_str())
        .bind(document_of(&next))
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("update", e))?;

        row.into_user().map(Some)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::DuplicateEmail,
            _ => StoreError::Backend(format!(
                "database error in {}: {}",
                operation,
                db_err.message()
            )),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => {
            StoreError::Unavailable(format!("{} failed: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_keeps_name_and_profile_only() {
        let doc = UserDocument {
            name: Some("Alice".to_string()),
            profile: json!({"city": "Oslo"}).as_object().cloned().unwrap(),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({"name": "Alice", "city": "Oslo"}));
    }

    #[test]
    fn row_maps_to_user_without_version() {
        let now = Utc::now();
        let id = Uuid::now_v7();
        let row = UserRow {
            id,
            email: "a@x.com".to_string(),
            document: Json(UserDocument {
                name: None,
                profile: json!({"age": 30}).as_object().cloned().unwrap(),
            }),
            created_at: now,
            updated_at: now,
        };

        let user = row.into_user().unwrap();
        assert_eq!(user.id, UserId::from_uuid(id));
        assert_eq!(user.email, Email::parse("a@x.com").unwrap());
        assert_eq!(user.profile.get("age"), Some(&json!(30)));

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("version").is_none());
    }

    #[tokio::test]
    async fn lazy_pool_rejects_malformed_url() {
        let err = PostgresUserStore::connect_lazy("not a url", 1).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_) | StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_database_is_reported_as_unavailable() {
        // Port 1 on localhost refuses connections.
        let store = PostgresUserStore::connect_lazy("postgres://u:p@127.0.0.1:1/db", 1).unwrap();
        let err = store.count().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "got {err:?}");
    }
}
