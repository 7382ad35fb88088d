use std::sync::RwLock;

use chrono::{DateTime, Utc};

use userhub_core::{User, UserId, UserPatch};

use super::{StoreError, UserStore};

/// In-memory users collection.
///
/// Intended for tests/dev. Records are kept in insertion order and every
/// lookup is a linear scan. The email uniqueness check and the write happen
/// under one write lock, so the constraint holds under concurrency.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(users.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.len() as u64)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
        excluding: Option<UserId>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| Self::poisoned())?;
        Ok(users
            .iter()
            .find(|u| u.email.as_str() == email && Some(u.id) != excluding)
            .cloned())
    }

    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Backend(format!("duplicate id {}", user.id)));
        }

        users.push(user.clone());
        Ok(user)
    }

    async fn update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;

        let Some(idx) = users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };

        let next = patch.apply_to(&users[idx], now)?;
        if users.iter().any(|u| u.id != id && u.email == next.email) {
            return Err(StoreError::DuplicateEmail);
        }

        users[idx] = next.clone();
        Ok(Some(next))
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut users = self.users.write().map_err(|_| Self::poisoned())?;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}
