//! User record and its field rules.
//!
//! A user has a small typed core (`id`, `email`, `name`, timestamps) plus an
//! open-ended profile: any other JSON field a client sends is kept as an opaque
//! extension and flattened back into the record's JSON form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Longest accepted email address (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Keys owned by the service; clients cannot set them.
const RESERVED_KEYS: &[&str] = &["id", "_id", "__v", "version", "createdAt", "updatedAt"];

// ─────────────────────────────────────────────────────────────────────────────
// Email
// ─────────────────────────────────────────────────────────────────────────────

/// A syntactically valid email address.
///
/// Comparison is exact: no case folding or trimming is applied, so uniqueness
/// checks match the stored value byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(DomainError::validation("email is required"));
        }
        if raw.len() > MAX_EMAIL_LEN {
            return Err(DomainError::validation(format!(
                "email must be at most {MAX_EMAIL_LEN} characters"
            )));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("email must not contain whitespace"));
        }

        let mut parts = raw.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::validation("email must contain exactly one '@'"));
        };
        if local.is_empty() || domain.is_empty() || domain.split('.').any(str::is_empty) {
            return Err(DomainError::validation(format!("'{raw}' is not a valid email")));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user record as exposed over the API.
///
/// Storage-internal bookkeeping (such as a document version counter) is never
/// part of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create payload: `email` is required, everything else is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl NewUser {
    /// Validate the payload and turn it into a record with the given identity.
    pub fn into_user(self, id: UserId, now: DateTime<Utc>) -> DomainResult<User> {
        let email = Email::parse(self.email)?;
        validate_name(self.name.as_deref())?;

        let profile = self
            .profile
            .into_iter()
            .filter(|(k, _)| !is_reserved(k))
            .collect();

        Ok(User {
            id,
            email,
            name: self.name,
            profile,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update: a JSON object whose keys are merged onto an existing record.
///
/// - `email` must be a string;
/// - `name` may be a string or `null` (clears it);
/// - reserved keys are ignored;
/// - any other key sets a profile field, and `null` removes it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct UserPatch(Map<String, Value>);

impl UserPatch {
    /// The email this patch would set, when it carries one as a string.
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// Merge onto `user`, validating the merged result.
    ///
    /// Returns the would-be record; `user` itself is left untouched so callers
    /// only persist when the merge succeeds.
    pub fn apply_to(&self, user: &User, now: DateTime<Utc>) -> DomainResult<User> {
        let mut next = user.clone();

        for (key, value) in &self.0 {
            match key.as_str() {
                "email" => match value {
                    Value::String(raw) => next.email = Email::parse(raw.clone())?,
                    _ => return Err(DomainError::validation("email must be a string")),
                },
                "name" => match value {
                    Value::Null => next.name = None,
                    Value::String(name) => next.name = Some(name.clone()),
                    _ => return Err(DomainError::validation("name must be a string or null")),
                },
                k if is_reserved(k) => {}
                _ if value.is_null() => {
                    next.profile.remove(key);
                }
                _ => {
                    next.profile.insert(key.clone(), value.clone());
                }
            }
        }

        validate_name(next.name.as_deref())?;
        next.updated_at = now;
        Ok(next)
    }
}

fn validate_name(name: Option<&str>) -> DomainResult<()> {
    let Some(name) = name else {
        return Ok(());
    };
    if name.trim().is_empty() {
        return Err(DomainError::validation("name must not be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}
