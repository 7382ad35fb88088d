//! `userhub-core` — domain building blocks for the user directory.
//!
//! This crate contains **pure domain** types (no infrastructure concerns):
//! identifiers, the `User` record and its validation rules, and pagination math.

pub mod error;
pub mod id;
pub mod pagination;
pub mod user;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use pagination::{PageInfo, PageRequest};
pub use user::{Email, NewUser, User, UserPatch};
