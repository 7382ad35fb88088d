//! Infrastructure layer: storage backends and configuration.

pub mod config;
pub mod store;

pub use config::{AppConfig, Environment};
pub use store::{InMemoryUserStore, PostgresUserStore, StoreError, UserStore};
