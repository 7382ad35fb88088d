//! Infrastructure wiring: picks and connects the user store.

use std::sync::Arc;
use std::time::Duration;

use userhub_infra::{AppConfig, InMemoryUserStore, PostgresUserStore, StoreError, UserStore};

/// Attempts made by the background schema bootstrap before giving up.
const SCHEMA_BOOTSTRAP_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubled after each failure.
const SCHEMA_BOOTSTRAP_BACKOFF: Duration = Duration::from_millis(500);

/// Shared, request-independent services.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn UserStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Dev/test wiring: everything in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryUserStore::new()))
    }
}

/// Build services from configuration.
///
/// With `DATABASE_URL` set, the Postgres store is created over a lazy pool and
/// its schema is bootstrapped in the background: startup never waits on the
/// database, and storage-backed requests fail with 500 until it is reachable.
/// Without it, an in-memory store is used.
pub fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory user store (data is lost on restart)");
        return Ok(AppServices::in_memory());
    };

    let store = PostgresUserStore::connect_lazy(url, config.database_max_connections)?;
    spawn_schema_bootstrap(store.clone());

    Ok(AppServices::new(Arc::new(store)))
}

fn spawn_schema_bootstrap(store: PostgresUserStore) {
    tokio::spawn(async move {
        let mut backoff = SCHEMA_BOOTSTRAP_BACKOFF;
        for attempt in 1..=SCHEMA_BOOTSTRAP_ATTEMPTS {
            match store.ensure_schema().await {
                Ok(()) => {
                    tracing::info!(attempt, "user store connected");
                    return;
                }
                Err(e) if attempt < SCHEMA_BOOTSTRAP_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, retry_in = ?backoff, "user store not ready");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "giving up on user store bootstrap; requests will fail until it is reachable");
                }
            }
        }
    });
}
