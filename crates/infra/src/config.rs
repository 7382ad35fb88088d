//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Parsing is lenient: a missing,
//! malformed or non-positive value falls back to its default and is reported
//! at `warn` level, so a typo never prevents the service from starting.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 900_000;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 100;
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Deployment environment; only affects log formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "test" => Some(Self::Test),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl core::fmt::Display for Environment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub api_version: String,
    pub environment: Environment,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            api_version: DEFAULT_API_VERSION.to_string(),
            environment: Environment::default(),
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(raw) => Environment::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown environment; using development");
                Environment::Development
            }),
            None => defaults.environment,
        };

        let api_version = lookup("API_VERSION")
            .map(|v| v.trim().trim_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_version);

        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            port: positive(&lookup, "PORT", defaults.port),
            rate_limit_window: Duration::from_millis(positive(
                &lookup,
                "RATE_LIMIT_WINDOW_MS",
                DEFAULT_RATE_LIMIT_WINDOW_MS,
            )),
            rate_limit_max: positive(&lookup, "RATE_LIMIT_MAX", defaults.rate_limit_max),
            api_version,
            environment,
            database_url,
            database_max_connections: positive(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
        }
    }

    /// Mount point of the users resource, e.g. `/api/v1/users`.
    pub fn users_base_path(&self) -> String {
        format!("/api/{}/users", self.api_version)
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: core::str::FromStr + PartialEq + Default + Copy + core::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => v,
        _ => {
            tracing::warn!(key, value = %raw, %default, "invalid config value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = load(&[]);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.rate_limit_window, Duration::from_millis(900_000));
        assert_eq!(cfg.rate_limit_max, 100);
        assert_eq!(cfg.users_base_path(), "/api/v1/users");
    }

    #[test]
    fn reads_all_recognized_options() {
        let cfg = load(&[
            ("PORT", "8081"),
            ("RATE_LIMIT_WINDOW_MS", "60000"),
            ("RATE_LIMIT_MAX", "5"),
            ("API_VERSION", "v2"),
            ("NODE_ENV", "production"),
            ("DATABASE_URL", "postgres://localhost/users"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]);

        assert_eq!(cfg.port, 8081);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(60));
        assert_eq!(cfg.rate_limit_max, 5);
        assert_eq!(cfg.users_base_path(), "/api/v2/users");
        assert!(cfg.environment.is_production());
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/users"));
        assert_eq!(cfg.database_max_connections, 12);
    }

    #[test]
    fn invalid_and_zero_values_fall_back() {
        let cfg = load(&[
            ("PORT", "eighty"),
            ("RATE_LIMIT_MAX", "0"),
            ("RATE_LIMIT_WINDOW_MS", "-1"),
            ("API_VERSION", "  "),
            ("DATABASE_URL", ""),
        ]);

        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.rate_limit_max, DEFAULT_RATE_LIMIT_MAX);
        assert_eq!(cfg.rate_limit_window, Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS));
        assert_eq!(cfg.api_version, DEFAULT_API_VERSION);
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn app_env_wins_over_node_env() {
        let cfg = load(&[("APP_ENV", "test"), ("NODE_ENV", "production")]);
        assert_eq!(cfg.environment, Environment::Test);
    }
}
