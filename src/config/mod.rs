//! Environment-driven server configuration.

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// `production` (any case) selects production; anything else, or unset, is development.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var("APP_ENV").ok().as_deref())
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Environment::Production => "api_kit=info,info",
            Environment::Development => "api_kit=debug,info",
        }
    }
}

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Process environment, read from `APP_ENV` on first use.
pub fn environment() -> Environment {
    *ENVIRONMENT.get_or_init(Environment::from_env)
}

pub fn is_production() -> bool {
    environment() == Environment::Production
}

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub body_limit: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind.clone(),
        })?;
        let body_limit = match get("BODY_LIMIT_BYTES") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "BODY_LIMIT_BYTES",
                value: v.clone(),
            })?,
            None => DEFAULT_BODY_LIMIT,
        };
        let cors_origins = get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(ServerConfig {
            database_url: get("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            bind_addr,
            environment: Environment::parse(get("APP_ENV").as_deref()),
            body_limit,
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.body_limit, DEFAULT_BODY_LIMIT);
        assert!(cfg.database_url.is_none());
        assert!(cfg.cors_origins.is_empty());
    }

    #[test]
    fn reads_every_key() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("APP_ENV", "Production"),
            ("BODY_LIMIT_BYTES", "1024"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("DATABASE_URL", "postgres://localhost/app"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.environment, Environment::Production);
        assert_eq!(cfg.body_limit, 1024);
        assert_eq!(cfg.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/app"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("BODY_LIMIT_BYTES", "lots")])).is_err());
    }

    #[test]
    fn log_filter_follows_environment() {
        assert!(Environment::Production.default_log_filter().contains("api_kit=info"));
        assert!(Environment::Development.default_log_filter().contains("api_kit=debug"));
    }
}
