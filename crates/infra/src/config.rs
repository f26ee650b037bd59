//! Process configuration read from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

/// Which repository backend to wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Prefix of the `X-<app>-alert` response headers.
    pub app_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            backend: StoreBackend::InMemory,
            default_page_size: 20,
            max_page_size: 200,
            app_name: "austinApp".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, after merging a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup. Unset variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = parse_or("BIND_ADDR", &lookup, defaults.bind_addr)?;
        let persistent = parse_or("USE_PERSISTENT_STORES", &lookup, false)?;
        let backend = if persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory
        };

        let default_page_size = parse_or("DEFAULT_PAGE_SIZE", &lookup, defaults.default_page_size)?;
        let max_page_size = parse_or("MAX_PAGE_SIZE", &lookup, defaults.max_page_size)?;
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(ConfigError::Invalid {
                name: "DEFAULT_PAGE_SIZE",
                value: default_page_size.to_string(),
                reason: format!("must be between 1 and MAX_PAGE_SIZE ({max_page_size})"),
            });
        }

        let app_name = lookup("APP_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.app_name);

        Ok(Self {
            bind_addr,
            backend,
            default_page_size,
            max_page_size,
            app_name,
        })
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        }
    }
}
