//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `STORE_HUB_API_URL` - REST backend base URL (default: <https://fakestoreapi.com>)
//! - `STORE_HUB_DATA_DIR` - Directory holding durable client storage (default: `.store-hub`)
//! - `STORE_HUB_CATALOG_TTL_SECS` - Catalog cache time-to-live in seconds (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://fakestoreapi.com";
const DEFAULT_DATA_DIR: &str = ".store-hub";
const DEFAULT_CATALOG_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// REST backend configuration
    pub api: ApiConfig,
    /// Directory of the durable key-value file
    pub data_dir: PathBuf,
    /// How long the memoized catalog is served before re-fetching
    pub catalog_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
}

/// REST backend configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every resource path is appended to.
    pub base_url: Url,
}

impl ApiConfig {
    /// Backend configuration for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("STORE_HUB_API_URL", base_url)?,
        })
    }

    /// Absolute URL of a resource path such as `/products/3`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = get("STORE_HUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api = ApiConfig {
            base_url: parse_base_url("STORE_HUB_API_URL", &api_url)?,
        };

        let data_dir = get("STORE_HUB_DATA_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let catalog_ttl = match get("STORE_HUB_CATALOG_TTL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("STORE_HUB_CATALOG_TTL_SECS".to_string(), e.to_string())
            })?,
            None => DEFAULT_CATALOG_TTL_SECS,
        };

        Ok(Self {
            api,
            data_dir,
            catalog_ttl: Duration::from_secs(catalog_ttl),
            sentry_dsn: get("SENTRY_DSN").filter(|v| !v.is_empty()),
            sentry_environment: get("SENTRY_ENVIRONMENT").filter(|v| !v.is_empty()),
        })
    }

    /// Defaults for everything except the backend URL and storage directory.
    #[must_use]
    pub fn new(api: ApiConfig, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            data_dir: data_dir.into(),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

fn parse_base_url(var_name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}
