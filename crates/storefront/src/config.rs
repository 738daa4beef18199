//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `TSHOP_API_BASE_URL` - API base URL (default: `https://mytshop.runasp.net/api/`)
//! - `TSHOP_API_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
//! - `TSHOP_DATA_DIR` - Directory holding the persisted token, role and cart (default: `.tshop`)
//! - `TSHOP_QUERY_RETRY_DELAY_MS` - Delay between query retries (default: 500)
//! - `TSHOP_CACHE_CAPACITY` - Maximum cached query results (default: 1000)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://mytshop.runasp.net/api/";
const DEFAULT_TIMEOUT_SECS: &str = "10";
const DEFAULT_DATA_DIR: &str = ".tshop";
const DEFAULT_RETRY_DELAY_MS: &str = "500";
const DEFAULT_CACHE_CAPACITY: &str = "1000";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// API base URL, always ending in `/` so endpoint paths join beneath it
    pub api_base_url: Url,
    /// Timeout applied to every API request
    pub request_timeout: Duration,
    /// Directory for the durable key/value store
    pub data_dir: PathBuf,
    /// Delay between retries of a failed query
    pub query_retry_delay: Duration,
    /// Maximum number of cached query results
    pub cache_capacity: u64,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_base_url = parse_base_url(&get("TSHOP_API_BASE_URL", DEFAULT_BASE_URL))?;
        let request_timeout = Duration::from_secs(parse_number(
            "TSHOP_API_TIMEOUT_SECS",
            &get("TSHOP_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        )?);
        let data_dir = PathBuf::from(get("TSHOP_DATA_DIR", DEFAULT_DATA_DIR));
        let query_retry_delay = Duration::from_millis(parse_number(
            "TSHOP_QUERY_RETRY_DELAY_MS",
            &get("TSHOP_QUERY_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
        )?);
        let cache_capacity = parse_number(
            "TSHOP_CACHE_CAPACITY",
            &get("TSHOP_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
        )?;
        let sentry_dsn = lookup("SENTRY_DSN").filter(|dsn| !dsn.trim().is_empty());

        Ok(Self {
            api_base_url,
            request_timeout,
            data_dir,
            query_retry_delay,
            cache_capacity,
            sentry_dsn,
        })
    }

    /// Configuration pointing at `base_url` with every other value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not an absolute http(s) URL.
    pub fn with_base_url(base_url: &str, data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|_| None)?.with_api_base_url(base_url)?;
        config.data_dir = data_dir.into();
        Ok(config)
    }

    /// Replace the API base URL, keeping everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not an absolute http(s) URL.
    pub fn with_api_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        self.api_base_url = parse_base_url(base_url)?;
        Ok(self)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL, normalising it to end with `/`.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("TSHOP_API_BASE_URL".to_string(), msg);

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Parse a numeric variable.
fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.data_dir, PathBuf::from(".tshop"));
        assert_eq!(config.query_retry_delay, Duration::from_millis(500));
        assert_eq!(config.cache_capacity, 1000);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = config_from(&[("TSHOP_API_BASE_URL", "http://localhost:5000/api")]).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:5000/api/");
        assert_eq!(
            config.api_base_url.join("Carts").unwrap().as_str(),
            "http://localhost:5000/api/Carts"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = config_from(&[("TSHOP_API_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "TSHOP_API_BASE_URL"));

        let err = config_from(&[("TSHOP_API_BASE_URL", "ftp://example.com/")]).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_base_url_override_keeps_other_settings() {
        let config = config_from(&[("TSHOP_API_TIMEOUT_SECS", "3")])
            .unwrap()
            .with_api_base_url("http://127.0.0.1:8080")
            .unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = config_from(&[("TSHOP_API_TIMEOUT_SECS", "ten")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "TSHOP_API_TIMEOUT_SECS"));
    }

    #[test]
    fn test_blank_sentry_dsn_is_ignored() {
        let config = config_from(&[("SENTRY_DSN", "  ")]).unwrap();
        assert!(config.sentry_dsn.is_none());
    }
}
