//! Client configuration.
//!
//! ```rust,no_run
//! use admin_client::config::ClientConfig;
//!
//! # fn example() -> Result<(), admin_client::config::ConfigError> {
//! let config = ClientConfig::from_env()?
//!     .header("x-tenant", "ops")
//!     .timeout(std::time::Duration::from_secs(10));
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::client::NetworkConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_BASE_URL: &str = "ADMIN_API_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "ADMIN_API_TIMEOUT_SECS";
const ENV_REFRESH_PATH: &str = "ADMIN_API_REFRESH_PATH";
const ENV_LOGIN_PATH: &str = "ADMIN_API_LOGIN_PATH";
const ENV_USER_AGENT: &str = "ADMIN_API_USER_AGENT";
const ENV_CUSTOM_HEADERS: &str = "ADMIN_API_CUSTOM_HEADERS";
const ENV_CREDENTIALS_FILE: &str = "ADMIN_CREDENTIALS_FILE";

/// Errors that can occur while building configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Proxy or certificate settings could not be applied
    #[error("Invalid network settings: {0}")]
    Network(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for [`AdminClient`](crate::AdminClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.example.com/v1`. Request paths are appended to it.
    pub base_url: String,
    pub refresh_path: String,
    pub login_path: String,
    /// Per-request timeout, also applied to refresh and login calls.
    pub timeout: Duration,
    pub user_agent: String,
    /// Headers attached to every request, including login and refresh calls.
    pub headers: Vec<(String, String)>,
    pub network: NetworkConfig,
    /// Session file for [`FileStore`](crate::auth::FileStore); `None` keeps
    /// the session in memory.
    pub credentials_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            headers: Vec::new(),
            network: NetworkConfig::default(),
            credentials_file: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create from environment variables, falling back to defaults.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(url) = env_var(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(secs) = env_var(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                ConfigError::invalid(
                    ENV_TIMEOUT_SECS,
                    format!("'{}' is not a number of seconds", secs),
                )
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(path) = env_var(ENV_REFRESH_PATH) {
            config.refresh_path = path;
        }
        if let Some(path) = env_var(ENV_LOGIN_PATH) {
            config.login_path = path;
        }
        if let Some(agent) = env_var(ENV_USER_AGENT) {
            config.user_agent = agent;
        }
        if let Some(raw) = env_var(ENV_CUSTOM_HEADERS) {
            config.headers = parse_custom_headers(&raw);
        }

        config.network = NetworkConfig::from_env();
        config.credentials_file = env_var(ENV_CREDENTIALS_FILE).map(PathBuf::from);

        Ok(config)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Check that the configuration can produce request URLs.
    pub fn validate(&self) -> ConfigResult<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::invalid("base_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.cannot_be_a_base() {
            return Err(ConfigError::invalid("base_url", "not a base URL"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        self.header_map()?;
        Ok(())
    }

    /// The configured [`headers`](Self::headers) as a header map. Repeated
    /// names keep every value.
    pub fn header_map(&self) -> ConfigResult<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigError::invalid("headers", format!("'{}' is not a valid header name", name))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ConfigError::invalid("headers", format!("invalid value for '{}'", name))
            })?;
            map.append(header, value);
        }
        Ok(map)
    }

    /// Absolute URL for an API path. `path` may omit its leading slash; the
    /// base URL's own path prefix is kept.
    pub fn endpoint(&self, path: &str) -> ConfigResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ConfigError::invalid("path", format!("{}: {}", path, e)))
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Parse `"Header1: Value1\nHeader2: Value2"`.
fn parse_custom_headers(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.refresh_path, "/auth/refresh-token");
        assert_eq!(config.login_path, "/auth/login");
        assert!(config.user_agent.starts_with("admin-client/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ClientConfig::new("https://api.example.com/v1/");
        assert_eq!(
            config.endpoint("/auth/refresh-token").unwrap().as_str(),
            "https://api.example.com/v1/auth/refresh-token"
        );
        assert_eq!(
            config.endpoint("admin/users").unwrap().as_str(),
            "https://api.example.com/v1/admin/users"
        );
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ftp://example.com").validate().is_err());

        let err = ClientConfig::new("mailto:ops@example.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "base_url"));
    }

    #[test]
    fn test_validate_rejects_bad_header_name() {
        let config = ClientConfig::default().header("bad header", "x");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_header_map() {
        let config = ClientConfig::default()
            .header("x-tenant", "ops")
            .header("x-trace", "a")
            .header("x-trace", "b");
        let map = config.header_map().unwrap();
        assert_eq!(map["x-tenant"], "ops");
        assert_eq!(map.get_all("x-trace").iter().count(), 2);

        let bad_value = ClientConfig::default().header("x-tenant", "ops\nx-evil: 1");
        assert!(bad_value.validate().is_err());
    }

    #[test]
    fn test_parse_custom_headers() {
        let headers = parse_custom_headers("X-Tenant: ops\nmalformed\nX-Trace:  abc:def \n");
        assert_eq!(
            headers,
            vec![
                ("X-Tenant".to_string(), "ops".to_string()),
                ("X-Trace".to_string(), "abc:def".to_string()),
            ]
        );
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("https://api.example.com")
            .refresh_path("/v2/refresh")
            .login_path("/v2/login")
            .timeout(Duration::from_secs(5))
            .user_agent("ops-console/1.0")
            .credentials_file("/tmp/session.json");

        assert_eq!(config.refresh_path, "/v2/refresh");
        assert_eq!(config.login_path, "/v2/login");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "ops-console/1.0");
        assert_eq!(
            config.credentials_file,
            Some(PathBuf::from("/tmp/session.json"))
        );
    }
}
