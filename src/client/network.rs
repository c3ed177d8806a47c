//! Proxy, CA certificate and connection pool settings for the HTTP transport.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Connection pool configuration.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub idle_timeout: Duration,
    pub max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 16,
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Network configuration for the HTTP client.
#[derive(Clone, Debug, Default)]
pub struct NetworkConfig {
    pub proxy: Option<ProxyConfig>,
    /// Extra root certificate (PEM), e.g. for a staging backend behind a private CA.
    pub ca_cert: Option<PathBuf>,
    pub pool: Option<PoolConfig>,
}

/// Proxy server configuration.
#[derive(Clone, Debug, Default)]
pub struct ProxyConfig {
    pub https: Option<String>,
    pub http: Option<String>,
    /// Hosts that bypass the proxy.
    pub no_proxy: Vec<String>,
}

impl NetworkConfig {
    /// Create from `HTTPS_PROXY`, `HTTP_PROXY`, `NO_PROXY` and `SSL_CERT_FILE`.
    pub fn from_env() -> Self {
        Self {
            proxy: ProxyConfig::from_env(),
            ca_cert: env::var("SSL_CERT_FILE").ok().map(PathBuf::from),
            pool: None,
        }
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.proxy.is_some() || self.ca_cert.is_some() || self.pool.is_some()
    }

    /// Apply configuration to a reqwest `ClientBuilder`.
    pub async fn apply_to_builder(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, std::io::Error> {
        if let Some(ref proxy) = self.proxy {
            builder = proxy.apply_to_builder(builder)?;
        }

        if let Some(ref ca_path) = self.ca_cert {
            let pem = tokio::fs::read(ca_path).await?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(ref pool) = self.pool {
            builder = builder
                .pool_idle_timeout(pool.idle_timeout)
                .pool_max_idle_per_host(pool.max_idle_per_host);

            if let Some(keepalive) = pool.tcp_keepalive {
                builder = builder.tcp_keepalive(keepalive);
            }
        }

        Ok(builder)
    }
}

impl ProxyConfig {
    /// Create from environment variables; `None` when no proxy is set.
    pub fn from_env() -> Option<Self> {
        let https = env::var("HTTPS_PROXY")
            .ok()
            .or_else(|| env::var("https_proxy").ok());
        let http = env::var("HTTP_PROXY")
            .ok()
            .or_else(|| env::var("http_proxy").ok());

        if https.is_none() && http.is_none() {
            return None;
        }

        let no_proxy = env::var("NO_PROXY")
            .ok()
            .or_else(|| env::var("no_proxy").ok())
            .map(|s| split_no_proxy(&s))
            .unwrap_or_default();

        Some(Self {
            https,
            http,
            no_proxy,
        })
    }

    pub fn https(url: impl Into<String>) -> Self {
        Self {
            https: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn http(mut self, url: impl Into<String>) -> Self {
        self.http = Some(url.into());
        self
    }

    pub fn no_proxy(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.no_proxy.extend(patterns);
        self
    }

    fn bypass(&self) -> Option<reqwest::NoProxy> {
        if self.no_proxy.is_empty() {
            return None;
        }
        reqwest::NoProxy::from_string(&self.no_proxy.join(","))
    }

    /// Apply to a reqwest `ClientBuilder`.
    pub fn apply_to_builder(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, std::io::Error> {
        let invalid = |e: reqwest::Error| std::io::Error::new(std::io::ErrorKind::InvalidInput, e);

        if let Some(ref url) = self.https {
            let proxy = reqwest::Proxy::https(url)
                .map_err(invalid)?
                .no_proxy(self.bypass());
            builder = builder.proxy(proxy);
        }
        if let Some(ref url) = self.http {
            let proxy = reqwest::Proxy::http(url)
                .map_err(invalid)?
                .no_proxy(self.bypass());
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}

fn split_no_proxy(raw: &str) -> Vec<String> {
    raw.split([',', ' '])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_builder() {
        let proxy = ProxyConfig::https("https://proxy.example.com:8080")
            .http("http://proxy.example.com:8080")
            .no_proxy(vec!["localhost".to_string(), "*.internal".to_string()]);

        assert!(proxy.https.is_some());
        assert!(proxy.http.is_some());
        assert_eq!(proxy.no_proxy.len(), 2);
        assert!(proxy.bypass().is_some());
    }

    #[test]
    fn test_split_no_proxy() {
        assert_eq!(
            split_no_proxy("localhost, 127.0.0.1 .internal"),
            vec!["localhost", "127.0.0.1", ".internal"]
        );
    }

    #[test]
    fn test_network_config_builder() {
        let config = NetworkConfig::default()
            .proxy(ProxyConfig::https("https://proxy.com"))
            .pool(PoolConfig::default());

        assert!(config.is_configured());
        assert!(!NetworkConfig::default().is_configured());
    }

    #[test]
    fn test_apply_rejects_invalid_proxy() {
        let proxy = ProxyConfig::https("not a url");
        assert!(proxy.apply_to_builder(reqwest::Client::builder()).is_err());
    }

    #[tokio::test]
    async fn test_missing_ca_cert_is_error() {
        let config = NetworkConfig::default().ca_cert("/nonexistent/ca.pem");
        let result = config.apply_to_builder(reqwest::Client::builder()).await;
        assert!(result.is_err());
    }
}
