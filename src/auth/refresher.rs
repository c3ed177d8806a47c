//! Refresh-token exchange.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use super::refresh::RefreshError;
use super::Credential;
use crate::client::error::error_message;

/// Tokens returned by a successful refresh.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    /// Present only when the server rotated the refresh token.
    pub refresh_token: Option<SecretString>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(refresh_token.into()));
        self
    }

    /// Credential after this grant; `sent` stays the refresh token unless the
    /// server rotated it.
    pub(crate) fn into_credential(self, sent: &SecretString) -> Credential {
        Credential::from_secrets(
            self.access_token,
            Some(self.refresh_token.unwrap_or_else(|| sent.clone())),
        )
    }
}

/// Exchanges a refresh token for a new access token.
///
/// Implementations make exactly one attempt per call; retries are not part of
/// the contract.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refresher name for logging.
    fn name(&self) -> &str;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Calls `POST <base>/auth/refresh-token` with `{"token": <refresh token>}`.
///
/// This call goes straight to the transport and never through the
/// authorization recovery path. It carries the client's configured headers
/// but no bearer token.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            headers: HeaderMap::new(),
        }
    }

    /// Headers sent with every refresh call.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    fn name(&self) -> &str {
        "http"
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(&RefreshRequest {
                token: refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let parsed: RefreshResponse = serde_json::from_slice(&body)
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        if parsed.access_token.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "response carries an empty access token".into(),
            ));
        }

        Ok(TokenGrant {
            access_token: SecretString::from(parsed.access_token),
            refresh_token: parsed
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn refresher_for(server: &MockServer) -> HttpTokenRefresher {
        let endpoint = Url::parse(&format!("{}/auth/refresh-token", server.uri())).unwrap();
        HttpTokenRefresher::new(reqwest::Client::new(), endpoint)
    }

    #[tokio::test]
    async fn test_refresh_with_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .and(body_json(json!({"token": "R1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "A2", "refreshToken": "R2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let grant = refresher_for(&server).await.refresh("R1").await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "A2");
        assert_eq!(
            grant.refresh_token.as_ref().map(|t| t.expose_secret()),
            Some("R2")
        );
    }

    #[tokio::test]
    async fn test_refresh_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .and(header("x-tenant", "ops"))
            .and(|req: &wiremock::Request| !req.headers.contains_key("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "A2"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", "ops".parse().unwrap());
        let refresher = refresher_for(&server).await.with_headers(headers);

        let grant = refresher.refresh("R1").await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "A2");
    }

    #[test]
    fn test_grant_keeps_sent_refresh_token() {
        let sent = SecretString::from("R1");

        let kept = TokenGrant::new("A2").into_credential(&sent);
        assert_eq!(kept.access_token(), "A2");
        assert_eq!(kept.refresh_token(), Some("R1"));

        let rotated = TokenGrant::new("A3")
            .with_refresh_token("R3")
            .into_credential(&sent);
        assert_eq!(rotated.access_token(), "A3");
        assert_eq!(rotated.refresh_token(), Some("R3"));
    }

    #[tokio::test]
    async fn test_refresh_without_rotation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "A2"})))
            .mount(&server)
            .await;

        let grant = refresher_for(&server).await.refresh("R1").await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "A2");
        assert!(grant.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_rejected_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid refresh token"})),
            )
            .mount(&server)
            .await;

        let err = refresher_for(&server).await.refresh("R1").await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Rejected {
                status: 400,
                message: "Invalid refresh token".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "A2"})))
            .mount(&server)
            .await;

        let err = refresher_for(&server).await.refresh("R1").await.unwrap_err();
        assert!(matches!(err, RefreshError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let endpoint = Url::parse("http://127.0.0.1:1/auth/refresh-token").unwrap();
        let refresher = HttpTokenRefresher::new(reqwest::Client::new(), endpoint);

        let err = refresher.refresh("R1").await.unwrap_err();
        assert!(matches!(err, RefreshError::Transport(_)));
    }
}
