//! Authenticated admin API client.

pub(crate) mod error;
pub mod network;
mod request;

pub use network::{NetworkConfig, PoolConfig, ProxyConfig};
pub use request::{ApiRequest, ApiResponse};

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::auth::{
    Credential, CredentialStore, FileStore, HttpTokenRefresher, LogoutReason, MemoryStore,
    RefreshCoordinator, SessionEvent, SessionEvents, TokenRefresher, UserIdentity,
};
use crate::config::{ClientConfig, ConfigError};
use crate::{Error, Result};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
}

/// HTTP client for the admin API.
///
/// Every request carries the stored access token. When the backend answers
/// 401 or 403, the client refreshes the token (one refresh at a time, shared
/// by every caller that hit the same rejection) and replays the request once.
///
/// Cloning is cheap; clones share the session and the refresh state.
///
/// ```rust,no_run
/// use admin_client::AdminClient;
///
/// # async fn example() -> Result<(), admin_client::Error> {
/// let client = AdminClient::builder()
///     .base_url("https://api.example.com")
///     .build()
///     .await?;
///
/// client.login("ops@example.com", "hunter2").await?;
/// let users: serde_json::Value = client.get_json("/admin/users").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    default_headers: HeaderMap,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    events: SessionEvents,
}

impl AdminClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Send a request, recovering once from an authorization failure.
    ///
    /// Non-2xx responses become [`Error::Api`]. A refresh failure becomes
    /// [`Error::Refresh`] and the session has been cleared by the time it is
    /// returned.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.store.get().map(|c| c.access_secret());
        let response = self.dispatch(&request, token.as_ref()).await?;

        if !response.is_auth_failure() || request.is_retried() {
            return response.error_for_status();
        }

        tracing::debug!(
            request_id = %request.id(),
            status = response.status().as_u16(),
            "Authorization rejected, recovering"
        );

        let rejected = token.as_ref().map(|t| t.expose_secret());
        let fresh = self.coordinator.recover(rejected).await?;

        let retry = request.into_retry();
        self.dispatch(&retry, Some(&fresh))
            .await?
            .error_for_status()
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&SecretString>,
    ) -> Result<ApiResponse> {
        let mut url = self.config.endpoint(request.path())?;
        if !request.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query_pairs());
        }

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .header(REQUEST_ID_HEADER, request.id().to_string())
            .headers(self.default_headers.clone());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = request.json_body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.inspect_err(|e| {
            tracing::debug!(
                request_id = %request.id(),
                method = %request.method(),
                path = request.path(),
                error = %e,
                "Request failed"
            );
        })?;
        let response = ApiResponse::read(response).await?;

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            path = request.path(),
            status = response.status().as_u16(),
            authenticated = token.is_some(),
            retried = request.is_retried(),
            "Request completed"
        );

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::patch(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Sign in with email and password and store the issued session.
    ///
    /// The login call never goes through authorization recovery: a rejected
    /// login is returned as [`Error::Api`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<UserIdentity>> {
        let url = self.config.endpoint(&self.config.login_path)?;
        let response = self
            .http
            .post(url)
            .headers(self.default_headers.clone())
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let body: LoginResponse = ApiResponse::read(response)
            .await?
            .error_for_status()?
            .json()?;

        if body.access_token.is_empty() {
            return Err(Error::auth("login response carries an empty access token"));
        }

        let credential = Credential::from_parts(
            body.access_token,
            body.refresh_token.filter(|t| !t.is_empty()),
        );
        let user = body.user.map(UserIdentity::new);

        self.store.replace(credential, user.clone());
        tracing::info!(store = self.store.name(), "Signed in");
        self.events.emit(SessionEvent::LoggedIn);

        Ok(user)
    }

    /// Drop the stored session.
    pub fn logout(&self) {
        self.store.clear();
        tracing::info!("Signed out");
        self.events.emit(SessionEvent::LoggedOut {
            reason: LogoutReason::UserInitiated,
        });
    }

    /// Install a session obtained elsewhere.
    pub fn set_credential(&self, credential: Credential) {
        self.store.set(credential);
    }

    pub fn credential(&self) -> Option<Credential> {
        self.store.get()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.store.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.get().is_some()
    }

    /// Whether a token refresh is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Session events. A [`SessionEvent::LoggedOut`] caused by a failed
    /// refresh is the cue to send the user back to sign-in.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("base_url", &self.config.base_url)
            .field("store", &self.store.name())
            .finish()
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    http: Option<reqwest::Client>,
    network: Option<NetworkConfig>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Start from an explicit configuration instead of the defaults.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Start from [`ClientConfig::from_env`].
    pub fn from_env(mut self) -> Result<Self> {
        self.config = Some(ClientConfig::from_env()?);
        Ok(self)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn store(self, store: impl CredentialStore + 'static) -> Self {
        self.store_arc(Arc::new(store))
    }

    pub fn store_arc(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the refresh-token exchange.
    pub fn refresher(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Use a preconfigured transport. Timeout and network settings are then ignored.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<AdminClient> {
        let mut config = self.config.unwrap_or_default();
        if let Some(url) = self.base_url {
            config.base_url = url;
        }
        if let Some(network) = self.network {
            config.network = network;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => {
                let builder = reqwest::Client::builder()
                    .timeout(config.timeout)
                    .user_agent(config.user_agent.as_str());
                let builder = config
                    .network
                    .apply_to_builder(builder)
                    .await
                    .map_err(ConfigError::Network)?;
                builder.build().map_err(Error::Network)?
            }
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => match config.credentials_file {
                Some(ref path) => Arc::new(FileStore::open(path)?),
                None => Arc::new(MemoryStore::new()),
            },
        };

        let default_headers = config.header_map()?;

        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(
                HttpTokenRefresher::new(http.clone(), config.endpoint(&config.refresh_path)?)
                    .with_headers(default_headers.clone()),
            ),
        };

        let events = SessionEvents::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            refresher,
            events.clone(),
        ));

        tracing::debug!(
            base_url = %config.base_url,
            store = store.name(),
            authenticated = store.get().is_some(),
            "Admin client ready"
        );

        Ok(AdminClient {
            http,
            config: Arc::new(config),
            default_headers,
            store,
            coordinator,
            events,
        })
    }
}
