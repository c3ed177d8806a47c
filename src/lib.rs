//! # admin-client
//!
//! Authenticated REST client for the marketplace admin dashboard.
//!
//! The client attaches the stored bearer token to every request. When the
//! backend rejects a token with 401 or 403, exactly one refresh call is made no
//! matter how many requests were rejected at the same time; the others wait
//! for it and are replayed, in arrival order, with the new token. If the
//! refresh fails the session is cleared and a forced-logout event is broadcast.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use admin_client::{AdminClient, SessionEvent};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), admin_client::Error> {
//!     let client = AdminClient::builder().from_env()?.build().await?;
//!     client.login("ops@example.com", "hunter2").await?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if event.is_forced_logout() {
//!                 eprintln!("session expired, please sign in again");
//!             }
//!         }
//!     });
//!
//!     let report: serde_json::Value = client.get_json("/admin/reports/revenue").await?;
//!     client
//!         .patch_json::<_, serde_json::Value>("/admin/users/42", &json!({"status": "active"}))
//!         .await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod config;
pub mod prelude;

pub use auth::{
    Credential, CredentialStore, FileStore, HttpTokenRefresher, LogoutReason, MemoryStore,
    RefreshCoordinator, RefreshError, SessionEvent, TokenGrant, TokenRefresher, UserIdentity,
};
pub use client::{
    AdminClient, ApiRequest, ApiResponse, ClientBuilder, NetworkConfig, PoolConfig, ProxyConfig,
};
pub use config::{ClientConfig, ConfigError};

/// Error type for admin-client operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// API returned a non-2xx response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Token refresh failed; the session has been cleared.
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Authentication failed outside the refresh flow.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Network connectivity or request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session file could not be read or parsed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected credentials (401, 403) or a failed refresh
    Authorization,
    /// Network or server errors that may succeed on retry
    Transient,
    /// Configuration or setup errors
    Configuration,
    /// Request rejected by the API (4xx other than 401/403)
    Client,
    /// Internal errors (IO, JSON, storage)
    Internal,
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth { .. } | Error::Refresh(_) => ErrorCategory::Authorization,
            Error::Api {
                status: 401 | 403, ..
            } => ErrorCategory::Authorization,

            Error::Network(_) => ErrorCategory::Transient,
            Error::Api {
                status: 408 | 429 | 500..=599,
                ..
            } => ErrorCategory::Transient,

            Error::Config(_) => ErrorCategory::Configuration,

            Error::Api { .. } => ErrorCategory::Client,

            Error::Json(_) | Error::Io(_) | Error::Storage(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Whether the session was torn down by a failed refresh.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Refresh(e) if e.is_terminal())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
