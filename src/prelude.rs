//! Prelude module for convenient imports.
//!
//! ```rust
//! use admin_client::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Client
pub use crate::AdminClient;
pub use crate::ApiRequest;
pub use crate::ApiResponse;
pub use crate::ClientBuilder;
pub use crate::ClientConfig;

// Session
pub use crate::auth::{Credential, CredentialStore, SessionEvent, UserIdentity};
