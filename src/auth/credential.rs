//! Credential types.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token pair issued by the backend at login and on every refresh.
///
/// Token values are wrapped in [`SecretString`], so `Debug` output stays redacted.
#[derive(Clone, Debug)]
pub struct Credential {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
}

impl Credential {
    /// Create a credential with both tokens.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: Some(SecretString::from(refresh_token.into())),
        }
    }

    /// Create a credential that carries only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
        }
    }

    pub(crate) fn from_parts(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token),
            refresh_token: refresh_token.map(SecretString::from),
        }
    }

    pub(crate) fn access_secret(&self) -> SecretString {
        self.access_token.clone()
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    pub(crate) fn from_secrets(
        access_token: SecretString,
        refresh_token: Option<SecretString>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    /// Whether `token` is the access token held by this credential.
    pub fn matches_access_token(&self, token: &str) -> bool {
        self.access_token.expose_secret() == token
    }

    /// Whether `token` is the refresh token held by this credential.
    pub fn matches_refresh_token(&self, token: &str) -> bool {
        self.refresh_token().is_some_and(|t| t == token)
    }
}

/// Cached identity of the signed-in administrator.
///
/// The backend owns the shape of this blob; only a few well-known fields get accessors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(Value);

impl UserIdentity {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn id(&self) -> Option<&str> {
        self.field("id").or_else(|| self.field("_id"))
    }

    pub fn email(&self) -> Option<&str> {
        self.field("email")
    }

    pub fn role(&self) -> Option<&str> {
        self.field("role")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Value> for UserIdentity {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_accessors() {
        let cred = Credential::new("A1", "R1");
        assert_eq!(cred.access_token(), "A1");
        assert_eq!(cred.refresh_token(), Some("R1"));
        assert!(cred.has_refresh_token());

        let bearer = Credential::bearer("A1");
        assert_eq!(bearer.refresh_token(), None);
        assert!(!bearer.has_refresh_token());
    }

    #[test]
    fn test_empty_refresh_token_is_absent() {
        let cred = Credential::new("A1", "");
        assert!(!cred.has_refresh_token());
    }

    #[test]
    fn test_matches_refresh_token() {
        let cred = Credential::new("A1", "R1");
        assert!(cred.matches_refresh_token("R1"));
        assert!(!cred.matches_refresh_token("R2"));
        assert!(!Credential::bearer("A1").matches_refresh_token(""));
    }

    #[test]
    fn test_debug_is_redacted() {
        let cred = Credential::new("super-secret-access", "super-secret-refresh");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("super-secret-access"));
        assert!(!debug.contains("super-secret-refresh"));
    }

    #[test]
    fn test_user_identity_fields() {
        let user = UserIdentity::new(json!({
            "_id": "u-1",
            "email": "ops@example.com",
            "role": "admin"
        }));
        assert_eq!(user.id(), Some("u-1"));
        assert_eq!(user.email(), Some("ops@example.com"));
        assert_eq!(user.role(), Some("admin"));
    }
}
