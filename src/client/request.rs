//! Generic API request and response types.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::error::error_message;
use crate::{Error, Result};

/// One call against the admin API.
///
/// ```rust
/// use admin_client::ApiRequest;
/// use serde_json::json;
///
/// let request = ApiRequest::post("/admin/notifications/broadcast")
///     .body(json!({"title": "Maintenance", "audience": "investors"}))
///     .query("dryRun", "true");
/// assert_eq!(request.path(), "/admin/notifications/broadcast");
/// ```
#[derive(Clone, Debug)]
pub struct ApiRequest {
    id: Uuid,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.body(serde_json::to_value(body)?))
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Identifier sent as `x-request-id`; a replay keeps the original id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn json_body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Whether this is the replay after an authorization recovery.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn into_retry(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// Buffered response of a completed call.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 401 and 403 both mean the access token was not accepted.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }

    pub(crate) fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(Error::Api {
            status: self.status.as_u16(),
            message: error_message(self.status, &self.body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &'static str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::patch("/admin/users/42")
            .body(json!({"status": "suspended"}))
            .query("notify", "false")
            .header("x-reason", "fraud");

        assert_eq!(request.method(), &Method::PATCH);
        assert_eq!(request.path(), "/admin/users/42");
        assert_eq!(request.query_pairs(), [("notify".to_string(), "false".to_string())]);
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.json_body(), Some(&json!({"status": "suspended"})));
        assert!(!request.is_retried());
    }

    #[test]
    fn test_retry_keeps_request_id() {
        let request = ApiRequest::get("/admin/reports");
        let id = request.id();

        let retry = request.into_retry();
        assert!(retry.is_retried());
        assert_eq!(retry.id(), id);
    }

    #[test]
    fn test_json_payload() {
        #[derive(Serialize)]
        struct Verify<'a> {
            investor_id: &'a str,
            approved: bool,
        }

        let request = ApiRequest::post("/admin/investors/verify")
            .json(&Verify {
                investor_id: "inv-7",
                approved: true,
            })
            .unwrap();
        assert_eq!(request.json_body().unwrap()["approved"], true);
    }

    #[test]
    fn test_auth_failure_statuses() {
        assert!(response(401, "").is_auth_failure());
        assert!(response(403, "").is_auth_failure());
        assert!(!response(404, "").is_auth_failure());
        assert!(!response(500, "").is_auth_failure());
    }

    #[test]
    fn test_error_for_status() {
        let err = response(422, r#"{"message": ["email must be an email"]}"#)
            .error_for_status()
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "email must be an email");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(response(204, "").error_for_status().is_ok());
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let value: Option<Value> = response(204, "").json().unwrap();
        assert!(value.is_none());

        let value: Value = response(200, r#"{"total": 3}"#).json().unwrap();
        assert_eq!(value["total"], 3);
    }
}
