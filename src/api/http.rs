//! HTTP utilities for Stratus REST API calls

use super::error::{ApiError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Header carrying the Stratus auth token on every authenticated request
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Extract a human-readable message from a Stratus error payload
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
    }
    format!("API request failed: {}", status)
}

/// A fully-read API response
///
/// The body is always consumed in one piece, so a retried or discarded
/// request never leaves a half-read body on the pooled connection.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Decode the response body into a typed model
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// HTTP client wrapper for Stratus API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stratus-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request to a Stratus API
    pub async fn get(&self, url: &str, token: &str) -> Result<ApiResponse> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).header(AUTH_HEADER, token);
        self.dispatch(request).await
    }

    /// Make a POST request to a Stratus API
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<ApiResponse> {
        tracing::debug!("POST {}", url);
        let mut request = self.client.post(url).header(AUTH_HEADER, token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request).await
    }

    /// Make a PUT request to a Stratus API
    pub async fn put(&self, url: &str, token: &str, body: Option<&Value>) -> Result<ApiResponse> {
        tracing::debug!("PUT {}", url);
        let mut request = self.client.put(url).header(AUTH_HEADER, token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(request).await
    }

    /// Make a DELETE request to a Stratus API
    pub async fn delete(&self, url: &str, token: &str) -> Result<ApiResponse> {
        tracing::debug!("DELETE {}", url);
        let request = self.client.delete(url).header(AUTH_HEADER, token);
        self.dispatch(request).await
    }

    /// Make an unauthenticated POST request (token issuance)
    pub async fn post_unauthenticated(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        tracing::debug!("POST {} (unauthenticated)", url);
        let request = self.client.post(url).json(body);
        self.dispatch(request).await
    }

    /// Send a request and read the entire body, mapping non-2xx to errors
    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = request.send().await?;

        let status = response.status();
        // Always drain the full body so the pooled connection stays reusable
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        // Handle empty response (204, async-accepted 202 with no payload)
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}
