//! API error types and classification
//!
//! Every remote call funnels its failures into [`ApiError`] so that the
//! reconcile layer can decide what is retryable without string matching.

use thiserror::Error;

/// Errors produced by the Stratus REST API layer
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// HTTP status code, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }

    /// The credential used for the request is no longer valid
    pub fn is_auth_expired(&self) -> bool {
        self.status() == Some(401)
    }

    /// The addressed resource does not exist (or is not visible yet)
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Likely to resolve on retry: connection failures, timeouts,
    /// server overload (429) and server-side errors (5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_builder(),
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Format an API error for display
/// Security: Sanitizes error messages to avoid leaking raw API details
pub fn format_api_error(error: &ApiError) -> String {
    match error.status() {
        Some(401) => return "Authentication failed. Check your Stratus credentials.".to_string(),
        Some(403) => return "Permission denied. Check your Stratus IAM permissions.".to_string(),
        Some(404) => return "Resource not found.".to_string(),
        Some(400) => return "Invalid request. Check your parameters.".to_string(),
        Some(409) => {
            return "Resource conflict. The resource may already exist or be in use.".to_string()
        }
        Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
        Some(code) if code >= 500 => {
            return "Stratus service temporarily unavailable. Please try again.".to_string()
        }
        _ => {}
    }

    if matches!(error, ApiError::Transport(_)) {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    // Truncate long error messages and remove potential sensitive data
    let error_str = error.to_string();
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            code,
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_classification() {
        assert!(status(401).is_auth_expired());
        assert!(!status(401).is_transient());
        assert!(status(404).is_not_found());
        assert!(status(429).is_transient());
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(403).is_transient());
    }

    #[test]
    fn test_format_known_codes() {
        assert!(format_api_error(&status(404)).contains("not found"));
        assert!(format_api_error(&status(503)).contains("temporarily unavailable"));
        assert!(format_api_error(&status(401)).contains("Authentication"));
    }
}
