//! Stratus authentication
//!
//! Issues X-Auth-Token credentials against the identity service and caches
//! them until shortly before expiry. The executor layer forces a refresh
//! through [`Credentials::refresh`] when the API rejects a token mid-flight.

use super::error::Result;
use super::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the identity service omits an expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Token issuance response from the identity service
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenPayload,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    id: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Stratus credentials holder with token caching
#[derive(Clone)]
pub struct Credentials {
    http: HttpClient,
    identity_endpoint: String,
    access_key: String,
    secret_key: String,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl Credentials {
    /// Create new credentials against the given identity endpoint
    pub fn new(
        http: HttpClient,
        identity_endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            identity_endpoint: identity_endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn token(&self) -> Result<String> {
        // Check cache first - but only return if token is still valid
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let fresh = self.issue().await?;
        let token = fresh.token.clone();

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(fresh);
        }

        Ok(token)
    }

    /// Force refresh the token, discarding whatever is cached
    pub async fn refresh(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.token().await
    }

    /// Issue a fresh token from the identity service
    async fn issue(&self) -> Result<CachedToken> {
        let url = format!("{}/tokens", self.identity_endpoint);
        let body = json!({
            "auth": {
                "access_key": self.access_key,
                "secret_key": self.secret_key,
            }
        });

        let response = self.http.post_unauthenticated(&url, &body).await?;
        let parsed: TokenResponse = response.json()?;

        let ttl = parsed
            .token
            .expires_at
            .and_then(|expires| (expires - Utc::now()).to_std().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(CachedToken {
            token: parsed.token.id,
            expires_at,
        })
    }
}
