//! Stratus API client
//!
//! Main client for interacting with Stratus Cloud services, combining
//! authentication and HTTP functionality. One instance is shared by all
//! resource handlers of a provider configuration; the reconcile layer
//! receives it by reference and uses [`ApiClient::refresh_token`] as its
//! reauthentication capability.

use super::auth::Credentials;
use super::error::Result;
use super::http::{ApiResponse, HttpClient};
use crate::config::ProviderConfig;
use serde_json::Value;

/// Main Stratus client
#[derive(Clone)]
pub struct ApiClient {
    pub credentials: Credentials,
    pub http: HttpClient,
    pub region: String,
    kubernetes_endpoint: String,
    image_endpoint: String,
}

impl ApiClient {
    /// Create a new client from a provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = HttpClient::new()?;
        let credentials = Credentials::new(
            http.clone(),
            config.effective_identity_endpoint(),
            &config.access_key,
            &config.secret_key,
        );

        Ok(Self {
            credentials,
            http,
            region: config.region.clone(),
            kubernetes_endpoint: config.effective_kubernetes_endpoint(),
            image_endpoint: config.effective_image_endpoint(),
        })
    }

    /// Get the current access token
    pub async fn token(&self) -> Result<String> {
        self.credentials.token().await
    }

    /// Discard the cached token and issue a fresh one
    pub async fn refresh_token(&self) -> Result<()> {
        self.credentials.refresh().await?;
        Ok(())
    }

    /// Make a GET request to a Stratus API
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        let token = self.token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a Stratus API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let token = self.token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PUT request to a Stratus API
    pub async fn put(&self, url: &str, body: Option<&Value>) -> Result<ApiResponse> {
        let token = self.token().await?;
        self.http.put(url, &token, body).await
    }

    /// Make a DELETE request to a Stratus API
    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        let token = self.token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Kubernetes Engine API helpers
    // =========================================================================

    /// Build a Kubernetes Engine API URL
    pub fn kubernetes_url(&self, path: &str) -> String {
        format!("{}/{}", self.kubernetes_endpoint, path)
    }

    /// Build a cluster URL
    pub fn cluster_url(&self, cluster_id: &str) -> String {
        self.kubernetes_url(&format!("clusters/{}", cluster_id))
    }

    /// Build a node pool URL
    pub fn node_pool_url(&self, cluster_id: &str, pool_id: &str) -> String {
        self.kubernetes_url(&format!("clusters/{}/nodepools/{}", cluster_id, pool_id))
    }

    // =========================================================================
    // Image service API helpers
    // =========================================================================

    /// Build an image service API URL
    pub fn image_url(&self, path: &str) -> String {
        format!("{}/{}", self.image_endpoint, path)
    }

    /// Build an image member URL
    pub fn image_member_url(&self, image_id: &str, member_id: &str) -> String {
        self.image_url(&format!("images/{}/members/{}", image_id, member_id))
    }
}
