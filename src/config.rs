//! Configuration Management
//!
//! Handles provider configuration for stratus-provider: credentials, region,
//! and per-service endpoint overrides. Values come from the environment
//! first, with an optional config file fallback.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default region when none is configured
const DEFAULT_REGION: &str = "kr1";

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API access key
    #[serde(default)]
    pub access_key: String,
    /// API secret key
    #[serde(default)]
    pub secret_key: String,
    /// Target region
    #[serde(default)]
    pub region: String,
    /// Identity service endpoint override
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    /// Kubernetes Engine endpoint override
    #[serde(default)]
    pub kubernetes_endpoint: Option<String>,
    /// Image service endpoint override
    #[serde(default)]
    pub image_endpoint: Option<String>,
}

impl ProviderConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stratus").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Build configuration from the environment, falling back to the config
    /// file for anything unset. Fails if no credentials can be found.
    pub fn from_env() -> Result<Self> {
        let file = Self::load();

        let access_key = std::env::var("STRATUS_ACCESS_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(file.access_key);
        let secret_key = std::env::var("STRATUS_SECRET_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(file.secret_key);

        if access_key.is_empty() || secret_key.is_empty() {
            return Err(anyhow::anyhow!(
                "No Stratus credentials configured. Set STRATUS_ACCESS_KEY and STRATUS_SECRET_KEY"
            ));
        }

        let region = std::env::var("STRATUS_REGION")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| Some(file.region.clone()).filter(|v| !v.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        if !validate_region(&region) {
            return Err(anyhow::anyhow!("Invalid region format: {}", region));
        }

        let config = Self {
            access_key,
            secret_key,
            region,
            identity_endpoint: std::env::var("STRATUS_IDENTITY_ENDPOINT")
                .ok()
                .or(file.identity_endpoint),
            kubernetes_endpoint: std::env::var("STRATUS_KUBERNETES_ENDPOINT")
                .ok()
                .or(file.kubernetes_endpoint),
            image_endpoint: std::env::var("STRATUS_IMAGE_ENDPOINT")
                .ok()
                .or(file.image_endpoint),
        };

        for endpoint in [
            &config.identity_endpoint,
            &config.kubernetes_endpoint,
            &config.image_endpoint,
        ]
        .into_iter()
        .flatten()
        {
            if !validate_endpoint(endpoint) {
                return Err(anyhow::anyhow!("Invalid endpoint URL: {}", endpoint));
            }
        }

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective identity endpoint (override > global default)
    pub fn effective_identity_endpoint(&self) -> String {
        self.identity_endpoint
            .clone()
            .unwrap_or_else(|| "https://identity.api.stratus.cloud/v1".to_string())
    }

    /// Get effective Kubernetes Engine endpoint (override > regional default)
    pub fn effective_kubernetes_endpoint(&self) -> String {
        self.kubernetes_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://ske.{}.api.stratus.cloud/v1", self.region))
    }

    /// Get effective image service endpoint (override > regional default)
    pub fn effective_image_endpoint(&self) -> String {
        self.image_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://image.{}.api.stratus.cloud/v2", self.region))
    }
}

/// Validate an endpoint override as an absolute http(s) URL
fn validate_endpoint(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Validate a Stratus region identifier
/// Regions are 2-12 characters, lowercase letters and digits
fn validate_region(region: &str) -> bool {
    if region.len() < 2 || region.len() > 12 {
        return false;
    }

    region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
