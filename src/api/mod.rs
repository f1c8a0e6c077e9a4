//! Stratus API interaction module
//!
//! This module provides the core functionality for interacting with Stratus
//! Cloud services, including authentication, HTTP client, and the typed
//! error taxonomy the reconcile layer classifies against.
//!
//! # Module Structure
//!
//! - [`auth`] - Token issuance and caching against the identity service
//! - [`client`] - Main client for making API requests
//! - [`error`] - API error types and transient/auth/not-found classification
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use stratus_provider::api::client::ApiClient;
//! use stratus_provider::config::ProviderConfig;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = ProviderConfig::from_env()?;
//!     let client = ApiClient::new(&config)?;
//!     let clusters = client.get(&client.kubernetes_url("clusters")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;

pub use client::ApiClient;
pub use error::{format_api_error, ApiError};
