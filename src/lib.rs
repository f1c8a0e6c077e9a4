//! Stratus Cloud provider core
//!
//! This crate implements the resource lifecycle engine of a Terraform-style
//! provider for Stratus Cloud: typed CRUD handlers for Kubernetes Engine
//! clusters, node pools, scheduled scaling rules, machine images, and
//! image-sharing memberships, built on a small set of asynchronous
//! reconciliation primitives.
//!
//! # Module Structure
//!
//! - [`api`] - Authentication, HTTP client, and the typed error taxonomy
//! - [`config`] - Provider configuration (credentials, region, endpoints)
//! - [`diag`] - Append-only diagnostics sink surfaced to the end user
//! - [`reconcile`] - Authenticated retry execution and status/deletion polling
//! - [`resource`] - Per-resource CRUD handlers
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use stratus_provider::api::ApiClient;
//! use stratus_provider::config::ProviderConfig;
//! use stratus_provider::diag::Diagnostics;
//! use stratus_provider::resource::cluster::{self, ClusterPlan};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ApiClient::new(&ProviderConfig::from_env()?)?;
//!     let mut diags = Diagnostics::new();
//!
//!     let plan = ClusterPlan {
//!         name: "prod".to_string(),
//!         version: "1.29.4".to_string(),
//!         zone: "kr1-a".to_string(),
//!         subnet_id: None,
//!     };
//!     let cluster = cluster::create(&client, &mut diags, &plan, Duration::from_secs(1800)).await;
//!
//!     for diagnostic in diags.iter() {
//!         eprintln!("{}", diagnostic);
//!     }
//!     if cluster.is_none() {
//!         anyhow::bail!("cluster creation failed");
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod diag;
pub mod reconcile;
pub mod resource;
