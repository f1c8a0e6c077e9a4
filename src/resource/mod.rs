//! Resource handlers
//!
//! One module per Terraform-facing resource type. Each handler translates a
//! typed plan into REST calls through [`crate::api::ApiClient`], drives the
//! asynchronous parts through [`crate::reconcile`], and maps the final API
//! entity back into a typed state struct.
//!
//! Handlers never abort the surrounding operation themselves: a failure is
//! reported as a `None` return plus one or more records in the shared
//! [`crate::diag::Diagnostics`], and the caller decides what to do with it.
//! A `None` from `read` with no appended error means the remote resource is
//! gone (drift) and should be dropped from state.
//!
//! # Modules
//!
//! - [`image`] - machine images in the image service
//! - [`image_member`] - image-sharing memberships (cross-tenant access)
//! - [`cluster`] - Kubernetes Engine clusters
//! - [`node_pool`] - node pools within a cluster
//! - [`scheduled_scaling`] - time-based scaling rules on a node pool

pub mod cluster;
pub mod image;
pub mod image_member;
pub mod node_pool;
pub mod scheduled_scaling;
