//! Kubernetes Engine cluster resource
//!
//! Cluster provisioning is a long-running server-side job: the create call
//! returns immediately with the cluster in `CREATING`, and the handler polls
//! until the cluster settles in `RUNNING` or `ERROR`. The poller itself is
//! state-agnostic, so `ERROR` rides along in the target set and is
//! classified here.

use crate::api::error::ApiError;
use crate::api::ApiClient;
use crate::diag::Diagnostics;
use crate::reconcile::{
    execute, poll_until, poll_until_deletion, AbsencePolicy, Deadline, PollSpec, RetryConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const KIND: &str = "cluster";

/// Interval between status fetches while a cluster operation settles
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Cluster lifecycle status as reported by the Kubernetes Engine API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Creating,
    Running,
    Updating,
    Deleting,
    Error,
}

/// A Kubernetes Engine cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub status: ClusterStatus,
    pub version: String,
    pub zone: String,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Planned cluster configuration from Terraform
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub name: String,
    pub version: String,
    pub zone: String,
    pub subnet_id: Option<String>,
}

/// Create a cluster and wait until it is running.
///
/// Returns the final cluster state, or `None` with diagnostics appended if
/// creation was rejected, the cluster settled in `ERROR`, or the wait timed
/// out.
pub async fn create(
    client: &ApiClient,
    diags: &mut Diagnostics,
    plan: &ClusterPlan,
    timeout: Duration,
) -> Option<Cluster> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.kubernetes_url("clusters");
    let body = json!({
        "name": plan.name,
        "version": plan.version,
        "zone": plan.zone,
        "subnet_id": plan.subnet_id,
    });
    let (url, body) = (url.as_str(), &body);

    let created: Cluster = match execute(
        client,
        &retry,
        deadline,
        diags,
        "create cluster",
        move || async move { client.post(url, Some(body)).await?.json() },
    )
    .await
    {
        Ok(cluster) => cluster,
        Err(_) => return None,
    };

    tracing::info!("cluster {} ({}): creation accepted", created.name, created.id);
    wait_until_settled(client, diags, &created.id, deadline, AbsencePolicy::RetryUntilVisible).await
}

/// Read the current cluster state.
///
/// `None` without an appended error means the cluster no longer exists and
/// should be dropped from state.
pub async fn read(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    timeout: Duration,
) -> Option<Cluster> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.cluster_url(id);
    let url = url.as_str();

    match execute(
        client,
        &retry,
        deadline,
        diags,
        "read cluster",
        move || async move { client.get(url).await?.json::<Cluster>() },
    )
    .await
    {
        Ok(cluster) => Some(cluster),
        Err(err) if err.is_not_found() => {
            tracing::info!("cluster {}: no longer exists, dropping from state", id);
            None
        }
        Err(_) => None,
    }
}

/// Upgrade a cluster to a new Kubernetes version and wait until it is
/// running again.
pub async fn upgrade(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    version: &str,
    timeout: Duration,
) -> Option<Cluster> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.kubernetes_url(&format!("clusters/{}/upgrade", id));
    let body = json!({ "version": version });
    let (url, body) = (url.as_str(), &body);

    let result: Result<serde_json::Value, ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "upgrade cluster",
        move || async move { Ok(client.post(url, Some(body)).await?.body) },
    )
    .await;
    if result.is_err() {
        return None;
    }

    tracing::info!("cluster {}: upgrade to {} accepted", id, version);
    wait_until_settled(client, diags, id, deadline, AbsencePolicy::Fail).await
}

/// Delete a cluster and wait until it is gone.
///
/// Returns whether it is safe to remove the cluster from state. A deletion
/// that is still in flight at the deadline returns `true` with a warning
/// appended; only a rejected delete request returns `false`.
pub async fn delete(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    timeout: Duration,
) -> bool {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.cluster_url(id);
    let url = url.as_str();

    let result: Result<(), ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "delete cluster",
        move || async move { client.delete(url).await.map(|_| ()) },
    )
    .await;
    match result {
        Ok(()) => {}
        Err(err) if err.is_not_found() => return true,
        Err(_) => return false,
    }

    poll_until_deletion(KIND, id, POLL_INTERVAL, deadline, diags, move || async move {
        client.get(url).await.map(|_| false)
    })
    .await;

    // Timeout already produced a warning; state removal proceeds either way
    true
}

/// Poll the cluster until it leaves its transitional state, then classify
/// the terminal status. Creation polls tolerate a not-yet-visible cluster;
/// upgrade polls treat absence as failure (the cluster was deleted under us).
async fn wait_until_settled(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    deadline: Deadline,
    absence: AbsencePolicy,
) -> Option<Cluster> {
    let retry = RetryConfig::default();
    let url = client.cluster_url(id);
    let url = url.as_str();
    let spec = PollSpec::new(
        KIND,
        id,
        POLL_INTERVAL,
        vec![ClusterStatus::Running, ClusterStatus::Error],
    )
    .with_absence(absence);

    let (cluster, ok) = poll_until(
        client,
        &retry,
        &spec,
        deadline,
        diags,
        move || async move { client.get(url).await?.json::<Cluster>() },
        |c: &Cluster| c.status,
    )
    .await;

    if !ok {
        return None;
    }

    let cluster = cluster?;
    if cluster.status == ClusterStatus::Error {
        diags.error(
            format!("Cluster {} entered ERROR state", cluster.name),
            "The Stratus Kubernetes Engine reported the cluster as failed. \
             Check the cluster events in the console for details.",
        );
        return None;
    }

    tracing::info!("cluster {} ({}): running", cluster.name, cluster.id);
    Some(cluster)
}
