//! Node pool resource
//!
//! Node pools live under a cluster and share its asynchronous lifecycle:
//! create and scale operations return immediately and the pool transitions
//! through `CREATING`/`SCALING` before settling. A pool with scheduling
//! disabled (cordoned nodes) is still a healthy terminal state for
//! provisioning purposes.

use crate::api::error::ApiError;
use crate::api::ApiClient;
use crate::diag::Diagnostics;
use crate::reconcile::{
    execute, poll_until, poll_until_deletion, AbsencePolicy, Deadline, PollSpec, RetryConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

const KIND: &str = "node pool";

const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Node pool lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodePoolStatus {
    Creating,
    Running,
    RunningSchedulingDisabled,
    Scaling,
    Deleting,
    Error,
}

impl NodePoolStatus {
    /// States in which the pool is provisioned and usable
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Running | Self::RunningSchedulingDisabled)
    }
}

/// A node pool within a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePool {
    pub id: String,
    pub name: String,
    pub status: NodePoolStatus,
    pub node_count: u32,
    pub flavor: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Planned node pool configuration from Terraform
#[derive(Debug, Clone)]
pub struct NodePoolPlan {
    pub name: String,
    pub node_count: u32,
    pub flavor: String,
    pub labels: BTreeMap<String, String>,
}

/// Create a node pool and wait until it is running.
pub async fn create(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    plan: &NodePoolPlan,
    timeout: Duration,
) -> Option<NodePool> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.kubernetes_url(&format!("clusters/{}/nodepools", cluster_id));
    let body = json!({
        "name": plan.name,
        "node_count": plan.node_count,
        "flavor": plan.flavor,
        "labels": plan.labels,
    });
    let (url, body) = (url.as_str(), &body);

    let created: NodePool = match execute(
        client,
        &retry,
        deadline,
        diags,
        "create node pool",
        move || async move { client.post(url, Some(body)).await?.json() },
    )
    .await
    {
        Ok(pool) => pool,
        Err(_) => return None,
    };

    tracing::info!(
        "node pool {} ({}) on cluster {}: creation accepted",
        created.name,
        created.id,
        cluster_id
    );
    wait_until_settled(
        client,
        diags,
        cluster_id,
        &created.id,
        deadline,
        AbsencePolicy::RetryUntilVisible,
    )
    .await
}

/// Read the current node pool state. `None` without an appended error means
/// the pool is gone.
pub async fn read(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    id: &str,
    timeout: Duration,
) -> Option<NodePool> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.node_pool_url(cluster_id, id);
    let url = url.as_str();

    match execute(
        client,
        &retry,
        deadline,
        diags,
        "read node pool",
        move || async move { client.get(url).await?.json::<NodePool>() },
    )
    .await
    {
        Ok(pool) => Some(pool),
        Err(err) if err.is_not_found() => {
            tracing::info!("node pool {}: no longer exists, dropping from state", id);
            None
        }
        Err(_) => None,
    }
}

/// Resize a node pool and wait until scaling settles.
pub async fn scale(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    id: &str,
    node_count: u32,
    timeout: Duration,
) -> Option<NodePool> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.node_pool_url(cluster_id, id);
    let body = json!({ "node_count": node_count });
    let (url, body) = (url.as_str(), &body);

    let result: Result<serde_json::Value, ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "scale node pool",
        move || async move { Ok(client.put(url, Some(body)).await?.body) },
    )
    .await;
    if result.is_err() {
        return None;
    }

    tracing::info!("node pool {}: scale to {} accepted", id, node_count);
    wait_until_settled(client, diags, cluster_id, id, deadline, AbsencePolicy::Fail).await
}

/// Delete a node pool and wait until it is gone. Returns whether it is safe
/// to remove the pool from state.
pub async fn delete(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    id: &str,
    timeout: Duration,
) -> bool {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.node_pool_url(cluster_id, id);
    let url = url.as_str();

    let result: Result<(), ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "delete node pool",
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

    true
}

async fn wait_until_settled(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    id: &str,
    deadline: Deadline,
    absence: AbsencePolicy,
) -> Option<NodePool> {
    let retry = RetryConfig::default();
    let url = client.node_pool_url(cluster_id, id);
    let url = url.as_str();
    let spec = PollSpec::new(
        KIND,
        id,
        POLL_INTERVAL,
        vec![
            NodePoolStatus::Running,
            NodePoolStatus::RunningSchedulingDisabled,
            NodePoolStatus::Error,
        ],
    )
    .with_absence(absence);

    let (pool, ok) = poll_until(
        client,
        &retry,
        &spec,
        deadline,
        diags,
        move || async move { client.get(url).await?.json::<NodePool>() },
        |p: &NodePool| p.status,
    )
    .await;

    if !ok {
        return None;
    }

    let pool = pool?;
    if !pool.status.is_healthy() {
        diags.error(
            format!("Node pool {} entered ERROR state", pool.name),
            "The Stratus Kubernetes Engine reported the node pool as failed. \
             Check the cluster events in the console for details.",
        );
        return None;
    }

    tracing::info!("node pool {} ({}): {:?}", pool.name, pool.id, pool.status);
    Some(pool)
}
