//! Scheduled scaling resource
//!
//! A scheduled scaling rule resizes a node pool on a cron schedule,
//! optionally bounded to a start/end window. Rules are validated and
//! activated asynchronously by the Kubernetes Engine scheduler.

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

const KIND: &str = "scheduled scaling";

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Scheduled scaling rule status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Pending,
    Enabled,
    Disabled,
    Error,
}

/// A scheduled scaling rule on a node pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledScaling {
    pub id: String,
    pub name: String,
    pub status: ScheduleStatus,
    /// Cron expression in the cluster's timezone
    pub schedule: String,
    pub desired_node_count: u32,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

/// Planned scheduled scaling configuration from Terraform
#[derive(Debug, Clone)]
pub struct ScheduledScalingPlan {
    pub name: String,
    pub schedule: String,
    pub desired_node_count: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl ScheduledScalingPlan {
    fn request_body(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "schedule": self.schedule,
            "desired_node_count": self.desired_node_count,
            "starts_at": self.starts_at,
            "ends_at": self.ends_at,
        })
    }
}

fn schedules_url(client: &ApiClient, cluster_id: &str, pool_id: &str) -> String {
    client.kubernetes_url(&format!(
        "clusters/{}/nodepools/{}/schedules",
        cluster_id, pool_id
    ))
}

fn schedule_url(client: &ApiClient, cluster_id: &str, pool_id: &str, id: &str) -> String {
    format!("{}/{}", schedules_url(client, cluster_id, pool_id), id)
}

/// Create a scheduled scaling rule and wait until the scheduler enables it.
pub async fn create(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    pool_id: &str,
    plan: &ScheduledScalingPlan,
    timeout: Duration,
) -> Option<ScheduledScaling> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = schedules_url(client, cluster_id, pool_id);
    let body = plan.request_body();
    let (url, body) = (url.as_str(), &body);

    let created: ScheduledScaling = match execute(
        client,
        &retry,
        deadline,
        diags,
        "create scheduled scaling",
        move || async move { client.post(url, Some(body)).await?.json() },
    )
    .await
    {
        Ok(rule) => rule,
        Err(_) => return None,
    };

    wait_until_enabled(
        client,
        diags,
        cluster_id,
        pool_id,
        &created.id,
        deadline,
        AbsencePolicy::RetryUntilVisible,
    )
    .await
}

/// Read the rule. `None` without an appended error means it is gone.
pub async fn read(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    pool_id: &str,
    id: &str,
    timeout: Duration,
) -> Option<ScheduledScaling> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = schedule_url(client, cluster_id, pool_id, id);
    let url = url.as_str();

    match execute(
        client,
        &retry,
        deadline,
        diags,
        "read scheduled scaling",
        move || async move { client.get(url).await?.json::<ScheduledScaling>() },
    )
    .await
    {
        Ok(rule) => Some(rule),
        Err(err) if err.is_not_found() => None,
        Err(_) => None,
    }
}

/// Replace the rule's schedule and size and wait until it is enabled again.
pub async fn update(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    pool_id: &str,
    id: &str,
    plan: &ScheduledScalingPlan,
    timeout: Duration,
) -> Option<ScheduledScaling> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = schedule_url(client, cluster_id, pool_id, id);
    let body = plan.request_body();
    let (url, body) = (url.as_str(), &body);

    let result: Result<serde_json::Value, ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "update scheduled scaling",
        move || async move { Ok(client.put(url, Some(body)).await?.body) },
    )
    .await;
    if result.is_err() {
        return None;
    }

    wait_until_enabled(
        client,
        diags,
        cluster_id,
        pool_id,
        id,
        deadline,
        AbsencePolicy::Fail,
    )
    .await
}

/// Delete the rule and wait until it is gone. Returns whether it is safe to
/// remove the rule from state.
pub async fn delete(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    pool_id: &str,
    id: &str,
    timeout: Duration,
) -> bool {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = schedule_url(client, cluster_id, pool_id, id);
    let url = url.as_str();

    let result: Result<(), ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "delete scheduled scaling",
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

async fn wait_until_enabled(
    client: &ApiClient,
    diags: &mut Diagnostics,
    cluster_id: &str,
    pool_id: &str,
    id: &str,
    deadline: Deadline,
    absence: AbsencePolicy,
) -> Option<ScheduledScaling> {
    let retry = RetryConfig::default();
    let url = schedule_url(client, cluster_id, pool_id, id);
    let url = url.as_str();
    let spec = PollSpec::new(
        KIND,
        id,
        POLL_INTERVAL,
        vec![ScheduleStatus::Enabled, ScheduleStatus::Error],
    )
    .with_absence(absence);

    let (rule, ok) = poll_until(
        client,
        &retry,
        &spec,
        deadline,
        diags,
        move || async move { client.get(url).await?.json::<ScheduledScaling>() },
        |r: &ScheduledScaling| r.status,
    )
    .await;

    if !ok {
        return None;
    }

    let rule = rule?;
    if rule.status == ScheduleStatus::Error {
        diags.error(
            format!("Scheduled scaling rule {} was rejected", rule.name),
            "The scheduler could not activate the rule. Check the cron \
             expression and the start/end window.",
        );
        return None;
    }

    tracing::info!("scheduled scaling {} ({}): enabled", rule.name, rule.id);
    Some(rule)
}
