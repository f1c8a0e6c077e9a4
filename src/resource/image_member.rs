//! Image-sharing membership resource
//!
//! A membership grants another tenant access to a private image. The owning
//! tenant creates the membership (status `pending`); the receiving tenant
//! accepts or rejects it. Membership records propagate asynchronously, so
//! creation polls until the record is visible.

use crate::api::error::ApiError;
use crate::api::ApiClient;
use crate::diag::Diagnostics;
use crate::reconcile::{
    execute, poll_until, poll_until_deletion, Deadline, PollSpec, RetryConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const KIND: &str = "image member";

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Accepted,
    Rejected,
}

/// An image-sharing membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMember {
    pub image_id: String,
    pub member_id: String,
    pub status: MemberStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Share an image with another tenant and wait until the membership record
/// is visible.
pub async fn create(
    client: &ApiClient,
    diags: &mut Diagnostics,
    image_id: &str,
    member_id: &str,
    timeout: Duration,
) -> Option<ImageMember> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.image_url(&format!("images/{}/members", image_id));
    let body = json!({ "member": member_id });
    let (url, body) = (url.as_str(), &body);

    let result: Result<ImageMember, ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "create image member",
        move || async move { client.post(url, Some(body)).await?.json() },
    )
    .await;
    if result.is_err() {
        return None;
    }

    tracing::info!("image {}: shared with tenant {}", image_id, member_id);

    let member_url = client.image_member_url(image_id, member_id);
    let member_url = member_url.as_str();
    let spec = PollSpec::new(
        KIND,
        format!("{}/{}", image_id, member_id),
        POLL_INTERVAL,
        vec![
            MemberStatus::Pending,
            MemberStatus::Accepted,
            MemberStatus::Rejected,
        ],
    );

    let (member, ok) = poll_until(
        client,
        &retry,
        &spec,
        deadline,
        diags,
        move || async move { client.get(member_url).await?.json::<ImageMember>() },
        |m: &ImageMember| m.status,
    )
    .await;

    if !ok {
        return None;
    }
    member
}

/// Read the membership. `None` without an appended error means it is gone.
pub async fn read(
    client: &ApiClient,
    diags: &mut Diagnostics,
    image_id: &str,
    member_id: &str,
    timeout: Duration,
) -> Option<ImageMember> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.image_member_url(image_id, member_id);
    let url = url.as_str();

    match execute(
        client,
        &retry,
        deadline,
        diags,
        "read image member",
        move || async move { client.get(url).await?.json::<ImageMember>() },
    )
    .await
    {
        Ok(member) => Some(member),
        Err(err) if err.is_not_found() => None,
        Err(_) => None,
    }
}

/// Change the membership status (accept or reject a pending share).
pub async fn update_status(
    client: &ApiClient,
    diags: &mut Diagnostics,
    image_id: &str,
    member_id: &str,
    status: MemberStatus,
    timeout: Duration,
) -> Option<ImageMember> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.image_member_url(image_id, member_id);
    let body = json!({ "status": status });
    let (url, body) = (url.as_str(), &body);

    execute(
        client,
        &retry,
        deadline,
        diags,
        "update image member",
        move || async move { client.put(url, Some(body)).await?.json::<ImageMember>() },
    )
    .await
    .ok()
}

/// Revoke a membership and wait until the record is gone. Returns whether it
/// is safe to remove the membership from state.
pub async fn delete(
    client: &ApiClient,
    diags: &mut Diagnostics,
    image_id: &str,
    member_id: &str,
    timeout: Duration,
) -> bool {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.image_member_url(image_id, member_id);
    let url = url.as_str();

    let result: Result<(), ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "delete image member",
        move || async move { client.delete(url).await.map(|_| ()) },
    )
    .await;
    match result {
        Ok(()) => {}
        Err(err) if err.is_not_found() => return true,
        Err(_) => return false,
    }

    let id = format!("{}/{}", image_id, member_id);
    poll_until_deletion(KIND, &id, POLL_INTERVAL, deadline, diags, move || async move {
        client.get(url).await.map(|_| false)
    })
    .await;

    true
}
