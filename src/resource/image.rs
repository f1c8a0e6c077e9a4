//! Machine image resource
//!
//! Images are imported from a source URL: the create call registers the
//! image and the image service pulls the bits in the background, moving the
//! image through `queued`/`saving` before it becomes `active` (or `killed`
//! on a failed import).

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

const KIND: &str = "image";

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Image lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Queued,
    Saving,
    Active,
    Killed,
    Deleted,
    PendingDelete,
}

/// A machine image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub status: ImageStatus,
    pub visibility: String,
    pub disk_format: String,
    pub container_format: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Planned image configuration from Terraform
#[derive(Debug, Clone)]
pub struct ImagePlan {
    pub name: String,
    pub visibility: String,
    pub disk_format: String,
    pub container_format: String,
    pub source_url: String,
    pub tags: Vec<String>,
}

/// Register an image and wait until the import completes.
pub async fn create(
    client: &ApiClient,
    diags: &mut Diagnostics,
    plan: &ImagePlan,
    timeout: Duration,
) -> Option<Image> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.image_url("images");
    let body = json!({
        "name": plan.name,
        "visibility": plan.visibility,
        "disk_format": plan.disk_format,
        "container_format": plan.container_format,
        "import_url": plan.source_url,
        "tags": plan.tags,
    });
    let (url, body) = (url.as_str(), &body);

    let created: Image = match execute(
        client,
        &retry,
        deadline,
        diags,
        "create image",
        move || async move { client.post(url, Some(body)).await?.json() },
    )
    .await
    {
        Ok(image) => image,
        Err(_) => return None,
    };

    tracing::info!("image {} ({}): import started", created.name, created.id);

    let poll_url = client.image_url(&format!("images/{}", created.id));
    let poll_url = poll_url.as_str();
    let spec = PollSpec::new(
        KIND,
        created.id.clone(),
        POLL_INTERVAL,
        vec![ImageStatus::Active, ImageStatus::Killed],
    );

    let (image, ok) = poll_until(
        client,
        &retry,
        &spec,
        deadline,
        diags,
        move || async move { client.get(poll_url).await?.json::<Image>() },
        |i: &Image| i.status,
    )
    .await;

    if !ok {
        return None;
    }

    let image = image?;
    if image.status == ImageStatus::Killed {
        diags.error(
            format!("Image {} import failed", image.name),
            format!(
                "The image service could not import from {}. The image is in \
                 the killed state and must be recreated.",
                plan.source_url
            ),
        );
        return None;
    }

    tracing::info!("image {} ({}): active", image.name, image.id);
    Some(image)
}

/// Read the current image state. `None` without an appended error means the
/// image is gone.
pub async fn read(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    timeout: Duration,
) -> Option<Image> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.image_url(&format!("images/{}", id));
    let url = url.as_str();

    match execute(
        client,
        &retry,
        deadline,
        diags,
        "read image",
        move || async move { client.get(url).await?.json::<Image>() },
    )
    .await
    {
        Ok(image) => Some(image),
        Err(err) if err.is_not_found() => {
            tracing::info!("image {}: no longer exists, dropping from state", id);
            None
        }
        Err(_) => None,
    }
}

/// Update mutable image attributes. Attribute updates apply synchronously.
pub async fn update(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    name: &str,
    visibility: &str,
    tags: &[String],
    timeout: Duration,
) -> Option<Image> {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();

    let url = client.image_url(&format!("images/{}", id));
    let body = json!({
        "name": name,
        "visibility": visibility,
        "tags": tags,
    });
    let (url, body) = (url.as_str(), &body);

    execute(
        client,
        &retry,
        deadline,
        diags,
        "update image",
        move || async move { client.put(url, Some(body)).await?.json::<Image>() },
    )
    .await
    .ok()
}

/// Delete an image and wait until it is gone. Returns whether it is safe to
/// remove the image from state.
pub async fn delete(
    client: &ApiClient,
    diags: &mut Diagnostics,
    id: &str,
    timeout: Duration,
) -> bool {
    let deadline = Deadline::after(timeout);
    let retry = RetryConfig::default();
    let url = client.image_url(&format!("images/{}", id));
    let url = url.as_str();

    let result: Result<(), ApiError> = execute(
        client,
        &retry,
        deadline,
        diags,
        "delete image",
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
