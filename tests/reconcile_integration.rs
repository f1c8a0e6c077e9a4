//! Integration tests for the reconciliation engine using wiremock
//!
//! These tests drive the executor, the pollers, and the resource handlers
//! against mocked Stratus endpoints, verifying token refresh behavior,
//! bounded retries, and absence handling end to end.

use serde_json::json;
use std::time::Duration;
use stratus_provider::api::error::ApiError;
use stratus_provider::api::ApiClient;
use stratus_provider::config::ProviderConfig;
use stratus_provider::diag::Diagnostics;
use stratus_provider::reconcile::{execute, Deadline, RetryConfig};
use stratus_provider::resource::{cluster, image, image_member, node_pool, scheduled_scaling};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Opt-in test logging via RUST_LOG
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(server_uri: &str) -> ProviderConfig {
    ProviderConfig {
        access_key: "test-access".to_string(),
        secret_key: "test-secret".to_string(),
        region: "kr1".to_string(),
        identity_endpoint: Some(format!("{}/v1", server_uri)),
        kubernetes_endpoint: Some(format!("{}/v1", server_uri)),
        image_endpoint: Some(format!("{}/v2", server_uri)),
    }
}

fn token_response(token_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token": {
            "id": token_id,
            "expires_at": "2099-01-01T00:00:00Z"
        }
    }))
}

/// Mount an identity mock that always issues the same token
async fn mount_identity(server: &MockServer, token_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/tokens"))
        .respond_with(token_response(token_id))
        .mount(server)
        .await;
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
    }
}

/// Test that the issued token is attached to authenticated requests
#[tokio::test]
async fn test_token_issued_and_attached() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1"))
        .and(header("X-Auth-Token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-1",
            "name": "prod",
            "status": "RUNNING",
            "version": "1.29.4",
            "zone": "kr1-a"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let response = client.get(&client.cluster_url("c-1")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body["name"], "prod");
}

/// An auth-expiry response triggers exactly one credential refresh, after
/// which the operation succeeds
#[tokio::test]
async fn test_auth_expiry_triggers_single_refresh() {
    init_tracing();
    let server = MockServer::start().await;

    // First issuance returns a token the API will reject
    Mock::given(method("POST"))
        .and(path("/v1/tokens"))
        .respond_with(token_response("tok-stale"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/tokens"))
        .respond_with(token_response("tok-fresh"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1"))
        .and(header("X-Auth-Token", "tok-stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "token expired"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1"))
        .and(header("X-Auth-Token", "tok-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();
    let url = client.cluster_url("c-1");
    let (client, url) = (&client, url.as_str());

    let result = execute(
        client,
        &fast_retry(),
        Deadline::after(Duration::from_secs(10)),
        &mut diags,
        "read cluster",
        move || async move { Ok(client.get(url).await?.body) },
    )
    .await;

    assert_eq!(result.unwrap()["id"], "c-1");
    assert!(diags.is_empty());
    server.verify().await;
}

/// A second auth failure after the refresh is fatal - no refresh loop
#[tokio::test]
async fn test_second_auth_failure_is_fatal() {
    let server = MockServer::start().await;

    // Initial issuance plus exactly one refresh, never a third
    Mock::given(method("POST"))
        .and(path("/v1/tokens"))
        .respond_with(token_response("tok-1"))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "token expired"}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();
    let url = client.cluster_url("c-1");
    let (client, url) = (&client, url.as_str());

    let result = execute(
        client,
        &fast_retry(),
        Deadline::after(Duration::from_secs(10)),
        &mut diags,
        "read cluster",
        move || async move { Ok(client.get(url).await?.body) },
    )
    .await;

    assert!(result.unwrap_err().is_auth_expired());
    assert!(diags.has_error());
    server.verify().await;
}

/// A permanently unavailable endpoint is retried a bounded number of times
/// and the final error is surfaced unchanged
#[tokio::test]
async fn test_persistent_503_exhausts_attempts() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "service unavailable"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();
    let url = client.cluster_url("c-1");
    let (client, url) = (&client, url.as_str());

    let result = execute(
        client,
        &fast_retry(),
        Deadline::after(Duration::from_secs(10)),
        &mut diags,
        "read cluster",
        move || async move { Ok(client.get(url).await?.body) },
    )
    .await;

    assert_eq!(result.unwrap_err().status(), Some(503));
    assert_eq!(diags.error_count(), 1);
    server.verify().await;
}

/// Client errors other than auth expiry are not retried
#[tokio::test]
async fn test_400_is_not_retried() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "version 9.99 is not supported"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();
    let url = client.kubernetes_url("clusters");
    let (client, url) = (&client, url.as_str());

    let result: Result<serde_json::Value, ApiError> = execute(
        client,
        &fast_retry(),
        Deadline::after(Duration::from_secs(10)),
        &mut diags,
        "create cluster",
        move || async move { Ok(client.post(url, Some(&json!({"name": "x"}))).await?.body) },
    )
    .await;

    assert_eq!(result.unwrap_err().status(), Some(400));
    assert_eq!(diags.error_count(), 1);
    server.verify().await;
}

/// Full create flow: POST accepted, first status fetch already running
#[tokio::test]
async fn test_cluster_create_happy_path() {
    init_tracing();
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "c-42",
            "name": "prod",
            "status": "CREATING",
            "version": "1.29.4",
            "zone": "kr1-a"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-42",
            "name": "prod",
            "status": "RUNNING",
            "version": "1.29.4",
            "zone": "kr1-a",
            "api_endpoint": "https://c-42.ske.kr1.api.stratus.cloud"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let plan = cluster::ClusterPlan {
        name: "prod".to_string(),
        version: "1.29.4".to_string(),
        zone: "kr1-a".to_string(),
        subnet_id: None,
    };
    let created = cluster::create(&client, &mut diags, &plan, Duration::from_secs(30)).await;

    let created = created.expect("cluster should be created");
    assert_eq!(created.id, "c-42");
    assert_eq!(created.status, cluster::ClusterStatus::Running);
    assert!(diags.is_empty());
}

/// A cluster that settles in ERROR is reported as a failure, not a success
#[tokio::test]
async fn test_cluster_create_error_state_is_classified() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "c-43",
            "name": "broken",
            "status": "CREATING",
            "version": "1.29.4",
            "zone": "kr1-a"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c-43",
            "name": "broken",
            "status": "ERROR",
            "version": "1.29.4",
            "zone": "kr1-a"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let plan = cluster::ClusterPlan {
        name: "broken".to_string(),
        version: "1.29.4".to_string(),
        zone: "kr1-a".to_string(),
        subnet_id: None,
    };
    let created = cluster::create(&client, &mut diags, &plan, Duration::from_secs(30)).await;

    assert!(created.is_none());
    assert!(diags.has_error());
    let summary = &diags.iter().next().unwrap().summary;
    assert!(summary.contains("ERROR"), "got: {}", summary);
}

/// Reading a deleted cluster reports drift (None) without a diagnostic
#[tokio::test]
async fn test_read_absent_cluster_is_drift() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "cluster not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let state = cluster::read(&client, &mut diags, "c-gone", Duration::from_secs(10)).await;

    assert!(state.is_none());
    assert!(diags.is_empty());
}

/// Deleting an image confirms absence via the first 404
#[tokio::test]
async fn test_image_delete_confirms_absence() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("DELETE"))
        .and(path("/v2/images/img-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/images/img-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "image not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let removed = image::delete(&client, &mut diags, "img-1", Duration::from_secs(30)).await;

    assert!(removed);
    assert!(diags.is_empty());
    server.verify().await;
}

/// Deleting an already-deleted node pool succeeds without polling
#[tokio::test]
async fn test_node_pool_delete_tolerates_already_gone() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("DELETE"))
        .and(path("/v1/clusters/c-1/nodepools/np-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "node pool not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let removed =
        node_pool::delete(&client, &mut diags, "c-1", "np-1", Duration::from_secs(30)).await;

    assert!(removed);
    assert!(diags.is_empty());
    server.verify().await;
}

/// Node pool scaling polls until the pool settles again
#[tokio::test]
async fn test_node_pool_scale_settles() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("PUT"))
        .and(path("/v1/clusters/c-1/nodepools/np-1"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "id": "np-1",
            "name": "workers",
            "status": "SCALING",
            "node_count": 5,
            "flavor": "m2.large"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1/nodepools/np-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "np-1",
            "name": "workers",
            "status": "RUNNING",
            "node_count": 8,
            "flavor": "m2.large"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let pool =
        node_pool::scale(&client, &mut diags, "c-1", "np-1", 8, Duration::from_secs(30)).await;

    let pool = pool.expect("scale should settle");
    assert_eq!(pool.node_count, 8);
    assert_eq!(pool.status, node_pool::NodePoolStatus::Running);
    assert!(diags.is_empty());
}

/// Image import completes once the image reports active
#[tokio::test]
async fn test_image_create_waits_for_import() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v2/images"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "img-7",
            "name": "ubuntu-24.04",
            "status": "queued",
            "visibility": "private",
            "disk_format": "qcow2",
            "container_format": "bare"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/images/img-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "img-7",
            "name": "ubuntu-24.04",
            "status": "active",
            "visibility": "private",
            "disk_format": "qcow2",
            "container_format": "bare",
            "size_bytes": 2147483648u64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let plan = image::ImagePlan {
        name: "ubuntu-24.04".to_string(),
        visibility: "private".to_string(),
        disk_format: "qcow2".to_string(),
        container_format: "bare".to_string(),
        source_url: "https://mirror.example.com/ubuntu-24.04.qcow2".to_string(),
        tags: vec!["base".to_string()],
    };
    let created = image::create(&client, &mut diags, &plan, Duration::from_secs(30)).await;

    let created = created.expect("image should become active");
    assert_eq!(created.status, image::ImageStatus::Active);
    assert!(diags.is_empty());
}

/// Scheduled scaling creation waits for the scheduler to enable the rule
#[tokio::test]
async fn test_scheduled_scaling_create_waits_for_enabled() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v1/clusters/c-1/nodepools/np-1/schedules"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ss-1",
            "name": "weekday-scale-up",
            "status": "PENDING",
            "schedule": "0 8 * * 1-5",
            "desired_node_count": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/clusters/c-1/nodepools/np-1/schedules/ss-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ss-1",
            "name": "weekday-scale-up",
            "status": "ENABLED",
            "schedule": "0 8 * * 1-5",
            "desired_node_count": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let plan = scheduled_scaling::ScheduledScalingPlan {
        name: "weekday-scale-up".to_string(),
        schedule: "0 8 * * 1-5".to_string(),
        desired_node_count: 10,
        starts_at: None,
        ends_at: None,
    };
    let created = scheduled_scaling::create(
        &client,
        &mut diags,
        "c-1",
        "np-1",
        &plan,
        Duration::from_secs(30),
    )
    .await;

    let created = created.expect("rule should be enabled");
    assert_eq!(created.status, scheduled_scaling::ScheduleStatus::Enabled);
    assert!(diags.is_empty());
}

/// Membership creation tolerates propagation delay: the record 404s once
/// before becoming visible
#[tokio::test]
async fn test_image_member_create_waits_for_visibility() {
    let server = MockServer::start().await;
    mount_identity(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/v2/images/img-1/members"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "image_id": "img-1",
            "member_id": "tenant-b",
            "status": "pending"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/images/img-1/members/tenant-b"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "member not found"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/images/img-1/members/tenant-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_id": "img-1",
            "member_id": "tenant-b",
            "status": "pending"
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&test_config(&server.uri())).unwrap();
    let mut diags = Diagnostics::new();

    let member = image_member::create(
        &client,
        &mut diags,
        "img-1",
        "tenant-b",
        Duration::from_secs(30),
    )
    .await;

    let member = member.expect("membership should become visible");
    assert_eq!(member.status, image_member::MemberStatus::Pending);
    assert!(diags.is_empty());
}
