//! HTTP API integration tests
//!
//! Boots a full hub (registry, supervisor, publisher, dispatcher, HTTP
//! server) on an OS-assigned port and drives it with reqwest the way
//! the CLI does.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use mr_core::api::{
    CreateInstanceResponse, ErrorBody, HubStatus, InstanceStatusInfo, InstanceSummary, PairingInfo,
    SendMessageResponse,
};
use mr_core::config::HubConfig;
use mr_core::traits::TransportFactory;
use mr_core::types::{InstanceId, InstanceStatus};
use mr_hub::session::supervisor::run_supervisor;
use mr_hub::transport::SimTransportFactory;
use mr_hub::{http, publish, HubState};

fn test_config() -> HubConfig {
    let mut config = HubConfig::default();
    config.reconnect_delay = Duration::from_millis(50);
    config.dispatch.poll_interval = Duration::from_millis(100);
    config.dispatch.pending_age_threshold = Duration::from_millis(50);
    config
}

struct TestHub {
    state: Arc<HubState>,
    factory: Arc<SimTransportFactory>,
    base_url: String,
    cancel: CancellationToken,
}

impl TestHub {
    async fn spawn() -> Self {
        let factory = Arc::new(SimTransportFactory::manual());
        let state = HubState::new(
            test_config(),
            Arc::clone(&factory) as Arc<dyn TransportFactory>,
        );
        let cancel = CancellationToken::new();

        tokio::spawn(run_supervisor(
            Arc::clone(&state.registry),
            state.config.reconnect_delay,
            cancel.clone(),
        ));
        tokio::spawn(publish::run_status_publisher(
            Arc::clone(&state.registry),
            Arc::clone(&state.instances),
            cancel.clone(),
        ));
        tokio::spawn(Arc::clone(&state.dispatcher).run(cancel.clone()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("Failed to read test address");
        tokio::spawn(http::serve(Arc::clone(&state), listener, cancel.clone()));

        Self {
            state,
            factory,
            base_url: format!("http://{}", addr),
            cancel,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create an instance over HTTP and return its ID
    async fn create_instance(&self, client: &reqwest::Client, id: &str) -> CreateInstanceResponse {
        let response = client
            .post(self.url("/instances"))
            .json(&serde_json::json!({ "instanceId": id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    /// Drive the instance to connected through the sim controller
    async fn connect_instance(&self, id: &str, address: &str) {
        let controller = self
            .factory
            .controller(&InstanceId::new(id))
            .expect("controller missing");
        controller.emit_ready(address).await;
        self.wait_for_status(id, InstanceStatus::Connected).await;
    }

    async fn wait_for_status(&self, id: &str, want: InstanceStatus) {
        let id = InstanceId::new(id);
        for _ in 0..100 {
            if let Some(entry) = self.state.registry.get(&id) {
                if entry.handle.status() == want {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("instance {} never reached {}", id, want);
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn test_create_list_and_status_flow() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    let created = hub.create_instance(&client, "api-a").await;
    assert_eq!(created.instance_id, "api-a");
    assert_eq!(created.status, InstanceStatus::Connecting);

    // No pairing artifact yet
    let pairing: PairingInfo = client
        .get(hub.url("/instances/api-a/qr"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(pairing.pairing_artifact.is_none());
    assert!(!pairing.is_connected);

    let controller = hub
        .factory
        .controller(&InstanceId::new("api-a"))
        .expect("controller missing");
    controller.emit_pairing("CODE42").await;
    hub.wait_for_status("api-a", InstanceStatus::AwaitingPairing)
        .await;

    let pairing: PairingInfo = client
        .get(hub.url("/instances/api-a/qr"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pairing.pairing_artifact.as_deref(), Some("CODE42"));

    controller.emit_ready("+15550001111").await;
    hub.wait_for_status("api-a", InstanceStatus::Connected).await;

    let status: InstanceStatusInfo = client
        .get(hub.url("/instances/api-a/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status.status, InstanceStatus::Connected);
    assert!(status.connected);
    assert_eq!(status.bound_address.as_deref(), Some("+15550001111"));
    assert!(status.last_transition_at > 0);

    let instances: Vec<InstanceSummary> = client
        .get(hub.url("/instances"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
    assert!(instances[0].is_connected);
    assert!(!instances[0].has_pairing_artifact);
}

#[tokio::test]
async fn test_duplicate_create_is_rejected() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-dup").await;

    let response = client
        .post(hub.url("/instances"))
        .json(&serde_json::json!({ "instanceId": "api-dup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "already_exists");
}

#[tokio::test]
async fn test_create_generates_id_when_absent() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(hub.url("/instances"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: CreateInstanceResponse = response.json().await.unwrap();
    assert_eq!(created.instance_id.len(), 12);
}

#[tokio::test]
async fn test_create_rejects_blank_id() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(hub.url("/instances"))
        .json(&serde_json::json!({ "instanceId": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "invalid_request");
}

#[tokio::test]
async fn test_unknown_instance_is_404() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    for path in [
        "/instances/ghost/qr",
        "/instances/ghost/status",
    ] {
        let response = client.get(hub.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{}", path);
    }

    for path in ["/instances/ghost/reset", "/instances/ghost/disconnect"] {
        let response = client.post(hub.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{}", path);
    }
}

#[tokio::test]
async fn test_disconnect_removes_the_instance() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-gone").await;

    let response = client
        .post(hub.url("/instances/api-gone/disconnect"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    // Second disconnect finds nothing
    let response = client
        .post(hub.url("/instances/api-gone/disconnect"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let instances: Vec<InstanceSummary> = client
        .get(hub.url("/instances"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(instances.is_empty());
}

#[tokio::test]
async fn test_reset_replaces_the_session() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-reset").await;
    let old_controller = hub
        .factory
        .controller(&InstanceId::new("api-reset"))
        .expect("controller missing");
    hub.connect_instance("api-reset", "+15550002222").await;

    let response = client
        .post(hub.url("/instances/api-reset/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reset: CreateInstanceResponse = response.json().await.unwrap();
    assert_eq!(reset.instance_id, "api-reset");
    assert_eq!(reset.status, InstanceStatus::Connecting);

    assert!(old_controller.is_destroyed());

    // The replacement session pairs from scratch
    let status: InstanceStatusInfo = client
        .get(hub.url("/instances/api-reset/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status.bound_address.is_none());
}

#[tokio::test]
async fn test_hub_status_buckets() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-s1").await;
    hub.create_instance(&client, "api-s2").await;
    hub.connect_instance("api-s2", "+15550003333").await;

    for path in ["/status", "/health"] {
        let status: HubStatus = client
            .get(hub.url(path))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(status.running, "{}", path);
        assert_eq!(status.instance_count, 2, "{}", path);
        assert_eq!(status.connected, 1, "{}", path);
        assert_eq!(status.pending, 1, "{}", path);
    }
}

#[tokio::test]
async fn test_send_message_through_connected_instance() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-send").await;
    hub.connect_instance("api-send", "+15550004444").await;

    let response = client
        .post(hub.url("/send-message"))
        .json(&serde_json::json!({
            "instanceId": "api-send",
            "targetAddress": "+15550009999",
            "content": "hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let sent: SendMessageResponse = response.json().await.unwrap();
    assert!(sent.success);
    assert!(sent.provider_message_id.is_some());

    let controller = hub
        .factory
        .controller(&InstanceId::new("api-send"))
        .expect("controller missing");
    let delivered = controller.sent_messages();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].target, "+15550009999");
    assert_eq!(delivered[0].content, "hello");
}

#[tokio::test]
async fn test_send_message_error_mapping() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    // Unknown instance
    let response = client
        .post(hub.url("/send-message"))
        .json(&serde_json::json!({
            "instanceId": "ghost",
            "targetAddress": "+1",
            "content": "hi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Known but not connected
    hub.create_instance(&client, "api-cold").await;
    let response = client
        .post(hub.url("/send-message"))
        .json(&serde_json::json!({
            "instanceId": "api-cold",
            "targetAddress": "+1",
            "content": "hi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "not_connected");

    // Blank target
    let response = client
        .post(hub.url("/send-message"))
        .json(&serde_json::json!({
            "instanceId": "api-cold",
            "targetAddress": "  ",
            "content": "hi"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_send_message_rejects_reused_id() {
    let hub = TestHub::spawn().await;
    let client = reqwest::Client::new();

    hub.create_instance(&client, "api-idem").await;
    hub.connect_instance("api-idem", "+15550005555").await;

    let body = serde_json::json!({
        "instanceId": "api-idem",
        "targetAddress": "+15550008888",
        "content": "once",
        "messageId": "msg-fixed"
    });

    let response = client
        .post(hub.url("/send-message"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(hub.url("/send-message"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: ErrorBody = response.json().await.unwrap();
    assert_eq!(error.error, "already_exists");
}
