use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;

use shardgate::conformance::{run_registered, run_suite_with_timeout};
use shardgate::conn::http as http_conn;
use shardgate::fixtures::FixtureRegistry;
use shardgate::proto::SrvKeyspace;
use shardgate::server::{http, GateService, ReferenceServer};
use shardgate::GateError;

// Aborts the server task when the test ends, pass or fail.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) { self.0.abort(); }
}

async fn start() -> (Arc<ReferenceServer>, String, AbortOnDrop) {
    let server = Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())));
    let service: Arc<dyn GateService> = server.clone();
    let (addr, handle) = http::spawn_ephemeral(service).await.expect("bind ephemeral port");
    (server, addr.to_string(), AbortOnDrop(handle))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_binding_passes_every_scenario() {
    let (server, addr, _guard) = start().await;
    let report = run_suite_with_timeout(http_conn::dialer(), server, &addr, Duration::from_secs(5), Duration::from_secs(5))
        .await
        .expect("dial http binding");
    assert!(report.passed(), "{}", report);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn suite_dials_the_configured_protocol_and_address() {
    let server = Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())));
    let service: Arc<dyn GateService> = server.clone();
    let (addr, handle) = http::spawn_at("127.0.0.1:0", service).await.expect("bind loopback");
    let _guard = AbortOnDrop(handle);

    let report = run_registered("http", server.clone(), &addr.to_string(), Duration::from_secs(5), Duration::from_secs(5))
        .await
        .expect("dial builtin http dialer");
    assert!(report.passed(), "{}", report);

    let err = run_registered("smoke-signals", server, &addr.to_string(), Duration::from_secs(1), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no dialer registered for protocol: smoke-signals"), "{}", err);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raw_rpc_carries_identity_in_the_header() {
    let (server, addr, _guard) = start().await;
    server.set_check_caller_id(true);
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/rpc/GetSrvKeyspace", addr))
        .header("x-caller-id", "test_principal/test_component/test_subcomponent")
        .json(&json!({ "keyspace": "test_keyspace" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let got: SrvKeyspace = resp.json().await.unwrap();
    assert_eq!(&got, server.fixtures().srv_keyspace());
    assert!(server.take_failures().is_empty());

    // Same call without the header: answered, but the missing identity is recorded.
    let resp = client
        .post(format!("http://{}/rpc/GetSrvKeyspace", addr))
        .json(&json!({ "keyspace": "test_keyspace" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let failures = server.take_failures();
    assert_eq!(failures.len(), 1, "{:?}", failures);
    assert!(failures[0].contains("no effective caller id"), "{:?}", failures);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_method_and_fault_statuses() {
    let (server, addr, _guard) = start().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("http://{}/rpc/Nope", addr)).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), 502);
    let err: GateError = resp.json().await.unwrap();
    assert_eq!(err.to_string(), "unknown method: Nope");

    server.set_fault_mode(shardgate::server::FaultMode::InjectedFault);
    let resp = client.post(format!("http://{}/rpc/Begin", addr)).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let err: GateError = resp.json().await.unwrap();
    assert!(err.to_string().starts_with("uncaught panic: test forced panic"), "{}", err);
}
