use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use shardgate::conn::{http as http_conn, mem, DialerRegistry, GateConn};
use shardgate::fixtures::{FixtureRegistry, REQUEST1};
use shardgate::identity::RequestContext;
use shardgate::server::{http, FaultMode, GateService, ReferenceServer, BACKEND_SENTINEL};

struct AbortOnDrop(Option<JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(h) = self.0.take() {
            h.abort();
        }
    }
}

async fn connect(over_http: bool) -> (Arc<ReferenceServer>, GateConn, AbortOnDrop) {
    let server = Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())));
    let service: Arc<dyn GateService> = server.clone();
    let registry = DialerRegistry::new();
    let (address, guard) = if over_http {
        let (addr, handle) = http::spawn_ephemeral(service).await.unwrap();
        registry.register("gate", http_conn::dialer());
        (addr.to_string(), AbortOnDrop(Some(handle)))
    } else {
        registry.register("gate", mem::dialer(service));
        (String::new(), AbortOnDrop(None))
    };
    let conn = registry.dial("gate", &address, Duration::from_secs(5)).await.unwrap();
    (server, conn, guard)
}

async fn held_stream_releases_on_demand(over_http: bool) {
    let (server, conn, _guard) = connect(over_http).await;
    let ctx = RequestContext::new();
    let req = server.fixtures().lookup(REQUEST1).unwrap().query_shard.clone();
    server.set_fault_mode(FaultMode::DeclaredError);

    let release = server.arm_release_gate();
    let mut stream = conn.stream_execute_shard2(&ctx, req).await.unwrap();
    let first = stream.next_result().await.expect("descriptor message");
    assert_eq!(&first, server.fixtures().stream_result1());

    // Nothing more arrives while the gate is held.
    let pending = tokio::time::timeout(Duration::from_millis(150), stream.next_result()).await;
    assert!(pending.is_err(), "stream advanced before release: {:?}", pending);

    release.release();
    assert!(stream.next_result().await.is_none());
    let err = stream.finish().await.unwrap_err();
    assert!(err.to_string().contains(BACKEND_SENTINEL), "{}", err);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn declared_error_stream_waits_for_release_in_process() {
    held_stream_releases_on_demand(false).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn declared_error_stream_waits_for_release_over_http() {
    held_stream_releases_on_demand(true).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unarmed_gate_fails_without_blocking() {
    let (server, conn, _guard) = connect(false).await;
    let ctx = RequestContext::new();
    let req = server.fixtures().lookup(REQUEST1).unwrap().query.clone();
    server.set_fault_mode(FaultMode::DeclaredError);

    let stream = conn.stream_execute(&ctx, req).await.unwrap();
    let (parts, status) = tokio::time::timeout(Duration::from_secs(2), stream.collect_all()).await.expect("stream hung");
    assert_eq!(parts.len(), 1);
    assert!(status.unwrap_err().to_string().contains(BACKEND_SENTINEL));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn normal_stream_reassembles_over_http() {
    let (server, conn, _guard) = connect(true).await;
    let ctx = RequestContext::new();
    let req = server.fixtures().lookup(REQUEST1).unwrap().key_range_query.clone();
    let got = conn.stream_execute_key_ranges(&ctx, req).await.unwrap().reassemble().await.unwrap();
    let want = server.fixtures().result1();
    assert_eq!(got.fields, want.fields);
    assert_eq!(got.rows, want.rows);
    assert_eq!(got.rows_affected, 0);
}
