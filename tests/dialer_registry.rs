use std::sync::Arc;
use std::time::Duration;

use shardgate::conn::{self, default_registry, mem, DialFuture, Dialer, DialerRegistry, GateConnImpl};
use shardgate::fixtures::FixtureRegistry;
use shardgate::identity::RequestContext;
use shardgate::server::{GateService, ReferenceServer};

fn reference() -> Arc<dyn GateService> {
    Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())))
}

#[tokio::test]
async fn builtin_http_dialer_is_always_present() {
    assert!(default_registry().names().contains(&"http".to_string()));
}

#[tokio::test]
async fn registered_dialer_is_reachable_by_name() {
    conn::register_dialer("mem-registry-test", mem::dialer(reference()));
    let gate = conn::dial("mem-registry-test", "", Duration::from_secs(1)).await.unwrap();
    let keyspace = gate.get_srv_keyspace(&RequestContext::new(), "test_keyspace").await.unwrap();
    assert_eq!(keyspace.split_shard_count, 128);
}

#[tokio::test]
async fn slow_dialer_hits_the_timeout() {
    let slow: Dialer = Arc::new(|_address: String, _timeout: Duration| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, shardgate::GateError>(Arc::new(mem::MemConn::new(reference())) as Arc<dyn GateConnImpl>)
        }) as DialFuture
    });
    let registry = DialerRegistry::new();
    registry.register("slow", slow);
    let err = registry.dial("slow", "somewhere", Duration::from_millis(50)).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{}", err);
}

#[tokio::test]
async fn http_dialer_reports_unreachable_servers() {
    let registry = DialerRegistry::with_builtin();
    // Port 9 (discard) is not served on loopback in test environments.
    let err = registry.dial("http", "127.0.0.1:9", Duration::from_secs(2)).await.unwrap_err();
    assert!(err.to_string().starts_with("http: ") || err.to_string().contains("timed out"), "{}", err);
}
