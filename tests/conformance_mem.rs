use std::sync::Arc;
use std::time::Duration;

use shardgate::conformance::{run_suite, ConformanceSuite};
use shardgate::conn::{mem, DialFuture, Dialer, DialerRegistry, GateConnImpl};
use shardgate::fixtures::FixtureRegistry;
use shardgate::server::{GateService, ReferenceServer};
use shardgate::GateError;

fn reference() -> Arc<ReferenceServer> {
    Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_process_binding_passes_every_scenario() {
    let server = reference();
    let service: Arc<dyn GateService> = server.clone();
    let report = run_suite(mem::dialer(service), server, "unused", Duration::from_secs(2))
        .await
        .expect("dial mem binding");
    assert!(report.passed(), "{}", report);
    assert_eq!(report.outcomes.len(), ConformanceSuite::plan().len());
}

// A binding wired to a different server than the one the suite controls never sees the fault
// modes, so every fault scenario must be reported while the normal ones still pass.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn miswired_binding_fails_fault_scenarios() {
    let controlled = reference();
    let other: Arc<dyn GateService> = reference();
    let registry = DialerRegistry::new();
    registry.register("test", mem::dialer(other));
    let conn = registry.dial("test", "", Duration::from_secs(1)).await.unwrap();
    let suite = ConformanceSuite::new(conn, controlled).with_scenario_timeout(Duration::from_millis(500));
    let report = suite.run().await;

    assert!(report.outcome("Execute/normal").unwrap().passed());
    assert!(report.outcome("Tx2Fail").unwrap().passed());
    assert!(!report.outcome("Begin/declared_error").unwrap().passed());
    assert!(!report.outcome("StreamExecuteShard2/injected_fault").unwrap().passed());
    assert!(!report.outcome("GetSrvKeyspace/declared_error").unwrap().passed());
}

#[tokio::test]
async fn dial_failure_aborts_the_suite() {
    let failing: Dialer = Arc::new(|address: String, _timeout: Duration| {
        Box::pin(async move { Err::<Arc<dyn GateConnImpl>, _>(GateError::transport(format!("refused: {}", address))) }) as DialFuture
    });
    let err = run_suite(failing, reference(), "nowhere:1", Duration::from_millis(100)).await.unwrap_err();
    assert!(err.to_string().contains("refused: nowhere:1"), "{}", err);
}
