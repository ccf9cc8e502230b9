use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion, SamplingMode};

use shardgate::conn::{mem, DialerRegistry, GateConn};
use shardgate::fixtures::{FixtureRegistry, REQUEST1};
use shardgate::identity::RequestContext;
use shardgate::proto::Query;
use shardgate::server::{GateService, ReferenceServer};

struct BenchCtx {
    rt: tokio::runtime::Runtime,
    conn: GateConn,
    ctx: RequestContext,
    request: Query,
}

impl BenchCtx {
    fn new() -> anyhow::Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread().enable_all().worker_threads(2).build()?;
        let fixtures = Arc::new(FixtureRegistry::canonical());
        let request = fixtures
            .lookup(REQUEST1)
            .map(|c| c.query.clone())
            .ok_or_else(|| anyhow::anyhow!("request1 fixture missing"))?;
        let ctx = RequestContext::new().with_caller_id(fixtures.caller_id().clone());
        let service: Arc<dyn GateService> = Arc::new(ReferenceServer::new(fixtures));
        let registry = DialerRegistry::new();
        registry.register("mem", mem::dialer(service));
        let conn = rt.block_on(registry.dial("mem", "", Duration::from_secs(1)))?;
        Ok(Self { rt, conn, ctx, request })
    }
}

fn bench_roundtrip(c: &mut Criterion) {
    let b = BenchCtx::new().expect("bench context");
    let mut group = c.benchmark_group("mem_roundtrip");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(50);

    group.bench_function("execute", |bench| {
        bench.iter(|| {
            let res = b.rt.block_on(b.conn.execute(&b.ctx, b.request.clone()));
            criterion::black_box(res.expect("execute"));
        });
    });

    group.bench_function("stream_execute", |bench| {
        bench.iter(|| {
            let res = b.rt.block_on(async {
                let stream = b.conn.stream_execute(&b.ctx, b.request.clone()).await?;
                stream.reassemble().await
            });
            criterion::black_box(res.expect("stream_execute"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
