//! In-process binding: calls the service directly through the panic boundary. Streams run as
//! their own task and are handed over through an unbounded channel plus a one-shot status.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::registry::{DialFuture, Dialer};
use super::{GateConnImpl, QueryStream};
use crate::error::{GateError, GateResult};
use crate::identity::RequestContext;
use crate::proto::{
    BatchQueryShard, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, Method, ProtocolVersion,
    Query, QueryResponse, QueryResultList, QueryShard, SplitQueryRequest, SplitQueryResult, SrvKeyspace, StreamKind,
};
use crate::server::{guarded, GateService, StreamSink};
use crate::session::Session;

pub struct MemConn {
    service: Arc<dyn GateService>,
}

impl MemConn {
    pub fn new(service: Arc<dyn GateService>) -> Self { Self { service } }
}

/// Dialer that ignores address and timeout and connects straight to `service`.
pub fn dialer(service: Arc<dyn GateService>) -> Dialer {
    Arc::new(move |_address: String, _timeout: Duration| {
        let service = service.clone();
        Box::pin(async move { Ok::<_, GateError>(Arc::new(MemConn::new(service)) as Arc<dyn GateConnImpl>) }) as DialFuture
    })
}

fn spawn_stream<F, Fut>(method: Method, ctx: &RequestContext, run: F) -> QueryStream
where
    F: FnOnce(RequestContext, StreamSink) -> Fut,
    Fut: Future<Output = GateResult<()>> + Send + 'static,
{
    let (sink, rx) = StreamSink::channel();
    let (status_tx, status_rx) = oneshot::channel();
    let ctx = ctx.clone();
    let fut = run(ctx.clone(), sink);
    tokio::spawn(async move {
        let status = guarded(method, &ctx, fut).await;
        let _ = status_tx.send(status);
    });
    QueryStream::new(rx, status_rx)
}

#[async_trait]
impl GateConnImpl for MemConn {
    async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResponse> {
        guarded(Method::Execute, ctx, self.service.execute(ctx, req)).await
    }

    async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResponse> {
        guarded(Method::ExecuteShard, ctx, self.service.execute_shard(ctx, req)).await
    }

    async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResponse> {
        guarded(Method::ExecuteKeyspaceIds, ctx, self.service.execute_keyspace_ids(ctx, req)).await
    }

    async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResponse> {
        guarded(Method::ExecuteKeyRanges, ctx, self.service.execute_key_ranges(ctx, req)).await
    }

    async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResponse> {
        guarded(Method::ExecuteEntityIds, ctx, self.service.execute_entity_ids(ctx, req)).await
    }

    async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<QueryResultList> {
        guarded(Method::ExecuteBatchShard, ctx, self.service.execute_batch_shard(ctx, req)).await
    }

    async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<QueryResultList> {
        guarded(Method::ExecuteBatchKeyspaceIds, ctx, self.service.execute_batch_keyspace_ids(ctx, req)).await
    }

    async fn stream_execute(&self, ctx: &RequestContext, version: ProtocolVersion, req: Query) -> GateResult<QueryStream> {
        let service = self.service.clone();
        Ok(spawn_stream(StreamKind::Execute.method(version), ctx, move |ctx, sink| async move {
            service.stream_execute(&ctx, req, sink).await
        }))
    }

    async fn stream_execute_shard(&self, ctx: &RequestContext, version: ProtocolVersion, req: QueryShard) -> GateResult<QueryStream> {
        let service = self.service.clone();
        Ok(spawn_stream(StreamKind::Shard.method(version), ctx, move |ctx, sink| async move {
            service.stream_execute_shard(&ctx, req, sink).await
        }))
    }

    async fn stream_execute_key_ranges(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyRangeQuery) -> GateResult<QueryStream> {
        let service = self.service.clone();
        Ok(spawn_stream(StreamKind::KeyRanges.method(version), ctx, move |ctx, sink| async move {
            service.stream_execute_key_ranges(&ctx, req, sink).await
        }))
    }

    async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyspaceIdQuery) -> GateResult<QueryStream> {
        let service = self.service.clone();
        Ok(spawn_stream(StreamKind::KeyspaceIds.method(version), ctx, move |ctx, sink| async move {
            service.stream_execute_keyspace_ids(&ctx, req, sink).await
        }))
    }

    async fn begin(&self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<Session> {
        guarded(Method::begin(version), ctx, self.service.begin(ctx)).await
    }

    async fn commit(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()> {
        guarded(Method::commit(version), ctx, self.service.commit(ctx, session)).await
    }

    async fn rollback(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()> {
        guarded(Method::rollback(version), ctx, self.service.rollback(ctx, session)).await
    }

    async fn split_query(&self, ctx: &RequestContext, req: SplitQueryRequest) -> GateResult<SplitQueryResult> {
        guarded(Method::SplitQuery, ctx, self.service.split_query(ctx, req)).await
    }

    async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: &str) -> GateResult<SrvKeyspace> {
        guarded(Method::GetSrvKeyspace, ctx, self.service.get_srv_keyspace(ctx, keyspace.to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureRegistry, REQUEST1};
    use crate::server::{FaultMode, ReferenceServer};

    #[tokio::test]
    async fn stream_panic_reaches_terminal_status() {
        let server = Arc::new(ReferenceServer::new(Arc::new(FixtureRegistry::canonical())));
        server.set_fault_mode(FaultMode::InjectedFault);
        let conn = MemConn::new(server.clone());
        let ctx = RequestContext::new();
        let req = server.fixtures().lookup(REQUEST1).unwrap().query.clone();
        let stream = conn.stream_execute(&ctx, ProtocolVersion::V2, req).await.unwrap();
        let (parts, status) = stream.collect_all().await;
        assert!(parts.is_empty());
        let msg = status.unwrap_err().to_string();
        assert!(msg.contains("test forced panic") && msg.contains("uncaught panic"));
    }
}
