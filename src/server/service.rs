use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{GateError, GateResult};
use crate::identity::RequestContext;
use crate::proto::{
    BatchQueryShard, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, Query, QueryResponse,
    QueryResult, QueryResultList, QueryShard, SplitQueryRequest, SplitQueryResult, SrvKeyspace,
};
use crate::session::Session;

/// Producer side of a streaming call. Each `send` is one partial result, delivered in order.
#[derive(Debug, Clone)]
pub struct StreamSink {
    tx: mpsc::UnboundedSender<QueryResult>,
}

impl StreamSink {
    pub fn new(tx: mpsc::UnboundedSender<QueryResult>) -> Self { Self { tx } }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueryResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, result: QueryResult) -> GateResult<()> {
        self.tx.send(result).map_err(|_| GateError::transport("stream consumer went away"))
    }
}

/// Server side of the gateway protocol. Bindings translate their wire format into these calls;
/// the identity of the caller arrives in `ctx`, never through the request body.
#[async_trait]
pub trait GateService: Send + Sync + 'static {
    async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResponse>;
    async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResponse>;
    async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResponse>;
    async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResponse>;
    async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResponse>;
    async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<QueryResultList>;
    async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<QueryResultList>;

    async fn stream_execute(&self, ctx: &RequestContext, req: Query, sink: StreamSink) -> GateResult<()>;
    async fn stream_execute_shard(&self, ctx: &RequestContext, req: QueryShard, sink: StreamSink) -> GateResult<()>;
    async fn stream_execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery, sink: StreamSink) -> GateResult<()>;
    async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery, sink: StreamSink) -> GateResult<()>;

    async fn begin(&self, ctx: &RequestContext) -> GateResult<Session>;
    async fn commit(&self, ctx: &RequestContext, session: Session) -> GateResult<()>;
    async fn rollback(&self, ctx: &RequestContext, session: Session) -> GateResult<()>;

    async fn split_query(&self, ctx: &RequestContext, req: SplitQueryRequest) -> GateResult<SplitQueryResult>;
    async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: String) -> GateResult<SrvKeyspace>;
}
