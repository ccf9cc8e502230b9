//! Client facade of the gateway protocol.
//!
//! `GateConn` is what callers use: one method per protocol operation, identity lifted from the
//! `RequestContext` automatically. Underneath sits a `GateConnImpl` supplied by a transport
//! binding (`mem` for in-process, `http` for HTTP/WebSocket), obtained through the dialer registry.

pub mod stream;
pub mod tx;
pub mod registry;
pub mod mem;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GateResult;
use crate::identity::RequestContext;
use crate::proto::{
    BatchQueryShard, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, ProtocolVersion, Query,
    QueryResponse, QueryResult, QueryResultList, QueryShard, Routed, SplitQueryRequest, SplitQueryResult,
    SrvKeyspace,
};
use crate::session::Session;

pub use registry::{default_registry, dial, register_dialer, DialFuture, Dialer, DialerRegistry};
pub use stream::QueryStream;
pub use tx::GateTx;

/// Transport side of the facade. Requests arrive with the caller identity already stamped in
/// the body; bindings must also carry `ctx` out-of-band so the server can recover it on its own.
#[async_trait]
pub trait GateConnImpl: Send + Sync + 'static {
    async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResponse>;
    async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResponse>;
    async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResponse>;
    async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResponse>;
    async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResponse>;
    async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<QueryResultList>;
    async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<QueryResultList>;

    async fn stream_execute(&self, ctx: &RequestContext, version: ProtocolVersion, req: Query) -> GateResult<QueryStream>;
    async fn stream_execute_shard(&self, ctx: &RequestContext, version: ProtocolVersion, req: QueryShard) -> GateResult<QueryStream>;
    async fn stream_execute_key_ranges(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyRangeQuery) -> GateResult<QueryStream>;
    async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyspaceIdQuery) -> GateResult<QueryStream>;

    async fn begin(&self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<Session>;
    async fn commit(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()>;
    async fn rollback(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()>;

    async fn split_query(&self, ctx: &RequestContext, req: SplitQueryRequest) -> GateResult<SplitQueryResult>;
    async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: &str) -> GateResult<SrvKeyspace>;
}

#[derive(Clone)]
pub struct GateConn {
    imp: Arc<dyn GateConnImpl>,
}

impl std::fmt::Debug for GateConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConn").finish_non_exhaustive()
    }
}

/// Copies the context identity into the request body.
fn stamp<Q: Routed>(ctx: &RequestContext, mut req: Q) -> Q {
    req.set_caller_id(ctx.caller_id.clone());
    req
}

impl GateConn {
    pub fn new(imp: Arc<dyn GateConnImpl>) -> Self { Self { imp } }

    /// Dial through the process-wide registry.
    pub async fn dial(protocol: &str, address: &str, timeout: Duration) -> GateResult<Self> {
        dial(protocol, address, timeout).await
    }

    pub(crate) fn imp(&self) -> &Arc<dyn GateConnImpl> { &self.imp }

    pub async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResult> {
        self.imp.execute(ctx, stamp(ctx, req)).await?.into_result()
    }

    pub async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResult> {
        self.imp.execute_shard(ctx, stamp(ctx, req)).await?.into_result()
    }

    pub async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResult> {
        self.imp.execute_keyspace_ids(ctx, stamp(ctx, req)).await?.into_result()
    }

    pub async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResult> {
        self.imp.execute_key_ranges(ctx, stamp(ctx, req)).await?.into_result()
    }

    pub async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResult> {
        self.imp.execute_entity_ids(ctx, stamp(ctx, req)).await?.into_result()
    }

    pub async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<Vec<QueryResult>> {
        self.imp.execute_batch_shard(ctx, stamp(ctx, req)).await?.into_results()
    }

    pub async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<Vec<QueryResult>> {
        self.imp.execute_batch_keyspace_ids(ctx, stamp(ctx, req)).await?.into_results()
    }

    pub async fn stream_execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryStream> {
        self.imp.stream_execute(ctx, ProtocolVersion::V1, stamp(ctx, req)).await
    }

    pub async fn stream_execute2(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryStream> {
        self.imp.stream_execute(ctx, ProtocolVersion::V2, stamp(ctx, req)).await
    }

    pub async fn stream_execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryStream> {
        self.imp.stream_execute_shard(ctx, ProtocolVersion::V1, stamp(ctx, req)).await
    }

    pub async fn stream_execute_shard2(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryStream> {
        self.imp.stream_execute_shard(ctx, ProtocolVersion::V2, stamp(ctx, req)).await
    }

    pub async fn stream_execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryStream> {
        self.imp.stream_execute_key_ranges(ctx, ProtocolVersion::V1, stamp(ctx, req)).await
    }

    pub async fn stream_execute_key_ranges2(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryStream> {
        self.imp.stream_execute_key_ranges(ctx, ProtocolVersion::V2, stamp(ctx, req)).await
    }

    pub async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryStream> {
        self.imp.stream_execute_keyspace_ids(ctx, ProtocolVersion::V1, stamp(ctx, req)).await
    }

    pub async fn stream_execute_keyspace_ids2(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryStream> {
        self.imp.stream_execute_keyspace_ids(ctx, ProtocolVersion::V2, stamp(ctx, req)).await
    }

    pub async fn begin(&self, ctx: &RequestContext) -> GateResult<GateTx> {
        let session = self.imp.begin(ctx, ProtocolVersion::V1).await?;
        Ok(GateTx::new(self.clone(), session))
    }

    pub async fn begin2(&self, ctx: &RequestContext) -> GateResult<GateTx> {
        let session = self.imp.begin(ctx, ProtocolVersion::V2).await?;
        Ok(GateTx::new(self.clone(), session))
    }

    pub async fn split_query(&self, ctx: &RequestContext, mut req: SplitQueryRequest) -> GateResult<SplitQueryResult> {
        req.caller_id = ctx.caller_id.clone();
        self.imp.split_query(ctx, req).await
    }

    pub async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: &str) -> GateResult<SrvKeyspace> {
        self.imp.get_srv_keyspace(ctx, keyspace).await
    }
}
