//! Transaction handle.
//! Holds the current session token; every call attaches it and replaces it with the one the
//! server returns. Commit and rollback clear it whatever the outcome.

use super::GateConn;
use crate::error::{GateError, GateResult};
use crate::identity::RequestContext;
use crate::proto::{
    BatchQueryShard, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, ProtocolVersion, Query,
    QueryResult, QueryShard, Routed,
};
use crate::session::Session;

#[derive(Debug)]
pub struct GateTx {
    conn: GateConn,
    session: Option<Session>,
}

impl GateTx {
    pub(crate) fn new(conn: GateConn, session: Session) -> Self {
        Self { conn, session: Some(session) }
    }

    /// Current session, `None` once the transaction is finished.
    pub fn session(&self) -> Option<&Session> { self.session.as_ref() }

    pub fn in_transaction(&self) -> bool { self.session.is_some() }

    fn attach<Q: Routed>(&self, op: &str, ctx: &RequestContext, mut req: Q) -> GateResult<Q> {
        let session = self.session.clone().ok_or_else(|| GateError::not_in_transaction(op))?;
        req.set_session(Some(session));
        req.set_caller_id(ctx.caller_id.clone());
        Ok(req)
    }

    pub async fn execute(&mut self, ctx: &RequestContext, req: Query) -> GateResult<QueryResult> {
        let req = self.attach("execute", ctx, req)?;
        let reply = self.conn.imp().execute(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_result()
    }

    pub async fn execute_shard(&mut self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResult> {
        let req = self.attach("executeShard", ctx, req)?;
        let reply = self.conn.imp().execute_shard(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_result()
    }

    pub async fn execute_keyspace_ids(&mut self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResult> {
        let req = self.attach("executeKeyspaceIds", ctx, req)?;
        let reply = self.conn.imp().execute_keyspace_ids(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_result()
    }

    pub async fn execute_key_ranges(&mut self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResult> {
        let req = self.attach("executeKeyRanges", ctx, req)?;
        let reply = self.conn.imp().execute_key_ranges(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_result()
    }

    pub async fn execute_entity_ids(&mut self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResult> {
        let req = self.attach("executeEntityIds", ctx, req)?;
        let reply = self.conn.imp().execute_entity_ids(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_result()
    }

    pub async fn execute_batch_shard(&mut self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<Vec<QueryResult>> {
        let req = self.attach("executeBatchShard", ctx, req)?;
        let reply = self.conn.imp().execute_batch_shard(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_results()
    }

    pub async fn execute_batch_keyspace_ids(&mut self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<Vec<QueryResult>> {
        let req = self.attach("executeBatchKeyspaceIds", ctx, req)?;
        let reply = self.conn.imp().execute_batch_keyspace_ids(ctx, req).await?;
        self.session = reply.session.clone();
        reply.into_results()
    }

    async fn finish_commit(&mut self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<()> {
        let session = self.session.take().ok_or_else(|| GateError::not_in_transaction("commit"))?;
        self.conn.imp().commit(ctx, version, session).await
    }

    async fn finish_rollback(&mut self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<()> {
        match self.session.take() {
            Some(session) => self.conn.imp().rollback(ctx, version, session).await,
            None => Ok(()),
        }
    }

    pub async fn commit(&mut self, ctx: &RequestContext) -> GateResult<()> {
        self.finish_commit(ctx, ProtocolVersion::V1).await
    }

    pub async fn commit2(&mut self, ctx: &RequestContext) -> GateResult<()> {
        self.finish_commit(ctx, ProtocolVersion::V2).await
    }

    /// A rollback with no active session is a no-op.
    pub async fn rollback(&mut self, ctx: &RequestContext) -> GateResult<()> {
        self.finish_rollback(ctx, ProtocolVersion::V1).await
    }

    pub async fn rollback2(&mut self, ctx: &RequestContext) -> GateResult<()> {
        self.finish_rollback(ctx, ProtocolVersion::V2).await
    }
}
