//! Reference implementation of the gateway service: answers every operation from the fixture
//! registry and can be switched into declared-error or injected-fault mode at runtime.
//!
//! Request mismatches and identity mismatches never change a response. They are recorded as
//! failures that the driving suite drains with `take_failures`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::fault::{release_gate, FaultMode, ReleaseGate, ReleaseHandle, BACKEND_SENTINEL, FORCED_PANIC_MESSAGE};
use super::service::{GateService, StreamSink};
use crate::error::{GateError, GateResult};
use crate::fixtures::{ExecShape, FixtureRegistry};
use crate::identity::RequestContext;
use crate::proto::{
    BatchQueryShard, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, Query, QueryResponse,
    QueryResult, QueryResultList, QueryShard, SplitQueryRequest, SplitQueryResult, SrvKeyspace,
};
use crate::session::Session;

pub struct ReferenceServer {
    fixtures: Arc<FixtureRegistry>,
    mode: RwLock<FaultMode>,
    check_caller_id: AtomicBool,
    force_begin_success: AtomicBool,
    gate: Mutex<Option<ReleaseGate>>,
    failures: Mutex<Vec<String>>,
}

impl ReferenceServer {
    pub fn new(fixtures: Arc<FixtureRegistry>) -> Self {
        Self {
            fixtures,
            mode: RwLock::new(FaultMode::Normal),
            check_caller_id: AtomicBool::new(false),
            force_begin_success: AtomicBool::new(false),
            gate: Mutex::new(None),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn fixtures(&self) -> &Arc<FixtureRegistry> { &self.fixtures }

    pub fn fault_mode(&self) -> FaultMode { *self.mode.read() }

    pub fn set_fault_mode(&self, mode: FaultMode) {
        debug!(mode = %mode, "fault mode set");
        *self.mode.write() = mode;
    }

    /// When enabled, every handler verifies the ambient caller identity against the fixture one.
    pub fn set_check_caller_id(&self, on: bool) { self.check_caller_id.store(on, Ordering::SeqCst); }

    /// Lets `begin` succeed regardless of fault mode, so commit/rollback fault paths have a session to send.
    pub fn set_force_begin_success(&self, on: bool) { self.force_begin_success.store(on, Ordering::SeqCst); }

    /// Installs a fresh release gate for the next declared-error stream, replacing any unfired one.
    pub fn arm_release_gate(&self) -> ReleaseHandle {
        let (gate, handle) = release_gate();
        if self.gate.lock().replace(gate).is_some() {
            debug!("replaced an unfired release gate");
        }
        handle
    }

    /// Drains the failures recorded since the last call.
    pub fn take_failures(&self) -> Vec<String> { std::mem::take(&mut *self.failures.lock()) }

    fn record_failure(&self, msg: String) {
        warn!(target: "shardgate::reference", "{}", msg);
        self.failures.lock().push(msg);
    }

    /// Applies the fault mode at handler entry.
    fn enter(&self) -> GateResult<()> {
        match self.fault_mode() {
            FaultMode::Normal => Ok(()),
            FaultMode::DeclaredError => Err(GateError::backend(BACKEND_SENTINEL)),
            FaultMode::InjectedFault => panic!("{}", FORCED_PANIC_MESSAGE),
        }
    }

    fn verify_caller_id(&self, ctx: &RequestContext, op: &str) {
        if !self.check_caller_id.load(Ordering::SeqCst) {
            return;
        }
        match &ctx.caller_id {
            None => self.record_failure(format!("no effective caller id for {}", op)),
            Some(id) if id != self.fixtures.caller_id() => self.record_failure(format!(
                "invalid effective caller id for {}: got {:?} expected {:?}",
                op,
                id,
                self.fixtures.caller_id()
            )),
            Some(_) => {}
        }
    }

    fn unary<Q: ExecShape>(&self, ctx: &RequestContext, op: &str, mut req: Q) -> GateResult<QueryResponse> {
        self.enter()?;
        self.verify_caller_id(ctx, op);
        req.set_caller_id(None);
        let case = self.fixtures.lookup(req.routing_sql()).ok_or_else(|| GateError::no_match(req.routing_sql()))?;
        let expected = Q::expected(case);
        if &req != expected {
            self.record_failure(format!("{} has wrong input: got {:?} wanted {:?}", op, req, expected));
            return Ok(QueryResponse::default());
        }
        Ok(case.reply.clone())
    }

    fn batch<Q: ExecShape>(&self, ctx: &RequestContext, op: &str, req: Q) -> GateResult<QueryResultList> {
        let reply = self.unary(ctx, op, req)?;
        let list = match reply.result {
            Some(result) if reply.error.is_empty() => vec![result],
            _ => Vec::new(),
        };
        Ok(QueryResultList { list, session: reply.session, error: reply.error })
    }

    /// Streams the fixture: one descriptor-only message, then one message per row. In
    /// declared-error mode the rows are replaced by the sentinel, which is only returned once
    /// the release gate fires.
    async fn stream<Q: ExecShape>(&self, ctx: &RequestContext, op: &str, mut req: Q, sink: StreamSink) -> GateResult<()> {
        let mode = self.fault_mode();
        if mode == FaultMode::InjectedFault {
            panic!("{}", FORCED_PANIC_MESSAGE);
        }
        self.verify_caller_id(ctx, op);
        req.set_caller_id(None);
        let case = self.fixtures.lookup(req.routing_sql()).ok_or_else(|| GateError::no_match(req.routing_sql()))?;
        let expected = Q::expected(case);
        if &req != expected {
            self.record_failure(format!("{} has wrong input: got {:?} wanted {:?}", op, req, expected));
            return Ok(());
        }
        match &case.reply.result {
            Some(result) => {
                sink.send(QueryResult { fields: result.fields.clone(), ..Default::default() })?;
                if mode == FaultMode::DeclaredError {
                    self.hold_until_released(op).await;
                    return Err(GateError::backend(BACKEND_SENTINEL));
                }
                for row in &result.rows {
                    sink.send(QueryResult { rows: vec![row.clone()], ..Default::default() })?;
                }
            }
            None if mode == FaultMode::DeclaredError => return Err(GateError::backend(BACKEND_SENTINEL)),
            None => {}
        }
        if !case.reply.error.is_empty() {
            return Err(GateError::application(case.reply.error.clone()));
        }
        Ok(())
    }

    async fn hold_until_released(&self, op: &str) {
        let gate = self.gate.lock().take();
        match gate {
            Some(gate) => {
                if !gate.wait().await {
                    warn!(op, "release handle dropped without firing");
                }
            }
            None => warn!(op, "declared-error stream reached its release point with no gate armed"),
        }
    }

    fn finish(&self, ctx: &RequestContext, op: &str, session: Session) -> GateResult<()> {
        self.enter()?;
        self.verify_caller_id(ctx, op);
        if &session != self.fixtures.session2() {
            return Err(GateError::session_mismatch(&op.to_ascii_lowercase()));
        }
        Ok(())
    }
}

#[async_trait]
impl GateService for ReferenceServer {
    async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResponse> {
        self.unary(ctx, "Execute", req)
    }

    async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResponse> {
        self.unary(ctx, "ExecuteShard", req)
    }

    async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResponse> {
        self.unary(ctx, "ExecuteKeyspaceIds", req)
    }

    async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResponse> {
        self.unary(ctx, "ExecuteKeyRanges", req)
    }

    async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResponse> {
        self.unary(ctx, "ExecuteEntityIds", req)
    }

    async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<QueryResultList> {
        self.batch(ctx, "ExecuteBatchShard", req)
    }

    async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<QueryResultList> {
        self.batch(ctx, "ExecuteBatchKeyspaceIds", req)
    }

    async fn stream_execute(&self, ctx: &RequestContext, req: Query, sink: StreamSink) -> GateResult<()> {
        self.stream(ctx, "StreamExecute", req, sink).await
    }

    async fn stream_execute_shard(&self, ctx: &RequestContext, req: QueryShard, sink: StreamSink) -> GateResult<()> {
        self.stream(ctx, "StreamExecuteShard", req, sink).await
    }

    async fn stream_execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery, sink: StreamSink) -> GateResult<()> {
        self.stream(ctx, "StreamExecuteKeyRanges", req, sink).await
    }

    async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery, sink: StreamSink) -> GateResult<()> {
        self.stream(ctx, "StreamExecuteKeyspaceIds", req, sink).await
    }

    async fn begin(&self, ctx: &RequestContext) -> GateResult<Session> {
        if !self.force_begin_success.load(Ordering::SeqCst) {
            self.enter()?;
        }
        self.verify_caller_id(ctx, "Begin");
        Ok(self.fixtures.session1().clone())
    }

    async fn commit(&self, ctx: &RequestContext, session: Session) -> GateResult<()> {
        self.finish(ctx, "Commit", session)
    }

    async fn rollback(&self, ctx: &RequestContext, session: Session) -> GateResult<()> {
        self.finish(ctx, "Rollback", session)
    }

    async fn split_query(&self, ctx: &RequestContext, mut req: SplitQueryRequest) -> GateResult<SplitQueryResult> {
        self.enter()?;
        self.verify_caller_id(ctx, "SplitQuery");
        req.caller_id = None;
        if &req != self.fixtures.split_request() {
            self.record_failure(format!(
                "SplitQuery has wrong input: got {:?} wanted {:?}",
                req,
                self.fixtures.split_request()
            ));
        }
        Ok(self.fixtures.split_result().clone())
    }

    async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: String) -> GateResult<SrvKeyspace> {
        self.enter()?;
        self.verify_caller_id(ctx, "GetSrvKeyspace");
        if keyspace != self.fixtures.srv_keyspace_name() {
            self.record_failure(format!(
                "GetSrvKeyspace has wrong input: got {} wanted {}",
                keyspace,
                self.fixtures.srv_keyspace_name()
            ));
        }
        Ok(self.fixtures.srv_keyspace().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ERROR_REQUEST, REQUEST1};
    use crate::server::boundary::guarded;
    use crate::proto::Method;

    fn server() -> ReferenceServer {
        ReferenceServer::new(Arc::new(FixtureRegistry::canonical()))
    }

    #[tokio::test]
    async fn unknown_sql_is_not_found() {
        let s = server();
        let ctx = RequestContext::new();
        let req = Query { sql: "none".into(), ..Default::default() };
        assert_eq!(s.execute(&ctx, req).await, Err(GateError::no_match("none")));
    }

    #[tokio::test]
    async fn mismatch_is_recorded_but_answered() {
        let s = server();
        let ctx = RequestContext::new();
        let mut req = s.fixtures().lookup(REQUEST1).unwrap().query.clone();
        req.tablet_type = crate::proto::TabletType::Replica;
        let reply = s.execute(&ctx, req).await.unwrap();
        assert_eq!(reply, QueryResponse::default());
        let failures = s.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("Execute has wrong input"));
        assert!(s.take_failures().is_empty());
    }

    #[tokio::test]
    async fn identity_check_records_missing_caller() {
        let s = server();
        s.set_check_caller_id(true);
        let ctx = RequestContext::new();
        let req = s.fixtures().lookup(REQUEST1).unwrap().query.clone();
        let reply = s.execute(&ctx, req.clone()).await.unwrap();
        assert!(reply.result.is_some());
        assert_eq!(s.take_failures(), vec!["no effective caller id for Execute".to_string()]);

        let ctx = RequestContext::new().with_caller_id(s.fixtures().caller_id().clone());
        s.execute(&ctx, req).await.unwrap();
        assert!(s.take_failures().is_empty());
    }

    #[tokio::test]
    async fn batch_passes_error_through_without_list() {
        let s = server();
        let ctx = RequestContext::new();
        let req = s.fixtures().lookup(ERROR_REQUEST).unwrap().batch_query_shard.clone();
        let reply = s.execute_batch_shard(&ctx, req).await.unwrap();
        assert!(reply.list.is_empty());
        assert_eq!(reply.error, "app error");
    }

    #[tokio::test]
    async fn declared_error_and_forced_begin() {
        let s = server();
        let ctx = RequestContext::new();
        s.set_fault_mode(FaultMode::DeclaredError);
        assert_eq!(s.begin(&ctx).await, Err(GateError::backend(BACKEND_SENTINEL)));
        s.set_force_begin_success(true);
        assert_eq!(s.begin(&ctx).await.as_ref(), Ok(s.fixtures().session1()));
    }

    #[tokio::test]
    async fn injected_fault_is_caught_by_the_boundary() {
        let s = server();
        let ctx = RequestContext::new();
        s.set_fault_mode(FaultMode::InjectedFault);
        let err = guarded(Method::GetSrvKeyspace, &ctx, s.get_srv_keyspace(&ctx, "test_keyspace".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("uncaught panic: test forced panic"));
    }

    #[tokio::test]
    async fn commit_requires_post_execute_session() {
        let s = server();
        let ctx = RequestContext::new();
        let s1 = s.fixtures().session1().clone();
        let s2 = s.fixtures().session2().clone();
        assert_eq!(s.commit(&ctx, s1.clone()).await, Err(GateError::session_mismatch("commit")));
        assert_eq!(s.rollback(&ctx, s1).await, Err(GateError::session_mismatch("rollback")));
        assert_eq!(s.commit(&ctx, s2).await, Ok(()));
    }

    #[tokio::test]
    async fn stream_sends_descriptors_then_rows() {
        let s = server();
        let ctx = RequestContext::new();
        let (sink, mut rx) = StreamSink::channel();
        let req = s.fixtures().lookup(REQUEST1).unwrap().query.clone();
        s.stream_execute(&ctx, req, sink).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(&first, s.fixtures().stream_result1());
        assert_eq!(rx.recv().await.unwrap().rows.len(), 1);
        assert_eq!(rx.recv().await.unwrap().rows.len(), 1);
        assert!(rx.recv().await.is_none());
    }
}
