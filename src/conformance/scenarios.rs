//! Per-operation scenario bodies, parameterized by fault mode.

use anyhow::{anyhow, bail, ensure, Result};

use super::checks::{expect_equal, expect_error_containing, expect_error_exact, expect_ok, fault_needles};
use super::{ConformanceSuite, Target, UNREGISTERED_SQL};
use crate::conn::{GateTx, QueryStream};
use crate::error::GateResult;
use crate::fixtures::{APP_ERROR, ERROR_REQUEST, REQUEST1, TX_REQUEST};
use crate::identity::RequestContext;
use crate::proto::{Method, ProtocolVersion, QueryResult};
use crate::server::FaultMode;

/// Drains a stream that may have failed to open; an open failure counts as an empty stream.
async fn drain(opened: GateResult<QueryStream>) -> (Vec<QueryResult>, GateResult<()>) {
    match opened {
        Ok(stream) => stream.collect_all().await,
        Err(e) => (Vec::new(), Err(e)),
    }
}

fn no_match_needle() -> Vec<String> {
    vec![format!("no match for: {}", UNREGISTERED_SQL)]
}

impl ConformanceSuite {
    pub(super) async fn run_op(&self, method: Method, mode: FaultMode) -> Result<()> {
        match method {
            m if m.is_stream() => self.stream_op(m, mode).await,
            Method::Begin | Method::Begin2 => self.begin_op(method.version(), mode).await,
            Method::Commit | Method::Commit2 => self.finish_op(method, mode).await,
            Method::Rollback | Method::Rollback2 => self.finish_op(method, mode).await,
            Method::SplitQuery => self.split_query_op(mode).await,
            Method::GetSrvKeyspace => self.srv_keyspace_op(mode).await,
            m => self.query_op(m, mode).await,
        }
    }

    /// Issues one of the seven query operations, normalizing single results to a one-element list.
    async fn call_query(&self, method: Method, target: Target<'_>) -> Result<GateResult<Vec<QueryResult>>> {
        let ctx = self.ctx();
        let c = &self.conn;
        Ok(match method {
            Method::Execute => c.execute(&ctx, self.request(target)?).await.map(|r| vec![r]),
            Method::ExecuteShard => c.execute_shard(&ctx, self.request(target)?).await.map(|r| vec![r]),
            Method::ExecuteKeyspaceIds => c.execute_keyspace_ids(&ctx, self.request(target)?).await.map(|r| vec![r]),
            Method::ExecuteKeyRanges => c.execute_key_ranges(&ctx, self.request(target)?).await.map(|r| vec![r]),
            Method::ExecuteEntityIds => c.execute_entity_ids(&ctx, self.request(target)?).await.map(|r| vec![r]),
            Method::ExecuteBatchShard => c.execute_batch_shard(&ctx, self.request(target)?).await,
            Method::ExecuteBatchKeyspaceIds => c.execute_batch_keyspace_ids(&ctx, self.request(target)?).await,
            m => bail!("{} is not a query operation", m),
        })
    }

    async fn open_stream(&self, method: Method, target: Target<'_>) -> Result<GateResult<QueryStream>> {
        let ctx = self.ctx();
        let c = &self.conn;
        Ok(match method {
            Method::StreamExecute => c.stream_execute(&ctx, self.request(target)?).await,
            Method::StreamExecute2 => c.stream_execute2(&ctx, self.request(target)?).await,
            Method::StreamExecuteShard => c.stream_execute_shard(&ctx, self.request(target)?).await,
            Method::StreamExecuteShard2 => c.stream_execute_shard2(&ctx, self.request(target)?).await,
            Method::StreamExecuteKeyRanges => c.stream_execute_key_ranges(&ctx, self.request(target)?).await,
            Method::StreamExecuteKeyRanges2 => c.stream_execute_key_ranges2(&ctx, self.request(target)?).await,
            Method::StreamExecuteKeyspaceIds => c.stream_execute_keyspace_ids(&ctx, self.request(target)?).await,
            Method::StreamExecuteKeyspaceIds2 => c.stream_execute_keyspace_ids2(&ctx, self.request(target)?).await,
            m => bail!("{} is not a streaming operation", m),
        })
    }

    pub(super) async fn begin_tx(&self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<GateTx> {
        match version {
            ProtocolVersion::V1 => self.conn.begin(ctx).await,
            ProtocolVersion::V2 => self.conn.begin2(ctx).await,
        }
    }

    async fn query_op(&self, method: Method, mode: FaultMode) -> Result<()> {
        let what = method.as_str();
        if mode != FaultMode::Normal {
            let res = self.call_query(method, Target::Fixture(REQUEST1)).await?;
            return expect_error_containing(what, res, &fault_needles(mode));
        }
        let got = expect_ok(what, self.call_query(method, Target::Fixture(REQUEST1)).await?)?;
        expect_equal(what, &got, &vec![self.fixtures.result1().clone()])?;

        let res = self.call_query(method, Target::Unregistered(UNREGISTERED_SQL)).await?;
        expect_error_containing(what, res, &no_match_needle())?;

        let res = self.call_query(method, Target::Fixture(ERROR_REQUEST)).await?;
        expect_error_exact(what, res, APP_ERROR)
    }

    async fn stream_op(&self, method: Method, mode: FaultMode) -> Result<()> {
        let what = method.as_str();
        match mode {
            FaultMode::Normal => {
                let stream = expect_ok(what, self.open_stream(method, Target::Fixture(REQUEST1)).await?)?;
                let (parts, status) = stream.collect_all().await;
                expect_ok(what, status)?;
                let result1 = self.fixtures.result1();
                ensure!(
                    parts.len() == 1 + result1.rows.len(),
                    "{}: got {} messages, want {}",
                    what,
                    parts.len(),
                    1 + result1.rows.len()
                );
                expect_equal(&format!("{} first message", what), &parts[0], self.fixtures.stream_result1())?;
                let mut got = QueryResult::default();
                for part in parts {
                    got.absorb(part);
                }
                let want = QueryResult { rows_affected: 0, insert_id: 0, ..result1.clone() };
                expect_equal(what, &got, &want)?;

                let (parts, status) = drain(self.open_stream(method, Target::Unregistered(UNREGISTERED_SQL)).await?).await;
                ensure!(parts.is_empty(), "{}: unregistered request streamed {:?}", what, parts);
                expect_error_containing(what, status, &no_match_needle())?;

                let (parts, status) = drain(self.open_stream(method, Target::Fixture(ERROR_REQUEST)).await?).await;
                ensure!(parts.is_empty(), "{}: error request streamed {:?}", what, parts);
                expect_error_exact(what, status, APP_ERROR)
            }
            FaultMode::DeclaredError => {
                // Armed before the call so the server cannot reach its release point first.
                let release = self.server.arm_release_gate();
                let mut stream = expect_ok(what, self.open_stream(method, Target::Fixture(REQUEST1)).await?)?;
                let first = stream
                    .next_result()
                    .await
                    .ok_or_else(|| anyhow!("{}: stream closed before its first message", what))?;
                expect_equal(&format!("{} first message", what), &first, self.fixtures.stream_result1())?;
                release.release();
                if let Some(extra) = stream.next_result().await {
                    bail!("{}: unexpected message after release: {:?}", what, extra);
                }
                expect_error_containing(what, stream.finish().await, &fault_needles(mode))
            }
            FaultMode::InjectedFault => {
                let (parts, status) = drain(self.open_stream(method, Target::Fixture(REQUEST1)).await?).await;
                ensure!(parts.is_empty(), "{}: faulted stream sent {:?}", what, parts);
                expect_error_containing(what, status, &fault_needles(mode))
            }
        }
    }

    async fn begin_op(&self, version: ProtocolVersion, mode: FaultMode) -> Result<()> {
        let what = Method::begin(version).as_str();
        let res = self.begin_tx(&self.ctx(), version).await;
        if mode != FaultMode::Normal {
            return expect_error_containing(what, res, &fault_needles(mode));
        }
        let tx = expect_ok(what, res)?;
        expect_equal(what, &tx.session(), &Some(self.fixtures.session1()))
    }

    /// Commit or rollback on a session obtained with begin forced to succeed.
    async fn finish_op(&self, method: Method, mode: FaultMode) -> Result<()> {
        let what = method.as_str();
        let version = method.version();
        let ctx = self.ctx();
        self.server.set_force_begin_success(true);
        let begun = self.begin_tx(&ctx, version).await;
        self.server.set_force_begin_success(false);
        let mut tx = begun.map_err(|e| anyhow!("{}: forced begin failed: {}", what, e))?;

        if mode == FaultMode::Normal {
            expect_ok(what, tx.execute(&ctx, self.request(Target::Fixture(TX_REQUEST))?).await)?;
        }
        let res = match method {
            Method::Commit => tx.commit(&ctx).await,
            Method::Commit2 => tx.commit2(&ctx).await,
            Method::Rollback => tx.rollback(&ctx).await,
            Method::Rollback2 => tx.rollback2(&ctx).await,
            m => bail!("{} does not finish a transaction", m),
        };
        ensure!(!tx.in_transaction(), "{}: handle still holds a session", what);
        match mode {
            FaultMode::Normal => expect_ok(what, res),
            _ => expect_error_containing(what, res, &fault_needles(mode)),
        }
    }

    async fn split_query_op(&self, mode: FaultMode) -> Result<()> {
        let what = Method::SplitQuery.as_str();
        let res = self.conn.split_query(&self.ctx(), self.fixtures.split_request().clone()).await;
        match mode {
            FaultMode::Normal => expect_equal(what, &expect_ok(what, res)?, self.fixtures.split_result()),
            _ => expect_error_containing(what, res, &fault_needles(mode)),
        }
    }

    async fn srv_keyspace_op(&self, mode: FaultMode) -> Result<()> {
        let what = Method::GetSrvKeyspace.as_str();
        let res = self.conn.get_srv_keyspace(&self.ctx(), self.fixtures.srv_keyspace_name()).await;
        match mode {
            FaultMode::Normal => expect_equal(what, &expect_ok(what, res)?, self.fixtures.srv_keyspace()),
            _ => expect_error_containing(what, res, &fault_needles(mode)),
        }
    }
}
