//! Transaction scenarios: the session token must flow through every query shape, and a finished
//! handle must refuse further work without touching the server.

use anyhow::{bail, ensure, Result};

use super::checks::{expect_equal, expect_error_containing, expect_error_exact, expect_ok};
use super::{ConformanceSuite, Target, QUERY_METHODS};
use crate::conn::GateTx;
use crate::error::GateResult;
use crate::fixtures::{TX_REQUEST, TX_REQUEST_NIT};
use crate::identity::RequestContext;
use crate::proto::{Method, ProtocolVersion};

/// Client-side operation name a transaction handle reports for a query method.
fn tx_op_name(method: Method) -> &'static str {
    match method {
        Method::Execute => "execute",
        Method::ExecuteShard => "executeShard",
        Method::ExecuteKeyspaceIds => "executeKeyspaceIds",
        Method::ExecuteKeyRanges => "executeKeyRanges",
        Method::ExecuteEntityIds => "executeEntityIds",
        Method::ExecuteBatchShard => "executeBatchShard",
        Method::ExecuteBatchKeyspaceIds => "executeBatchKeyspaceIds",
        _ => "unknown",
    }
}

impl ConformanceSuite {
    /// Runs one query method through a transaction handle; results are discarded.
    async fn tx_call(&self, tx: &mut GateTx, ctx: &RequestContext, method: Method, key: &str) -> Result<GateResult<()>> {
        let target = Target::Fixture(key);
        Ok(match method {
            Method::Execute => tx.execute(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteShard => tx.execute_shard(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteKeyspaceIds => tx.execute_keyspace_ids(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteKeyRanges => tx.execute_key_ranges(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteEntityIds => tx.execute_entity_ids(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteBatchShard => tx.execute_batch_shard(ctx, self.request(target)?).await.map(drop),
            Method::ExecuteBatchKeyspaceIds => tx.execute_batch_keyspace_ids(ctx, self.request(target)?).await.map(drop),
            m => bail!("{} cannot run inside a transaction", m),
        })
    }

    async fn commit_tx(tx: &mut GateTx, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<()> {
        match version {
            ProtocolVersion::V1 => tx.commit(ctx).await,
            ProtocolVersion::V2 => tx.commit2(ctx).await,
        }
    }

    async fn rollback_tx(tx: &mut GateTx, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<()> {
        match version {
            ProtocolVersion::V1 => tx.rollback(ctx).await,
            ProtocolVersion::V2 => tx.rollback2(ctx).await,
        }
    }

    /// Each shape gets a fresh transaction; the first is committed, the rest rolled back.
    pub(super) async fn tx_pass(&self, version: ProtocolVersion) -> Result<()> {
        let ctx = self.ctx();
        let begin = Method::begin(version).as_str();
        for (i, method) in QUERY_METHODS.iter().copied().enumerate() {
            let what = tx_op_name(method);
            let mut tx = expect_ok(begin, self.begin_tx(&ctx, version).await)?;
            expect_ok(what, self.tx_call(&mut tx, &ctx, method, TX_REQUEST).await?)?;
            expect_equal(what, &tx.session(), &Some(self.fixtures.session2()))?;
            if i == 0 {
                expect_ok(Method::commit(version).as_str(), Self::commit_tx(&mut tx, &ctx, version).await)?;
            } else {
                expect_ok(Method::rollback(version).as_str(), Self::rollback_tx(&mut tx, &ctx, version).await)?;
            }
            ensure!(!tx.in_transaction(), "{}: handle still holds a session after finishing", what);
        }
        Ok(())
    }

    /// Calls flagged not-in-transaction leave the begun session untouched.
    pub(super) async fn tx_pass_not_in_transaction(&self, version: ProtocolVersion) -> Result<()> {
        let ctx = self.ctx();
        let mut tx = expect_ok(Method::begin(version).as_str(), self.begin_tx(&ctx, version).await)?;
        for method in QUERY_METHODS {
            let what = tx_op_name(method);
            expect_ok(what, self.tx_call(&mut tx, &ctx, method, TX_REQUEST_NIT).await?)?;
            expect_equal(what, &tx.session(), &Some(self.fixtures.session1()))?;
        }
        Ok(())
    }

    pub(super) async fn tx_fail(&self, version: ProtocolVersion) -> Result<()> {
        let ctx = self.ctx();
        let begin = Method::begin(version).as_str();
        let commit = Method::commit(version).as_str();
        let rollback = Method::rollback(version).as_str();

        // The freshly begun session is not the one the server expects to finalize.
        let mut tx = expect_ok(begin, self.begin_tx(&ctx, version).await)?;
        expect_error_containing(commit, Self::commit_tx(&mut tx, &ctx, version).await, &["commit: session mismatch".to_string()])?;
        ensure!(!tx.in_transaction(), "{}: failed commit left the session attached", commit);

        for method in QUERY_METHODS {
            let op = tx_op_name(method);
            let res = self.tx_call(&mut tx, &ctx, method, TX_REQUEST).await?;
            expect_error_exact(op, res, &format!("{}: not in transaction", op))?;
        }
        expect_error_exact(commit, Self::commit_tx(&mut tx, &ctx, version).await, "commit: not in transaction")?;
        expect_ok(rollback, Self::rollback_tx(&mut tx, &ctx, version).await)?;

        let mut tx = expect_ok(begin, self.begin_tx(&ctx, version).await)?;
        expect_error_containing(
            rollback,
            Self::rollback_tx(&mut tx, &ctx, version).await,
            &["rollback: session mismatch".to_string()],
        )
    }
}
