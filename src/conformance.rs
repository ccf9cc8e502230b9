//! Conformance suite: drives every protocol operation through a `GateConn` in every fault mode
//! against a `ReferenceServer`, and reports which scenarios a binding fails.
//!
//! Scenarios run one at a time. The fault mode and identity checking are only changed between
//! scenarios, and the failures the server recorded during a scenario are attributed to it.

mod checks;
mod report;
mod scenarios;
mod transactions;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::conn::{DialerRegistry, Dialer, GateConn};
use crate::fixtures::{ExecShape, ExecCase, FixtureRegistry, REQUEST1};
use crate::identity::RequestContext;
use crate::proto::{Method, ProtocolVersion};
use crate::server::{FaultMode, ReferenceServer};

pub use report::{ScenarioOutcome, SuiteReport};

pub const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(10);

/// Dialer name `run_suite` registers the binding under.
pub const TEST_PROTOCOL: &str = "test";

/// SQL text that is never registered.
pub const UNREGISTERED_SQL: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// One operation in the scenario's fault mode.
    Op(Method),
    /// Begin, one transactional call per query shape, commit or rollback.
    TxPass(ProtocolVersion),
    /// Calls that opt out of requiring a transaction keep the begun session.
    TxPassNotInTransaction(ProtocolVersion),
    /// Session mismatches and calls on a finished handle.
    TxFail(ProtocolVersion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub mode: FaultMode,
    pub check_caller_id: bool,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = |v: &ProtocolVersion| match v { ProtocolVersion::V1 => "", ProtocolVersion::V2 => "2" };
        match &self.kind {
            ScenarioKind::Op(m) => write!(f, "{}/{}", m, self.mode),
            ScenarioKind::TxPass(ver) => write!(f, "Tx{}Pass", v(ver)),
            ScenarioKind::TxPassNotInTransaction(ver) => write!(f, "Tx{}PassNotInTransaction", v(ver)),
            ScenarioKind::TxFail(ver) => write!(f, "Tx{}Fail", v(ver)),
        }
    }
}

/// Where a generated request points.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    /// The canonical request registered under this key.
    Fixture(&'a str),
    /// The `request1` shape with its routing text replaced by an unregistered one.
    Unregistered(&'a str),
}

const QUERY_METHODS: [Method; 7] = [
    Method::Execute,
    Method::ExecuteShard,
    Method::ExecuteKeyspaceIds,
    Method::ExecuteKeyRanges,
    Method::ExecuteEntityIds,
    Method::ExecuteBatchShard,
    Method::ExecuteBatchKeyspaceIds,
];

const STREAM_METHODS: [Method; 8] = [
    Method::StreamExecute,
    Method::StreamExecute2,
    Method::StreamExecuteShard,
    Method::StreamExecuteShard2,
    Method::StreamExecuteKeyRanges,
    Method::StreamExecuteKeyRanges2,
    Method::StreamExecuteKeyspaceIds,
    Method::StreamExecuteKeyspaceIds2,
];

pub struct ConformanceSuite {
    conn: GateConn,
    server: Arc<ReferenceServer>,
    fixtures: Arc<FixtureRegistry>,
    scenario_timeout: Duration,
}

impl ConformanceSuite {
    pub fn new(conn: GateConn, server: Arc<ReferenceServer>) -> Self {
        let fixtures = server.fixtures().clone();
        Self { conn, server, fixtures, scenario_timeout: DEFAULT_SCENARIO_TIMEOUT }
    }

    pub fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Every scenario, in execution order.
    pub fn plan() -> Vec<Scenario> {
        let op = |m: Method, mode: FaultMode, check_caller_id: bool| Scenario { kind: ScenarioKind::Op(m), mode, check_caller_id };
        let tx = |kind: ScenarioKind, check_caller_id: bool| Scenario { kind, mode: FaultMode::Normal, check_caller_id };
        let mut plan = Vec::new();

        for m in QUERY_METHODS.iter().chain(STREAM_METHODS.iter()) {
            plan.push(op(*m, FaultMode::Normal, true));
        }
        plan.push(tx(ScenarioKind::TxPass(ProtocolVersion::V1), false));
        plan.push(tx(ScenarioKind::TxPassNotInTransaction(ProtocolVersion::V1), false));
        plan.push(tx(ScenarioKind::TxFail(ProtocolVersion::V1), false));
        plan.push(tx(ScenarioKind::TxPass(ProtocolVersion::V2), true));
        plan.push(tx(ScenarioKind::TxPassNotInTransaction(ProtocolVersion::V2), true));
        plan.push(tx(ScenarioKind::TxFail(ProtocolVersion::V2), true));
        plan.push(op(Method::SplitQuery, FaultMode::Normal, true));
        plan.push(op(Method::GetSrvKeyspace, FaultMode::Normal, true));

        for mode in [FaultMode::DeclaredError, FaultMode::InjectedFault] {
            for m in [Method::Begin, Method::Commit, Method::Rollback] {
                plan.push(op(m, mode, false));
            }
            for m in [Method::Begin2, Method::Commit2, Method::Rollback2] {
                plan.push(op(m, mode, true));
            }
            for m in QUERY_METHODS.iter().chain(STREAM_METHODS.iter()) {
                plan.push(op(*m, mode, true));
            }
            plan.push(op(Method::SplitQuery, mode, true));
            plan.push(op(Method::GetSrvKeyspace, mode, true));
        }
        plan
    }

    pub async fn run(&self) -> SuiteReport {
        let mut report = SuiteReport::default();
        for scenario in Self::plan() {
            report.push(self.run_scenario(scenario).await);
        }
        info!("conformance suite finished: {} passed, {} failed", report.outcomes.len() - report.failed().count(), report.failed().count());
        report
    }

    pub async fn run_scenario(&self, scenario: Scenario) -> ScenarioOutcome {
        let name = scenario.to_string();
        self.server.set_fault_mode(scenario.mode);
        self.server.set_check_caller_id(scenario.check_caller_id);
        let stale = self.server.take_failures();
        if !stale.is_empty() {
            warn!("discarding {} failures recorded outside any scenario", stale.len());
        }

        let mut failures = Vec::new();
        match tokio::time::timeout(self.scenario_timeout, self.scenario_body(scenario)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => failures.push(format!("{:#}", e)),
            Err(_) => failures.push(format!("timed out after {:?}", self.scenario_timeout)),
        }
        failures.extend(self.server.take_failures());

        self.server.set_force_begin_success(false);
        self.server.set_fault_mode(FaultMode::Normal);
        if failures.is_empty() {
            info!("scenario {} ok", name);
        } else {
            warn!("scenario {} failed: {}", name, failures.join("; "));
        }
        ScenarioOutcome { name, failures }
    }

    async fn scenario_body(&self, scenario: Scenario) -> Result<()> {
        match scenario.kind {
            ScenarioKind::Op(m) => self.run_op(m, scenario.mode).await,
            ScenarioKind::TxPass(v) => self.tx_pass(v).await,
            ScenarioKind::TxPassNotInTransaction(v) => self.tx_pass_not_in_transaction(v).await,
            ScenarioKind::TxFail(v) => self.tx_fail(v).await,
        }
    }

    /// Context every suite call runs under: the fixture identity and a fresh request id.
    fn ctx(&self) -> RequestContext {
        RequestContext::new().with_caller_id(self.fixtures.caller_id().clone())
    }

    fn case(&self, key: &str) -> Result<&ExecCase> {
        self.fixtures.lookup(key).ok_or_else(|| anyhow!("fixture {} is not registered", key))
    }

    fn request<Q: ExecShape>(&self, target: Target<'_>) -> Result<Q> {
        match target {
            Target::Fixture(key) => Ok(Q::expected(self.case(key)?).clone()),
            Target::Unregistered(sql) => {
                let mut req = Q::expected(self.case(REQUEST1)?).clone();
                req.set_routing_sql(sql);
                Ok(req)
            }
        }
    }
}

/// Registers `binding` under the `test` protocol of a fresh registry, dials it and runs the suite.
pub async fn run_suite(binding: Dialer, server: Arc<ReferenceServer>, address: &str, dial_timeout: Duration) -> Result<SuiteReport> {
    run_suite_with_timeout(binding, server, address, dial_timeout, DEFAULT_SCENARIO_TIMEOUT).await
}

pub async fn run_suite_with_timeout(
    binding: Dialer,
    server: Arc<ReferenceServer>,
    address: &str,
    dial_timeout: Duration,
    scenario_timeout: Duration,
) -> Result<SuiteReport> {
    let registry = DialerRegistry::new();
    registry.register(TEST_PROTOCOL, binding);
    let conn = registry.dial(TEST_PROTOCOL, address, dial_timeout).await?;
    let suite = ConformanceSuite::new(conn, server).with_scenario_timeout(scenario_timeout);
    Ok(suite.run().await)
}

/// Dials `protocol` through the process-wide dialer registry and runs the suite against `server`.
pub async fn run_registered(
    protocol: &str,
    server: Arc<ReferenceServer>,
    address: &str,
    dial_timeout: Duration,
    scenario_timeout: Duration,
) -> Result<SuiteReport> {
    let conn = crate::conn::dial(protocol, address, dial_timeout).await?;
    info!("running conformance suite over {} at {}", protocol, address);
    let suite = ConformanceSuite::new(conn, server).with_scenario_timeout(scenario_timeout);
    Ok(suite.run().await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_every_method_in_every_fault_mode() {
        let plan = ConformanceSuite::plan();
        for mode in [FaultMode::DeclaredError, FaultMode::InjectedFault] {
            for m in Method::ALL {
                assert!(
                    plan.iter().any(|s| s.kind == ScenarioKind::Op(m) && s.mode == mode),
                    "{} missing in {}",
                    m,
                    mode
                );
            }
        }
        let names: Vec<String> = plan.iter().map(|s| s.to_string()).collect();
        assert!(names.contains(&"Tx2PassNotInTransaction".to_string()));
        assert!(names.contains(&"StreamExecuteKeyRanges2/normal".to_string()));
        let unique: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
