//! Canonical request/response fixtures.
//! The registry is built once, shared by `Arc` between the reference server (which answers
//! from it) and the conformance suite (which asserts against it), and never mutated.

use std::collections::{BTreeMap, HashMap};

use crate::identity::CallerId;
use crate::proto::{
    BatchQueryShard, BindValue, BindVariables, BoundKeyspaceIdQuery, BoundQuery, BoundShardQuery, EntityId,
    EntityIdsQuery, Field, KeyRange, KeyRangeQuery, KeyspaceId, KeyspaceIdBatchQuery, KeyspaceIdQuery,
    KeyspaceIdType, KeyspacePartition, Query, QueryResponse, QueryResult, QueryShard, Routed, ShardReference,
    SplitQueryPart, SplitQueryRequest, SplitQueryResult, SrvKeyspace, TabletType, Value,
};
use crate::session::{Session, ShardSession};

pub const REQUEST1: &str = "request1";
pub const ERROR_REQUEST: &str = "errorRequest";
pub const TX_REQUEST: &str = "txRequest";
pub const TX_REQUEST_NIT: &str = "txRequestNIT";
pub const APP_ERROR: &str = "app error";
pub const SRV_KEYSPACE_NAME: &str = "test_keyspace";

/// One registered SQL text: the exact request expected for each of the seven shapes, plus the reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecCase {
    pub query: Query,
    pub query_shard: QueryShard,
    pub keyspace_id_query: KeyspaceIdQuery,
    pub key_range_query: KeyRangeQuery,
    pub entity_ids_query: EntityIdsQuery,
    pub batch_query_shard: BatchQueryShard,
    pub keyspace_id_batch_query: KeyspaceIdBatchQuery,
    pub reply: QueryResponse,
}

/// A request shape that has a canonical instance in every `ExecCase`.
pub trait ExecShape: Routed {
    fn expected(case: &ExecCase) -> &Self;
}

impl ExecShape for Query {
    fn expected(case: &ExecCase) -> &Self { &case.query }
}
impl ExecShape for QueryShard {
    fn expected(case: &ExecCase) -> &Self { &case.query_shard }
}
impl ExecShape for KeyspaceIdQuery {
    fn expected(case: &ExecCase) -> &Self { &case.keyspace_id_query }
}
impl ExecShape for KeyRangeQuery {
    fn expected(case: &ExecCase) -> &Self { &case.key_range_query }
}
impl ExecShape for EntityIdsQuery {
    fn expected(case: &ExecCase) -> &Self { &case.entity_ids_query }
}
impl ExecShape for BatchQueryShard {
    fn expected(case: &ExecCase) -> &Self { &case.batch_query_shard }
}
impl ExecShape for KeyspaceIdBatchQuery {
    fn expected(case: &ExecCase) -> &Self { &case.keyspace_id_batch_query }
}

#[derive(Debug, Clone)]
pub struct FixtureRegistry {
    cases: HashMap<String, ExecCase>,
    caller_id: CallerId,
    session1: Session,
    session2: Session,
    result1: QueryResult,
    stream_result1: QueryResult,
    split_request: SplitQueryRequest,
    split_result: SplitQueryResult,
    srv_keyspace: SrvKeyspace,
}

/// Knobs that differ between the execute fixtures.
struct CaseParams<'a> {
    sql: &'a str,
    tablet_type: TabletType,
    shard_keyspace: &'a str,
    shards: &'a [&'a str],
    as_transaction: bool,
    session: Option<Session>,
    not_in_transaction: bool,
    reply: QueryResponse,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn bind1(v: i64) -> BindVariables {
    let mut b = BindVariables::new();
    b.insert("bind1".to_string(), BindValue::Int64(v));
    b
}

fn build_case(p: CaseParams<'_>) -> ExecCase {
    let sql = p.sql.to_string();
    let bind = bind1(0);
    let session = p.session;
    let nit = p.not_in_transaction;
    ExecCase {
        query: Query {
            sql: sql.clone(),
            bind_variables: bind.clone(),
            tablet_type: p.tablet_type,
            session: session.clone(),
            not_in_transaction: nit,
            caller_id: None,
        },
        query_shard: QueryShard {
            sql: sql.clone(),
            bind_variables: bind.clone(),
            keyspace: p.shard_keyspace.to_string(),
            shards: strings(p.shards),
            tablet_type: p.tablet_type,
            session: session.clone(),
            not_in_transaction: nit,
            caller_id: None,
        },
        keyspace_id_query: KeyspaceIdQuery {
            sql: sql.clone(),
            bind_variables: bind.clone(),
            keyspace: "ks".into(),
            keyspace_ids: vec![KeyspaceId::new("a")],
            tablet_type: TabletType::Rdonly,
            session: session.clone(),
            not_in_transaction: nit,
            caller_id: None,
        },
        key_range_query: KeyRangeQuery {
            sql: sql.clone(),
            bind_variables: bind.clone(),
            keyspace: "ks".into(),
            key_ranges: vec![KeyRange::new("s", "e")],
            tablet_type: TabletType::Rdonly,
            session: session.clone(),
            not_in_transaction: nit,
            caller_id: None,
        },
        entity_ids_query: EntityIdsQuery {
            sql: sql.clone(),
            bind_variables: bind.clone(),
            keyspace: "ks".into(),
            entity_column_name: "column".into(),
            entity_keyspace_ids: vec![EntityId { external_id: BindValue::bytes("id1"), keyspace_id: KeyspaceId::new("k") }],
            tablet_type: TabletType::Rdonly,
            session: session.clone(),
            not_in_transaction: nit,
            caller_id: None,
        },
        batch_query_shard: BatchQueryShard {
            queries: vec![BoundShardQuery {
                sql: sql.clone(),
                bind_variables: bind.clone(),
                keyspace: "ks".into(),
                shards: strings(&["-80", "80-"]),
            }],
            tablet_type: TabletType::Rdonly,
            as_transaction: p.as_transaction,
            session: session.clone(),
            caller_id: None,
        },
        keyspace_id_batch_query: KeyspaceIdBatchQuery {
            queries: vec![BoundKeyspaceIdQuery {
                sql,
                bind_variables: bind,
                keyspace: "ks".into(),
                keyspace_ids: vec![KeyspaceId::new("ki1")],
            }],
            tablet_type: TabletType::Rdonly,
            as_transaction: p.as_transaction,
            session,
            caller_id: None,
        },
        reply: p.reply,
    }
}

impl FixtureRegistry {
    /// The canonical fixture set every binding is verified against.
    pub fn canonical() -> Self {
        let fields = vec![Field::new("field1", 42), Field::new("field2", 73)];
        let result1 = QueryResult {
            fields: fields.clone(),
            rows_affected: 123,
            insert_id: 72,
            rows: vec![
                vec![Value::string("row1 value1"), Value::string("row1 value2")],
                vec![Value::string("row2 value1"), Value::string("row2 value2")],
            ],
        };
        let stream_result1 = QueryResult { fields, ..Default::default() };

        let session1 = Session::begun();
        let session2 = session1.with_shard(ShardSession {
            keyspace: "ks".into(),
            shard: "1".into(),
            tablet_type: TabletType::Master,
            transaction_id: 1,
        });

        let params = vec![
            CaseParams {
                sql: REQUEST1,
                tablet_type: TabletType::Rdonly,
                shard_keyspace: "ks",
                shards: &["1", "2"],
                as_transaction: true,
                session: None,
                not_in_transaction: false,
                reply: QueryResponse { result: Some(result1.clone()), session: None, error: String::new() },
            },
            CaseParams {
                sql: ERROR_REQUEST,
                tablet_type: TabletType::Rdonly,
                shard_keyspace: "",
                shards: &["s1", "s2"],
                as_transaction: false,
                session: None,
                not_in_transaction: false,
                reply: QueryResponse { result: None, session: None, error: APP_ERROR.to_string() },
            },
            CaseParams {
                sql: TX_REQUEST,
                tablet_type: TabletType::Master,
                shard_keyspace: "",
                shards: &["s1", "s2"],
                as_transaction: true,
                session: Some(session1.clone()),
                not_in_transaction: false,
                reply: QueryResponse { result: None, session: Some(session2.clone()), error: String::new() },
            },
            CaseParams {
                sql: TX_REQUEST_NIT,
                tablet_type: TabletType::Master,
                shard_keyspace: "",
                shards: &["s1", "s2"],
                as_transaction: true,
                session: Some(session1.clone()),
                not_in_transaction: true,
                reply: QueryResponse { result: None, session: Some(session1.clone()), error: String::new() },
            },
        ];
        let cases = params.into_iter().map(|s| (s.sql.to_string(), build_case(s))).collect();

        let split_request = SplitQueryRequest {
            keyspace: "ks".into(),
            query: BoundQuery { sql: "in for SplitQuery".into(), bind_variables: bind1(43) },
            split_column: "split_column".into(),
            split_count: 13,
            caller_id: None,
        };
        let split_result = SplitQueryResult {
            splits: vec![SplitQueryPart {
                query: KeyRangeQuery {
                    sql: "out for SplitQuery".into(),
                    bind_variables: bind1(1114444),
                    keyspace: "ksout".into(),
                    key_ranges: vec![KeyRange::new("s", "e")],
                    ..Default::default()
                },
                size: 12344,
            }],
        };

        let mut partitions = BTreeMap::new();
        partitions.insert(
            TabletType::Replica,
            KeyspacePartition {
                shard_references: vec![ShardReference { name: "shard0".into(), key_range: KeyRange::new("s", "e") }],
            },
        );
        let mut served_from = BTreeMap::new();
        served_from.insert(TabletType::Master, "other_keyspace".to_string());
        let srv_keyspace = SrvKeyspace {
            partitions,
            sharding_column_name: "sharding_column_name".into(),
            sharding_column_type: KeyspaceIdType::Uint64,
            served_from,
            split_shard_count: 128,
        };

        Self {
            cases,
            caller_id: CallerId::new("test_principal", "test_component", "test_subcomponent"),
            session1,
            session2,
            result1,
            stream_result1,
            split_request,
            split_result,
            srv_keyspace,
        }
    }

    pub fn lookup(&self, sql: &str) -> Option<&ExecCase> {
        self.cases.get(sql)
    }

    pub fn caller_id(&self) -> &CallerId { &self.caller_id }
    /// Session returned by begin.
    pub fn session1(&self) -> &Session { &self.session1 }
    /// Session after a transactional execute; the only one commit/rollback accept.
    pub fn session2(&self) -> &Session { &self.session2 }
    pub fn result1(&self) -> &QueryResult { &self.result1 }
    /// First streamed message of `request1`: descriptors only.
    pub fn stream_result1(&self) -> &QueryResult { &self.stream_result1 }
    pub fn split_request(&self) -> &SplitQueryRequest { &self.split_request }
    pub fn split_result(&self) -> &SplitQueryResult { &self.split_result }
    pub fn srv_keyspace_name(&self) -> &str { SRV_KEYSPACE_NAME }
    pub fn srv_keyspace(&self) -> &SrvKeyspace { &self.srv_keyspace }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_reference_stable() {
        let reg = FixtureRegistry::canonical();
        let a = reg.lookup(REQUEST1).unwrap();
        let b = reg.lookup(REQUEST1).unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a, b);
        assert!(reg.lookup("none").is_none());
        assert_eq!(reg.cases.len(), 4);
    }

    #[test]
    fn request1_shapes() {
        let reg = FixtureRegistry::canonical();
        let case = reg.lookup(REQUEST1).unwrap();
        assert_eq!(case.query.tablet_type, TabletType::Rdonly);
        assert_eq!(case.query_shard.shards, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(case.batch_query_shard.routing_sql(), REQUEST1);
        assert!(case.keyspace_id_batch_query.as_transaction);
        let result = case.reply.result.as_ref().unwrap();
        assert_eq!(result.fields, vec![Field::new("field1", 42), Field::new("field2", 73)]);
        assert_eq!((result.rows_affected, result.insert_id), (123, 72));
        assert_eq!(result.rows.len(), 2);
        assert!(result.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn transaction_fixtures() {
        let reg = FixtureRegistry::canonical();
        let tx = reg.lookup(TX_REQUEST).unwrap();
        assert_eq!(tx.query.session.as_ref(), Some(reg.session1()));
        assert_eq!(tx.reply.session.as_ref(), Some(reg.session2()));
        assert_eq!(tx.query.tablet_type, TabletType::Master);
        let nit = reg.lookup(TX_REQUEST_NIT).unwrap();
        assert!(nit.query.not_in_transaction && nit.entity_ids_query.not_in_transaction);
        assert_eq!(nit.reply.session.as_ref(), Some(reg.session1()));
        assert_ne!(reg.session1(), reg.session2());
        let err = reg.lookup(ERROR_REQUEST).unwrap();
        assert_eq!(err.reply.error, APP_ERROR);
        assert!(err.reply.result.is_none());
        assert!(!err.batch_query_shard.as_transaction);
    }

    #[test]
    fn split_and_topology() {
        let reg = FixtureRegistry::canonical();
        let part = &reg.split_result().splits[0];
        assert_eq!(part.query.sql, "out for SplitQuery");
        assert_eq!(part.query.keyspace, "ksout");
        assert_eq!(part.size, 12344);
        assert_eq!(reg.srv_keyspace().partitions[&TabletType::Replica].shard_references[0].name, "shard0");
        assert_eq!(reg.srv_keyspace().served_from.get(&TabletType::Master).map(String::as_str), Some("other_keyspace"));
    }
}
