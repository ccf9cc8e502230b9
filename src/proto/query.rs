//! The seven query-routing request shapes.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{BindValue, BindVariables, KeyRange, KeyspaceId, TabletType};
use crate::identity::CallerId;
use crate::session::Session;

/// Whole query; the gateway picks the shards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub not_in_transaction: bool,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Query sent to an explicit list of shards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryShard {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub shards: Vec<String>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub not_in_transaction: bool,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Query routed by explicit keyspace ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceIdQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub keyspace_ids: Vec<KeyspaceId>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub not_in_transaction: bool,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Query routed to every shard overlapping the key ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyRangeQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub key_ranges: Vec<KeyRange>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub not_in_transaction: bool,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Maps an external entity value to the keyspace id that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityId {
    pub external_id: BindValue,
    pub keyspace_id: KeyspaceId,
}

/// Query whose entity column values are split per owning shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityIdsQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub entity_column_name: String,
    pub entity_keyspace_ids: Vec<EntityId>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub not_in_transaction: bool,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundShardQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub shards: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundKeyspaceIdQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
    pub keyspace: String,
    pub keyspace_ids: Vec<KeyspaceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchQueryShard {
    pub queries: Vec<BoundShardQuery>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub as_transaction: bool,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceIdBatchQuery {
    pub queries: Vec<BoundKeyspaceIdQuery>,
    pub tablet_type: TabletType,
    #[serde(default)]
    pub as_transaction: bool,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Common surface of every request shape: the text it is routed by, plus the identity and
/// session slots the facade and the server manipulate.
pub trait Routed: Clone + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// SQL text the request is keyed by. Batches use their first sub-query; an empty batch keys on `""`.
    fn routing_sql(&self) -> &str;
    /// Rewrites the routing text. A batch rewrites its first sub-query and ignores an empty batch.
    fn set_routing_sql(&mut self, sql: &str);
    fn set_caller_id(&mut self, caller_id: Option<CallerId>);
    fn set_session(&mut self, session: Option<Session>);
}

macro_rules! routed_by_sql {
    ($($ty:ty),* $(,)?) => {$(
        impl Routed for $ty {
            fn routing_sql(&self) -> &str { &self.sql }
            fn set_routing_sql(&mut self, sql: &str) { self.sql = sql.to_string(); }
            fn set_caller_id(&mut self, caller_id: Option<CallerId>) { self.caller_id = caller_id; }
            fn set_session(&mut self, session: Option<Session>) { self.session = session; }
        }
    )*};
}

macro_rules! routed_by_first_query {
    ($($ty:ty),* $(,)?) => {$(
        impl Routed for $ty {
            fn routing_sql(&self) -> &str { self.queries.first().map(|q| q.sql.as_str()).unwrap_or("") }
            fn set_routing_sql(&mut self, sql: &str) {
                if let Some(q) = self.queries.first_mut() { q.sql = sql.to_string(); }
            }
            fn set_caller_id(&mut self, caller_id: Option<CallerId>) { self.caller_id = caller_id; }
            fn set_session(&mut self, session: Option<Session>) { self.session = session; }
        }
    )*};
}

routed_by_sql!(Query, QueryShard, KeyspaceIdQuery, KeyRangeQuery, EntityIdsQuery);
routed_by_first_query!(BatchQueryShard, KeyspaceIdBatchQuery);
