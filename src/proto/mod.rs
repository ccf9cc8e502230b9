//! Wire-level data model shared by the client facade, every transport binding and the
//! reference server. All shapes are plain serde structs; byte strings are base64 on the wire.

mod value;
mod key;
mod query;
mod result;
mod topo;
mod split;
mod method;

pub use value::{b64, BindValue, BindVariables, Value};
pub use key::{KeyRange, KeyspaceId, KeyspaceIdType, TabletType};
pub use query::{
    BatchQueryShard, BoundKeyspaceIdQuery, BoundShardQuery, EntityId, EntityIdsQuery, KeyRangeQuery,
    KeyspaceIdBatchQuery, KeyspaceIdQuery, Query, QueryShard, Routed,
};
pub use result::{Field, QueryResponse, QueryResult, QueryResultList};
pub use topo::{KeyspacePartition, ShardReference, SrvKeyspace};
pub use split::{BoundQuery, SplitQueryPart, SplitQueryRequest, SplitQueryResult};
pub use method::{BeginRequest, Method, ProtocolVersion, SessionRequest, SrvKeyspaceRequest, StreamFrame, StreamKind};
