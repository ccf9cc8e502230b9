use serde::{Deserialize, Serialize};

use super::{BindVariables, KeyRangeQuery};
use crate::identity::CallerId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundQuery {
    pub sql: String,
    #[serde(default)]
    pub bind_variables: BindVariables,
}

/// Ask the gateway to cut a query into roughly equal key-range slices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitQueryRequest {
    pub keyspace: String,
    pub query: BoundQuery,
    pub split_column: String,
    pub split_count: i64,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitQueryPart {
    pub query: KeyRangeQuery,
    /// Approximate row count of the slice.
    pub size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitQueryResult {
    pub splits: Vec<SplitQueryPart>,
}
