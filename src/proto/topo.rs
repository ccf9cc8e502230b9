use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{KeyRange, KeyspaceIdType, TabletType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReference {
    pub name: String,
    pub key_range: KeyRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspacePartition {
    pub shard_references: Vec<ShardReference>,
}

/// Serving-graph snapshot of one keyspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvKeyspace {
    #[serde(default)]
    pub partitions: BTreeMap<TabletType, KeyspacePartition>,
    #[serde(default)]
    pub sharding_column_name: String,
    #[serde(default)]
    pub sharding_column_type: KeyspaceIdType,
    /// Roles served by another keyspace, e.g. during a vertical split.
    #[serde(default)]
    pub served_from: BTreeMap<TabletType, String>,
    #[serde(default)]
    pub split_shard_count: i32,
}
