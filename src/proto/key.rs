use serde::{Deserialize, Serialize};

use super::b64;

/// Opaque routing key of a row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyspaceId(#[serde(with = "b64")] pub Vec<u8>);

impl KeyspaceId {
    pub fn new(raw: impl AsRef<[u8]>) -> Self { KeyspaceId(raw.as_ref().to_vec()) }
}

/// Half-open `[start, end)` range of keyspace ids. Empty bounds are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    #[serde(with = "b64")]
    pub start: Vec<u8>,
    #[serde(with = "b64")]
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(start: impl AsRef<[u8]>, end: impl AsRef<[u8]>) -> Self {
        Self { start: start.as_ref().to_vec(), end: end.as_ref().to_vec() }
    }
}

/// Replica class a query should be served by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabletType {
    #[default]
    Unknown,
    Master,
    Replica,
    Rdonly,
    Spare,
    Batch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyspaceIdType {
    #[default]
    Unset,
    Uint64,
    Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tablet_type_is_a_json_map_key() {
        let mut m = std::collections::BTreeMap::new();
        m.insert(TabletType::Master, "other_keyspace".to_string());
        let text = serde_json::to_string(&m).unwrap();
        assert_eq!(text, r#"{"master":"other_keyspace"}"#);
        let back: std::collections::BTreeMap<TabletType, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, m);
    }
}
