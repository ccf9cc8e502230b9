//! RPC method catalogue and the small envelopes that have no richer request type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::QueryResult;
use crate::error::GateError;
use crate::identity::CallerId;
use crate::session::Session;

/// Protocol generation. Both generations dispatch to the same handlers; only the wire name differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[default]
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Execute,
    ExecuteShard,
    ExecuteKeyspaceIds,
    ExecuteKeyRanges,
    ExecuteEntityIds,
    ExecuteBatchShard,
    ExecuteBatchKeyspaceIds,
    StreamExecute,
    StreamExecute2,
    StreamExecuteShard,
    StreamExecuteShard2,
    StreamExecuteKeyRanges,
    StreamExecuteKeyRanges2,
    StreamExecuteKeyspaceIds,
    StreamExecuteKeyspaceIds2,
    Begin,
    Begin2,
    Commit,
    Commit2,
    Rollback,
    Rollback2,
    SplitQuery,
    GetSrvKeyspace,
}

/// The four streaming shapes, independent of protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Execute,
    Shard,
    KeyRanges,
    KeyspaceIds,
}

impl StreamKind {
    pub fn method(self, version: ProtocolVersion) -> Method {
        use ProtocolVersion::*;
        match (self, version) {
            (StreamKind::Execute, V1) => Method::StreamExecute,
            (StreamKind::Execute, V2) => Method::StreamExecute2,
            (StreamKind::Shard, V1) => Method::StreamExecuteShard,
            (StreamKind::Shard, V2) => Method::StreamExecuteShard2,
            (StreamKind::KeyRanges, V1) => Method::StreamExecuteKeyRanges,
            (StreamKind::KeyRanges, V2) => Method::StreamExecuteKeyRanges2,
            (StreamKind::KeyspaceIds, V1) => Method::StreamExecuteKeyspaceIds,
            (StreamKind::KeyspaceIds, V2) => Method::StreamExecuteKeyspaceIds2,
        }
    }
}

impl Method {
    pub const ALL: [Method; 23] = [
        Method::Execute,
        Method::ExecuteShard,
        Method::ExecuteKeyspaceIds,
        Method::ExecuteKeyRanges,
        Method::ExecuteEntityIds,
        Method::ExecuteBatchShard,
        Method::ExecuteBatchKeyspaceIds,
        Method::StreamExecute,
        Method::StreamExecute2,
        Method::StreamExecuteShard,
        Method::StreamExecuteShard2,
        Method::StreamExecuteKeyRanges,
        Method::StreamExecuteKeyRanges2,
        Method::StreamExecuteKeyspaceIds,
        Method::StreamExecuteKeyspaceIds2,
        Method::Begin,
        Method::Begin2,
        Method::Commit,
        Method::Commit2,
        Method::Rollback,
        Method::Rollback2,
        Method::SplitQuery,
        Method::GetSrvKeyspace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Execute => "Execute",
            Method::ExecuteShard => "ExecuteShard",
            Method::ExecuteKeyspaceIds => "ExecuteKeyspaceIds",
            Method::ExecuteKeyRanges => "ExecuteKeyRanges",
            Method::ExecuteEntityIds => "ExecuteEntityIds",
            Method::ExecuteBatchShard => "ExecuteBatchShard",
            Method::ExecuteBatchKeyspaceIds => "ExecuteBatchKeyspaceIds",
            Method::StreamExecute => "StreamExecute",
            Method::StreamExecute2 => "StreamExecute2",
            Method::StreamExecuteShard => "StreamExecuteShard",
            Method::StreamExecuteShard2 => "StreamExecuteShard2",
            Method::StreamExecuteKeyRanges => "StreamExecuteKeyRanges",
            Method::StreamExecuteKeyRanges2 => "StreamExecuteKeyRanges2",
            Method::StreamExecuteKeyspaceIds => "StreamExecuteKeyspaceIds",
            Method::StreamExecuteKeyspaceIds2 => "StreamExecuteKeyspaceIds2",
            Method::Begin => "Begin",
            Method::Begin2 => "Begin2",
            Method::Commit => "Commit",
            Method::Commit2 => "Commit2",
            Method::Rollback => "Rollback",
            Method::Rollback2 => "Rollback2",
            Method::SplitQuery => "SplitQuery",
            Method::GetSrvKeyspace => "GetSrvKeyspace",
        }
    }

    pub fn stream_kind(self) -> Option<StreamKind> {
        match self {
            Method::StreamExecute | Method::StreamExecute2 => Some(StreamKind::Execute),
            Method::StreamExecuteShard | Method::StreamExecuteShard2 => Some(StreamKind::Shard),
            Method::StreamExecuteKeyRanges | Method::StreamExecuteKeyRanges2 => Some(StreamKind::KeyRanges),
            Method::StreamExecuteKeyspaceIds | Method::StreamExecuteKeyspaceIds2 => Some(StreamKind::KeyspaceIds),
            _ => None,
        }
    }

    pub fn is_stream(self) -> bool { self.stream_kind().is_some() }

    /// Generation the wire name belongs to; methods that exist only once report `V1`.
    pub fn version(self) -> ProtocolVersion {
        match self {
            Method::StreamExecute2
            | Method::StreamExecuteShard2
            | Method::StreamExecuteKeyRanges2
            | Method::StreamExecuteKeyspaceIds2
            | Method::Begin2
            | Method::Commit2
            | Method::Rollback2 => ProtocolVersion::V2,
            _ => ProtocolVersion::V1,
        }
    }

    pub fn begin(version: ProtocolVersion) -> Method {
        match version { ProtocolVersion::V1 => Method::Begin, ProtocolVersion::V2 => Method::Begin2 }
    }

    pub fn commit(version: ProtocolVersion) -> Method {
        match version { ProtocolVersion::V1 => Method::Commit, ProtocolVersion::V2 => Method::Commit2 }
    }

    pub fn rollback(version: ProtocolVersion) -> Method {
        match version { ProtocolVersion::V1 => Method::Rollback, ProtocolVersion::V2 => Method::Rollback2 }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Method {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| GateError::transport(format!("unknown method: {}", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginRequest {
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Commit and rollback carry only the session being finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session: Session,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvKeyspaceRequest {
    pub keyspace: String,
    #[serde(default)]
    pub caller_id: Option<CallerId>,
}

/// Server-to-client frame of a streaming call over a message transport.
/// A stream is any number of `Result` frames followed by exactly one `End`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum StreamFrame {
    Result { result: QueryResult },
    End {
        #[serde(default)]
        error: Option<GateError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for m in Method::ALL {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
        }
        assert!("Nope".parse::<Method>().is_err());
    }

    #[test]
    fn stream_generations_share_a_kind() {
        for kind in [StreamKind::Execute, StreamKind::Shard, StreamKind::KeyRanges, StreamKind::KeyspaceIds] {
            let v1 = kind.method(ProtocolVersion::V1);
            let v2 = kind.method(ProtocolVersion::V2);
            assert_ne!(v1, v2);
            assert_eq!(v1.stream_kind(), Some(kind));
            assert_eq!(v2.stream_kind(), Some(kind));
            assert_eq!(v2.version(), ProtocolVersion::V2);
            assert_eq!(v1.version(), ProtocolVersion::V1);
        }
        assert!(!Method::Commit2.is_stream());
    }

    #[test]
    fn end_frame_shape() {
        let text = serde_json::to_string(&StreamFrame::End { error: None }).unwrap();
        assert_eq!(text, r#"{"frame":"end","error":null}"#);
    }
}
