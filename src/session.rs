//! Transaction session token.
//! A session is a value: every state transition replaces it wholesale, nothing mutates one
//! after it has been handed out.

use serde::{Deserialize, Serialize};

use crate::proto::TabletType;

/// Per-shard transaction bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSession {
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub in_transaction: bool,
    /// Ordered; equality is positional.
    #[serde(default)]
    pub shard_sessions: Vec<ShardSession>,
}

impl Session {
    /// Session as returned by a fresh begin: active, no shard enlisted yet.
    pub fn begun() -> Self {
        Self { in_transaction: true, shard_sessions: Vec::new() }
    }

    /// New session with one more shard enlisted.
    pub fn with_shard(&self, shard: ShardSession) -> Self {
        let mut shard_sessions = self.shard_sessions.clone();
        shard_sessions.push(shard);
        Self { in_transaction: self.in_transaction, shard_sessions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(name: &str, txid: i64) -> ShardSession {
        ShardSession { keyspace: "ks".into(), shard: name.into(), tablet_type: TabletType::Master, transaction_id: txid }
    }

    #[test]
    fn with_shard_leaves_original_untouched() {
        let s1 = Session::begun();
        let s2 = s1.with_shard(shard("1", 1));
        assert!(s1.shard_sessions.is_empty());
        assert_eq!(s2.shard_sessions.len(), 1);
        assert_eq!(s2.shard_sessions[0].transaction_id, 1);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = Session::begun().with_shard(shard("1", 1)).with_shard(shard("2", 2));
        let b = Session::begun().with_shard(shard("2", 2)).with_shard(shard("1", 1));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
