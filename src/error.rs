//! Unified error model for the gateway protocol.
//! Every protocol operation, on every transport binding, returns `GateError`. The `Display`
//! form is the bare message so error text survives a round trip through any binding unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateError {
    /// The request key is not registered with the backend.
    #[error("{message}")]
    NotFound { message: String },
    /// Declared inside a reply envelope (non-streaming) or as a stream's terminal status.
    #[error("{message}")]
    Application { message: String },
    /// The backend refused the call outright.
    #[error("{message}")]
    Backend { message: String },
    /// A handler terminated abnormally and the boundary converted it.
    #[error("{message}")]
    Panic { message: String },
    /// Transaction state-machine violation.
    #[error("{message}")]
    Transaction { message: String },
    /// The binding itself failed: connect, encode, decode, closed stream.
    #[error("{message}")]
    Transport { message: String },
}

impl GateError {
    pub fn code_str(&self) -> &'static str {
        match self {
            GateError::NotFound { .. } => "not_found",
            GateError::Application { .. } => "application",
            GateError::Backend { .. } => "backend",
            GateError::Panic { .. } => "internal_panic",
            GateError::Transaction { .. } => "transaction",
            GateError::Transport { .. } => "transport",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            GateError::NotFound { message }
            | GateError::Application { message }
            | GateError::Backend { message }
            | GateError::Panic { message }
            | GateError::Transaction { message }
            | GateError::Transport { message } => message.as_str(),
        }
    }

    pub fn no_match(sql: &str) -> Self { GateError::NotFound { message: format!("no match for: {}", sql) } }
    pub fn application<S: Into<String>>(msg: S) -> Self { GateError::Application { message: msg.into() } }
    pub fn backend<S: Into<String>>(msg: S) -> Self { GateError::Backend { message: msg.into() } }
    pub fn panic<S: Into<String>>(msg: S) -> Self { GateError::Panic { message: msg.into() } }
    pub fn transport<S: Into<String>>(msg: S) -> Self { GateError::Transport { message: msg.into() } }

    /// `"<op>: not in transaction"`, where `op` is the lower-camel operation name.
    pub fn not_in_transaction(op: &str) -> Self {
        GateError::Transaction { message: format!("{}: not in transaction", op) }
    }

    /// `"<op>: session mismatch"`, where `op` is `commit` or `rollback`.
    pub fn session_mismatch(op: &str) -> Self {
        GateError::Transaction { message: format!("{}: session mismatch", op) }
    }

    /// Map to HTTP status code for the HTTP binding.
    pub fn http_status(&self) -> u16 {
        match self {
            GateError::NotFound { .. } => 404,
            GateError::Application { .. } => 422,
            GateError::Backend { .. } => 503,
            GateError::Panic { .. } => 500,
            GateError::Transaction { .. } => 409,
            GateError::Transport { .. } => 502,
        }
    }
}

pub type GateResult<T> = Result<T, GateError>;

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::transport(format!("codec: {}", err))
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::transport(format!("http: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GateError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GateError::transport(format!("websocket: {}", err))
    }
}
