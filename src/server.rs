//!
//! shardgate reference server
//! --------------------------
//! The server half of the gateway protocol: the `GateService` trait every binding dispatches
//! into, the fixture-backed `ReferenceServer`, fault injection, the panic boundary and the
//! Axum-based HTTP/WebSocket binding.

pub mod service;
pub mod fault;
pub mod boundary;
pub mod dispatch;
pub mod reference;
pub mod http;

pub use boundary::guarded;
pub use fault::{release_gate, FaultMode, ReleaseGate, ReleaseHandle, BACKEND_SENTINEL, FORCED_PANIC_MESSAGE, PANIC_MARKER};
pub use reference::ReferenceServer;
pub use service::{GateService, StreamSink};
