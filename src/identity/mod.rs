//! Caller identity and the ambient per-call context that carries it.
//! Identity never travels inside a request body as far as the protocol is concerned: the
//! facade lifts it from the context and each binding carries it out-of-band.

mod caller;
mod request_context;

pub use caller::{CallerId, CALLER_ID_HEADER};
pub use request_context::RequestContext;
