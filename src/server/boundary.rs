//! Panic boundary: every handler invocation, on every binding, runs through `guarded` so an
//! unwinding handler turns into an ordinary `GateError::Panic` instead of taking the task down.

use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt; // for catch_unwind on async blocks
use tracing::{error, Instrument};

use super::fault::PANIC_MARKER;
use crate::error::{GateError, GateResult};
use crate::identity::RequestContext;
use crate::proto::Method;

/// Frames kept from the captured backtrace; enough to locate the handler without flooding the wire.
const STACK_LINES: usize = 48;

pub async fn guarded<T, F>(method: Method, ctx: &RequestContext, fut: F) -> GateResult<T>
where
    F: Future<Output = GateResult<T>>,
{
    let span = tracing::debug_span!("rpc", method = %method, request_id = %ctx.request_id_or_default());
    match AssertUnwindSafe(fut).catch_unwind().instrument(span).await {
        Ok(res) => res,
        Err(payload) => Err(panic_to_error(method, payload)),
    }
}

/// `"uncaught panic: <message>\n<stack fragment>"`.
pub fn panic_to_error(method: Method, payload: Box<dyn Any + Send>) -> GateError {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() { s.to_string() }
              else if let Some(s) = payload.downcast_ref::<String>() { s.clone() }
              else { "panic".to_string() };
    error!(target: "panic", method = %method, "{}: {}", PANIC_MARKER, msg);
    GateError::panic(format!("{}: {}\n{}", PANIC_MARKER, msg, stack_fragment()))
}

fn stack_fragment() -> String {
    let trace = Backtrace::force_capture().to_string();
    let mut out: Vec<&str> = trace.lines().take(STACK_LINES).collect();
    if out.is_empty() {
        out.push("<no backtrace>");
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_becomes_error_with_marker() {
        let ctx = RequestContext::new();
        let n = 7;
        let res: GateResult<()> = guarded(Method::Execute, &ctx, async move {
            if n > 0 {
                panic!("boom {}", n);
            }
            Ok(())
        })
        .await;
        let err = res.unwrap_err();
        assert_eq!(err.code_str(), "internal_panic");
        assert!(err.to_string().starts_with("uncaught panic: boom 7\n"));
        assert!(err.to_string().lines().count() > 1);
    }

    #[tokio::test]
    async fn ordinary_results_pass_through() {
        let ctx = RequestContext::new();
        let ok: GateResult<u8> = guarded(Method::Begin, &ctx, async { Ok(3) }).await;
        assert_eq!(ok, Ok(3));
        let err: GateResult<u8> = guarded(Method::Begin, &ctx, async { Err(GateError::backend("down")) }).await;
        assert_eq!(err, Err(GateError::backend("down")));
    }
}
