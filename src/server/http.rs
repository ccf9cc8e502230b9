//! HTTP/WebSocket binding of the gateway service.
//!
//! - `POST /rpc/{method}`: JSON request body, `200` + JSON reply on success; on failure the
//!   status from `GateError::http_status` and the JSON-encoded `GateError`.
//! - `GET /stream/{method}`: WebSocket upgrade. The client sends one text frame holding the
//!   request; the server answers with `StreamFrame::Result` frames and exactly one
//!   `StreamFrame::End` carrying the terminal status.
//! - Caller identity travels in the `x-caller-id` header, request ids in `x-request-id`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::boundary::guarded;
use super::dispatch::{dispatch_stream, dispatch_unary};
use super::fault::PANIC_MARKER;
use super::service::{GateService, StreamSink};
use crate::error::GateError;
use crate::identity::{CallerId, RequestContext, CALLER_ID_HEADER};
use crate::proto::{Method, StreamFrame};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state injected into all handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<dyn GateService>,
}

pub fn router(service: Arc<dyn GateService>) -> Router {
    Router::new()
        .route("/", get(|| async { "shardgate ok" }))
        .route("/rpc/{method}", post(rpc_handler))
        .route("/stream/{method}", get(stream_handler))
        .with_state(AppState { service })
}

/// Serve `service` on an already-bound listener until the task is dropped.
pub async fn serve(listener: tokio::net::TcpListener, service: Arc<dyn GateService>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("shardgate http binding listening on {}", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// Bind `127.0.0.1:0` and serve in the background. Used by tests and the conformance binary.
pub async fn spawn_ephemeral(service: Arc<dyn GateService>) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    spawn_at("127.0.0.1:0", service).await
}

/// Bind `address` and serve in the background, returning the bound address.
pub async fn spawn_at(address: &str, service: Arc<dyn GateService>) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, service).await {
            error!("http binding stopped: {}", e);
        }
    });
    Ok((addr, handle))
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let caller_id = headers
        .get(CALLER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(CallerId::from_header_value);
    let ctx = RequestContext { caller_id, ..RequestContext::new() };
    match headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        Some(id) => ctx.with_request_id(id),
        None => ctx,
    }
}

fn error_response(err: GateError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err)).into_response()
}

async fn rpc_handler(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let ctx = context_from_headers(&headers);
    let method = match method.parse::<Method>() {
        Ok(m) => m,
        Err(e) => return error_response(e),
    };
    debug!(method = %method, request_id = %ctx.request_id_or_default(), "rpc");
    match guarded(method, &ctx, dispatch_unary(state.service.as_ref(), &ctx, method, body)).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn stream_handler(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let ctx = context_from_headers(&headers);
    let method = match method.parse::<Method>() {
        Ok(m) if m.is_stream() => m,
        Ok(m) => return error_response(GateError::transport(format!("{} is not a streaming method", m))),
        Err(e) => return error_response(e),
    };
    ws.on_upgrade(move |socket| serve_stream(socket, state.service, ctx, method))
}

async fn send_frame(socket: &mut WebSocket, frame: &StreamFrame) -> Result<(), GateError> {
    let text = serde_json::to_string(frame)?;
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| GateError::transport(format!("websocket: {}", e)))
}

async fn serve_stream(mut socket: WebSocket, service: Arc<dyn GateService>, ctx: RequestContext, method: Method) {
    // First text frame is the request.
    let body = loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => break serde_json::from_str::<serde_json::Value>(text.as_str()),
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!("stream {} closed before request: {}", method, e);
                return;
            }
        }
    };
    let body = match body {
        Ok(b) => b,
        Err(e) => {
            crate::tprintln!("stream {}: undecodable request frame: {}", method, e);
            let _ = send_frame(&mut socket, &StreamFrame::End { error: Some(e.into()) }).await;
            return;
        }
    };

    let (sink, mut rx) = StreamSink::channel();
    let handler = tokio::spawn(async move {
        guarded(method, &ctx, dispatch_stream(service.as_ref(), &ctx, method, body, sink)).await
    });

    // The channel closes once the handler has returned and dropped its sink.
    while let Some(result) = rx.recv().await {
        if let Err(e) = send_frame(&mut socket, &StreamFrame::Result { result }).await {
            warn!("stream {}: client went away: {}", method, e);
            handler.abort();
            return;
        }
    }
    let error = match handler.await {
        Ok(res) => res.err(),
        Err(join) => Some(GateError::panic(format!("{}: {}", PANIC_MARKER, join))),
    };
    if let Err(e) = send_frame(&mut socket, &StreamFrame::End { error }).await {
        warn!("stream {}: terminal frame not delivered: {}", method, e);
    }
    let _ = socket.send(Message::Close(None)).await;
}
