//! HTTP/WebSocket client binding: reqwest for unary calls, tokio-tungstenite for streams.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue as WsHeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::registry::{DialFuture, Dialer};
use super::{GateConnImpl, QueryStream};
use crate::error::{GateError, GateResult};
use crate::identity::{RequestContext, CALLER_ID_HEADER};
use crate::proto::{
    BatchQueryShard, BeginRequest, EntityIdsQuery, KeyRangeQuery, KeyspaceIdBatchQuery, KeyspaceIdQuery, Method,
    ProtocolVersion, Query, QueryResponse, QueryResultList, QueryShard, SessionRequest, SplitQueryRequest,
    SplitQueryResult, SrvKeyspace, SrvKeyspaceRequest, StreamFrame, StreamKind,
};
use crate::server::http::REQUEST_ID_HEADER;
use crate::session::Session;

pub struct HttpConn {
    base_url: String,
    ws_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

/// Dialer for `host:port` or `http://host:port` addresses.
pub fn dialer() -> Dialer {
    Arc::new(|address: String, timeout: Duration| {
        Box::pin(async move {
            let conn = HttpConn::connect(&address, timeout).await?;
            Ok::<_, GateError>(Arc::new(conn) as Arc<dyn GateConnImpl>)
        }) as DialFuture
    })
}

fn header_value(raw: &str) -> GateResult<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| GateError::transport(format!("invalid header value: {}", e)))
}

impl HttpConn {
    /// Builds the client and checks the server answers its health route.
    pub async fn connect(address: &str, timeout: Duration) -> GateResult<Self> {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };
        let ws_url = base_url.replacen("http", "ws", 1);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        client.get(format!("{}/", base_url)).send().await?.error_for_status()?;
        debug!("http binding connected to {}", base_url);
        Ok(Self { base_url, ws_url, client, timeout })
    }

    fn headers(ctx: &RequestContext) -> GateResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(id) = &ctx.caller_id {
            headers.insert(CALLER_ID_HEADER, header_value(&id.to_header_value())?);
        }
        if let Some(rid) = &ctx.request_id {
            headers.insert(REQUEST_ID_HEADER, header_value(rid)?);
        }
        Ok(headers)
    }

    async fn rpc<Req, Resp>(&self, ctx: &RequestContext, method: Method, req: &Req) -> GateResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let resp = self
            .client
            .post(format!("{}/rpc/{}", self.base_url, method))
            .headers(Self::headers(ctx)?)
            .json(req)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }
        match serde_json::from_slice::<GateError>(&body) {
            Ok(err) => Err(err),
            Err(_) => Err(GateError::transport(format!("http {}: {}", status, String::from_utf8_lossy(&body)))),
        }
    }

    async fn open_stream<Req: Serialize + Sync>(&self, ctx: &RequestContext, method: Method, req: &Req) -> GateResult<QueryStream> {
        let mut request = format!("{}/stream/{}", self.ws_url, method).into_client_request()?;
        if let Some(id) = &ctx.caller_id {
            let value = WsHeaderValue::from_str(&id.to_header_value())
                .map_err(|e| GateError::transport(format!("invalid header value: {}", e)))?;
            request.headers_mut().insert(CALLER_ID_HEADER, value);
        }
        if let Some(rid) = &ctx.request_id {
            let value = WsHeaderValue::from_str(rid).map_err(|e| GateError::transport(format!("invalid header value: {}", e)))?;
            request.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        let (mut ws, _resp) = match tokio::time::timeout(self.timeout, tokio_tungstenite::connect_async(request)).await {
            Ok(res) => res?,
            Err(_) => return Err(GateError::transport(format!("stream {}: connect timed out", method))),
        };
        ws.send(Message::Text(serde_json::to_string(req)?)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<StreamFrame>(&text) {
                        Ok(StreamFrame::Result { result }) => {
                            if tx.send(result).is_err() {
                                break Err(GateError::transport("stream consumer went away"));
                            }
                        }
                        Ok(StreamFrame::End { error }) => break error.map_or(Ok(()), Err),
                        Err(e) => break Err(e.into()),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        break Err(GateError::transport("stream closed without a terminal status"))
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e.into()),
                }
            };
            // Close the result sequence before publishing the status.
            drop(tx);
            let _ = ws.close(None).await;
            let _ = status_tx.send(status);
        });
        Ok(QueryStream::new(rx, status_rx))
    }
}

#[async_trait]
impl GateConnImpl for HttpConn {
    async fn execute(&self, ctx: &RequestContext, req: Query) -> GateResult<QueryResponse> {
        self.rpc(ctx, Method::Execute, &req).await
    }

    async fn execute_shard(&self, ctx: &RequestContext, req: QueryShard) -> GateResult<QueryResponse> {
        self.rpc(ctx, Method::ExecuteShard, &req).await
    }

    async fn execute_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdQuery) -> GateResult<QueryResponse> {
        self.rpc(ctx, Method::ExecuteKeyspaceIds, &req).await
    }

    async fn execute_key_ranges(&self, ctx: &RequestContext, req: KeyRangeQuery) -> GateResult<QueryResponse> {
        self.rpc(ctx, Method::ExecuteKeyRanges, &req).await
    }

    async fn execute_entity_ids(&self, ctx: &RequestContext, req: EntityIdsQuery) -> GateResult<QueryResponse> {
        self.rpc(ctx, Method::ExecuteEntityIds, &req).await
    }

    async fn execute_batch_shard(&self, ctx: &RequestContext, req: BatchQueryShard) -> GateResult<QueryResultList> {
        self.rpc(ctx, Method::ExecuteBatchShard, &req).await
    }

    async fn execute_batch_keyspace_ids(&self, ctx: &RequestContext, req: KeyspaceIdBatchQuery) -> GateResult<QueryResultList> {
        self.rpc(ctx, Method::ExecuteBatchKeyspaceIds, &req).await
    }

    async fn stream_execute(&self, ctx: &RequestContext, version: ProtocolVersion, req: Query) -> GateResult<QueryStream> {
        self.open_stream(ctx, StreamKind::Execute.method(version), &req).await
    }

    async fn stream_execute_shard(&self, ctx: &RequestContext, version: ProtocolVersion, req: QueryShard) -> GateResult<QueryStream> {
        self.open_stream(ctx, StreamKind::Shard.method(version), &req).await
    }

    async fn stream_execute_key_ranges(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyRangeQuery) -> GateResult<QueryStream> {
        self.open_stream(ctx, StreamKind::KeyRanges.method(version), &req).await
    }

    async fn stream_execute_keyspace_ids(&self, ctx: &RequestContext, version: ProtocolVersion, req: KeyspaceIdQuery) -> GateResult<QueryStream> {
        self.open_stream(ctx, StreamKind::KeyspaceIds.method(version), &req).await
    }

    async fn begin(&self, ctx: &RequestContext, version: ProtocolVersion) -> GateResult<Session> {
        let req = BeginRequest { caller_id: ctx.caller_id.clone() };
        self.rpc(ctx, Method::begin(version), &req).await
    }

    async fn commit(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()> {
        let req = SessionRequest { session, caller_id: ctx.caller_id.clone() };
        self.rpc(ctx, Method::commit(version), &req).await
    }

    async fn rollback(&self, ctx: &RequestContext, version: ProtocolVersion, session: Session) -> GateResult<()> {
        let req = SessionRequest { session, caller_id: ctx.caller_id.clone() };
        self.rpc(ctx, Method::rollback(version), &req).await
    }

    async fn split_query(&self, ctx: &RequestContext, req: SplitQueryRequest) -> GateResult<SplitQueryResult> {
        self.rpc(ctx, Method::SplitQuery, &req).await
    }

    async fn get_srv_keyspace(&self, ctx: &RequestContext, keyspace: &str) -> GateResult<SrvKeyspace> {
        let req = SrvKeyspaceRequest { keyspace: keyspace.to_string(), caller_id: ctx.caller_id.clone() };
        self.rpc(ctx, Method::GetSrvKeyspace, &req).await
    }
}
