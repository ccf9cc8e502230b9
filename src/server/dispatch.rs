//! Method-name dispatch for message-oriented bindings: decode a JSON body into the typed request,
//! call the service, encode the typed reply.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::service::{GateService, StreamSink};
use crate::error::{GateError, GateResult};
use crate::identity::RequestContext;
use crate::proto::{BeginRequest, Method, SessionRequest, SrvKeyspaceRequest, StreamKind};

fn decode<T: DeserializeOwned>(body: serde_json::Value) -> GateResult<T> {
    Ok(serde_json::from_value(body)?)
}

fn encode<T: Serialize>(reply: T) -> GateResult<serde_json::Value> {
    Ok(serde_json::to_value(reply)?)
}

pub async fn dispatch_unary(
    service: &dyn GateService,
    ctx: &RequestContext,
    method: Method,
    body: serde_json::Value,
) -> GateResult<serde_json::Value> {
    match method {
        Method::Execute => encode(service.execute(ctx, decode(body)?).await?),
        Method::ExecuteShard => encode(service.execute_shard(ctx, decode(body)?).await?),
        Method::ExecuteKeyspaceIds => encode(service.execute_keyspace_ids(ctx, decode(body)?).await?),
        Method::ExecuteKeyRanges => encode(service.execute_key_ranges(ctx, decode(body)?).await?),
        Method::ExecuteEntityIds => encode(service.execute_entity_ids(ctx, decode(body)?).await?),
        Method::ExecuteBatchShard => encode(service.execute_batch_shard(ctx, decode(body)?).await?),
        Method::ExecuteBatchKeyspaceIds => encode(service.execute_batch_keyspace_ids(ctx, decode(body)?).await?),
        Method::Begin | Method::Begin2 => {
            let _req: BeginRequest = decode(body)?;
            encode(service.begin(ctx).await?)
        }
        Method::Commit | Method::Commit2 => {
            let req: SessionRequest = decode(body)?;
            service.commit(ctx, req.session).await?;
            Ok(serde_json::Value::Null)
        }
        Method::Rollback | Method::Rollback2 => {
            let req: SessionRequest = decode(body)?;
            service.rollback(ctx, req.session).await?;
            Ok(serde_json::Value::Null)
        }
        Method::SplitQuery => encode(service.split_query(ctx, decode(body)?).await?),
        Method::GetSrvKeyspace => {
            let req: SrvKeyspaceRequest = decode(body)?;
            encode(service.get_srv_keyspace(ctx, req.keyspace).await?)
        }
        m => Err(GateError::transport(format!("{} is a streaming method", m))),
    }
}

pub async fn dispatch_stream(
    service: &dyn GateService,
    ctx: &RequestContext,
    method: Method,
    body: serde_json::Value,
    sink: StreamSink,
) -> GateResult<()> {
    match method.stream_kind() {
        Some(StreamKind::Execute) => service.stream_execute(ctx, decode(body)?, sink).await,
        Some(StreamKind::Shard) => service.stream_execute_shard(ctx, decode(body)?, sink).await,
        Some(StreamKind::KeyRanges) => service.stream_execute_key_ranges(ctx, decode(body)?, sink).await,
        Some(StreamKind::KeyspaceIds) => service.stream_execute_keyspace_ids(ctx, decode(body)?, sink).await,
        None => Err(GateError::transport(format!("{} is not a streaming method", method))),
    }
}
