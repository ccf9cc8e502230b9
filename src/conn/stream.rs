use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::error::{GateError, GateResult};
use crate::proto::QueryResult;

/// Client handle of one streaming call: an ordered sequence of partial results plus a deferred
/// terminal status. The sequence can be consumed once; `finish` yields the status after it ends.
#[derive(Debug)]
pub struct QueryStream {
    rx: mpsc::UnboundedReceiver<QueryResult>,
    status: oneshot::Receiver<GateResult<()>>,
}

impl QueryStream {
    pub fn new(rx: mpsc::UnboundedReceiver<QueryResult>, status: oneshot::Receiver<GateResult<()>>) -> Self {
        Self { rx, status }
    }

    /// Next partial result, or `None` once the producer has finished.
    pub async fn next_result(&mut self) -> Option<QueryResult> {
        self.rx.recv().await
    }

    /// Terminal status of the call. Partial results not yet consumed are discarded.
    pub async fn finish(mut self) -> GateResult<()> {
        while self.rx.recv().await.is_some() {}
        match self.status.await {
            Ok(status) => status,
            Err(_) => Err(GateError::transport("stream ended without a terminal status")),
        }
    }

    /// Drains every partial result, returning the messages as received and the terminal status.
    pub async fn collect_all(mut self) -> (Vec<QueryResult>, GateResult<()>) {
        let mut parts = Vec::new();
        while let Some(part) = self.rx.recv().await {
            parts.push(part);
        }
        let status = self.finish().await;
        (parts, status)
    }

    /// Reassembles the stream into one result. Counters stay zero: streamed messages never carry them.
    pub async fn reassemble(self) -> GateResult<QueryResult> {
        let (parts, status) = self.collect_all().await;
        status?;
        let mut acc = QueryResult::default();
        for part in parts {
            acc.absorb(part);
        }
        Ok(acc)
    }
}

impl Stream for QueryStream {
    type Item = QueryResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Field;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn sequence_then_status() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = oneshot::channel();
        tx.send(QueryResult { fields: vec![Field::new("f", 1)], ..Default::default() }).unwrap();
        drop(tx);
        status_tx.send(Err(GateError::application("app error"))).unwrap();
        let mut stream = QueryStream::new(rx, status_rx);
        assert_eq!(stream.next().await.map(|r| r.fields.len()), Some(1));
        assert!(stream.next().await.is_none());
        assert_eq!(stream.finish().await, Err(GateError::application("app error")));
    }

    #[tokio::test]
    async fn missing_status_is_a_transport_error() {
        let (tx, rx) = mpsc::unbounded_channel::<QueryResult>();
        let (status_tx, status_rx) = oneshot::channel::<GateResult<()>>();
        drop(tx);
        drop(status_tx);
        let err = QueryStream::new(rx, status_rx).finish().await.unwrap_err();
        assert_eq!(err.code_str(), "transport");
    }
}
