//! Worker endpoint: receives requests, executes the handler, replies.
//!
//! One task per endpoint drives a strictly sequential receive → handle →
//! reply cycle; a handler may dispatch work elsewhere before replying.

use std::sync::Arc;

use crate::framing::{self, MAX_PART, MalformedStreamError};
use crate::protocol::{CorrelationId, Request, Response};
use crate::transport::{PartTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Malformed(#[from] MalformedStreamError),

    #[error("failed to decode envelope: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The worker side of the pipe.
pub struct WorkerEndpoint<T> {
    transport: T,
    recv_lock: tokio::sync::Mutex<()>,
    write_lock: tokio::sync::Mutex<()>,
    max_part: usize,
}

impl<T: PartTransport> WorkerEndpoint<T> {
    pub fn new(transport: T) -> Self {
        Self::with_max_part(transport, MAX_PART)
    }

    pub fn with_max_part(transport: T, max_part: usize) -> Self {
        Self {
            transport,
            recv_lock: tokio::sync::Mutex::new(()),
            write_lock: tokio::sync::Mutex::new(()),
            max_part,
        }
    }

    /// Block until a full wire message arrives and decode it.
    ///
    /// End of stream before any part surfaces as
    /// [`TransportError::Closed`]; end of stream inside a continued chain is
    /// a malformed stream.
    pub async fn receive(&self) -> Result<Request, WorkerError> {
        let _recv = self.recv_lock.lock().await;

        let mut parts = Vec::new();
        loop {
            let part = match self.transport.get(None).await? {
                Some(part) => part,
                None if parts.is_empty() => return Err(TransportError::Closed.into()),
                None => return Err(MalformedStreamError::Truncated.into()),
            };
            let continued = framing::is_continued(&part);
            parts.push(part);
            if !continued {
                break;
            }
        }

        let raw = framing::join(&parts)?;
        let request = Request::decode(&raw)?;
        tracing::debug!(id = %request.id, parts = parts.len(), "request received");
        Ok(request)
    }

    /// Send a response correlated to `request`, or an unsolicited push when
    /// `request` is `None`.
    ///
    /// A closed transport surfaces as an error; the write is never retried.
    pub async fn reply(
        &self,
        request: Option<&Request>,
        body: serde_json::Value,
    ) -> Result<(), WorkerError> {
        let id = request.map_or(CorrelationId::NONE, |r| r.id.clone());
        let response = Response::new(id, body);
        let raw = response.encode()?;
        tracing::debug!(id = %response.id, bytes = raw.len(), "sending response");
        // The parts of one message must stay contiguous on the wire.
        let _write = self.write_lock.lock().await;
        for part in framing::split(&raw, self.max_part) {
            self.transport.put(part).await?;
        }
        Ok(())
    }

    /// Close the transport. Idempotent.
    pub fn close(&self) {
        tracing::info!("closing worker endpoint");
        self.transport.close();
    }
}

/// Application logic invoked for each request body.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, body: serde_json::Value) -> serde_json::Value;
}

/// Drive the worker endpoint until the pipe closes.
///
/// Requests are handled strictly in order. A closed pipe ends the loop
/// cleanly; any other failure propagates.
pub async fn run_worker<T, H>(endpoint: &WorkerEndpoint<T>, handler: Arc<H>) -> Result<(), WorkerError>
where
    T: PartTransport,
    H: Handler,
{
    tracing::info!("worker loop starting");
    loop {
        let request = match endpoint.receive().await {
            Ok(request) => request,
            Err(WorkerError::Transport(TransportError::Closed)) => {
                tracing::info!("pipe closed, worker loop exiting");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(error = %e, "worker loop failed");
                return Err(e);
            }
        };
        let body = handler.handle(request.body.clone()).await;
        endpoint.reply(Some(&request), body).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    #[tokio::test]
    async fn reply_after_close_fails() {
        let (left, _right) = ChannelTransport::pair();
        let worker = WorkerEndpoint::new(left);
        worker.close();
        assert!(matches!(
            worker.reply(None, json!("late")).await,
            Err(WorkerError::Transport(TransportError::Closed))
        ));
    }

    #[tokio::test]
    async fn receive_on_closed_pipe_reports_closed() {
        let (left, right) = ChannelTransport::pair();
        let worker = WorkerEndpoint::new(left);
        right.close();
        assert!(matches!(
            worker.receive().await,
            Err(WorkerError::Transport(TransportError::Closed))
        ));
    }

    #[tokio::test]
    async fn push_reply_carries_the_sentinel_id() {
        let (left, right) = ChannelTransport::pair();
        let worker = WorkerEndpoint::new(left);
        worker.reply(None, json!("event")).await.unwrap();

        let part = right.get(None).await.unwrap().unwrap();
        let response = Response::decode(&part).unwrap();
        assert!(response.id.is_none());
        assert_eq!(response.body, json!("event"));
    }
}
