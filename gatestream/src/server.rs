//! Server endpoint: sends requests, drains responses into the buffer.
//!
//! The receive path is split from the lookup path so one task can pump
//! [`ServerEndpoint::receive_one`] in a loop while any number of other tasks
//! call [`ServerEndpoint::send`], [`ServerEndpoint::has`], and
//! [`ServerEndpoint::ack`] concurrently. The drainer converts the single
//! ordered stream into a keyed, concurrently queryable store.

use std::time::Duration;

use crate::buffer::ResponseBuffer;
use crate::framing::{self, MAX_PART, MalformedStreamError};
use crate::protocol::{CorrelationId, Request, Response};
use crate::transport::{PartTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Malformed(#[from] MalformedStreamError),

    #[error("failed to decode envelope: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Acking an id that is not buffered: already acked, or never arrived.
#[derive(Debug, thiserror::Error)]
#[error("no buffered response for id {0}")]
pub struct UnknownResponseIdError(pub CorrelationId);

/// The controlling side of the pipe.
pub struct ServerEndpoint<T> {
    transport: T,
    buffer: ResponseBuffer,
    drain_lock: tokio::sync::Mutex<()>,
    write_lock: tokio::sync::Mutex<()>,
    max_part: usize,
}

impl<T: PartTransport> ServerEndpoint<T> {
    pub fn new(transport: T) -> Self {
        Self::with_max_part(transport, MAX_PART)
    }

    pub fn with_max_part(transport: T, max_part: usize) -> Self {
        Self {
            transport,
            buffer: ResponseBuffer::new(),
            drain_lock: tokio::sync::Mutex::new(()),
            write_lock: tokio::sync::Mutex::new(()),
            max_part,
        }
    }

    /// Send a request with a fresh id, returning it so the caller can later
    /// poll for the response under `request.id`.
    ///
    /// Fails with [`TransportError::Closed`] before attempting the write when
    /// the write side is already closed.
    pub async fn send(&self, body: serde_json::Value) -> Result<Request, ServerError> {
        let request = Request::new(body);
        let raw = request.encode()?;
        tracing::debug!(id = %request.id, bytes = raw.len(), "sending request");
        // The parts of one message must stay contiguous on the wire.
        let _write = self.write_lock.lock().await;
        for part in framing::split(&raw, self.max_part) {
            self.transport.put(part).await?;
        }
        Ok(request)
    }

    /// Read exactly one wire message into the buffer.
    ///
    /// Blocks up to `timeout` for the first part (`None` blocks
    /// indefinitely); a timeout or end of stream resolves to `Ok(None)` with
    /// no buffer mutation. Once a continued chain has begun it is always
    /// drained to completion, so a message is never torn down mid-frame.
    ///
    /// Concurrent callers serialize on an internal lock; by contract exactly
    /// one drainer task should drive this.
    pub async fn receive_one(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Option<Response>, ServerError> {
        let _drain = self.drain_lock.lock().await;

        let Some(first) = self.transport.get(timeout).await? else {
            return Ok(None);
        };

        let mut parts = Vec::new();
        let mut next = first;
        loop {
            let continued = framing::is_continued(&next);
            parts.push(next);
            if !continued {
                break;
            }
            // Continuation reads never time out: complete the chain or block.
            match self.transport.get(None).await? {
                Some(part) => next = part,
                None => return Err(MalformedStreamError::Truncated.into()),
            }
        }

        let raw = framing::join(&parts)?;
        let response = Response::decode(&raw)?;
        tracing::debug!(id = %response.id, parts = parts.len(), "buffering response");
        self.buffer.insert(response.clone());
        Ok(Some(response))
    }

    /// Lock-protected membership test for a buffered response.
    pub fn has(&self, id: &CorrelationId) -> bool {
        self.buffer.contains(id)
    }

    /// Remove and return the buffered response for `id`.
    pub fn ack(&self, id: &CorrelationId) -> Result<Response, UnknownResponseIdError> {
        self.buffer
            .take(id)
            .ok_or_else(|| UnknownResponseIdError(id.clone()))
    }

    /// Snapshot of currently buffered, un-acked response ids.
    pub fn buffered_ids(&self) -> Vec<CorrelationId> {
        self.buffer.snapshot_ids()
    }

    /// Close the transport. Idempotent.
    pub fn close(&self) {
        tracing::info!("closing server endpoint");
        self.transport.close();
    }
}
