//! Part-level transport contract and implementations.
//!
//! A transport moves opaque framed parts between the two endpoints of one
//! duplex pipe; it knows nothing about envelopes or continuation chains.
//! [`PipeTransport`] runs over any byte stream pair, [`ChannelTransport`]
//! over in-memory channels.

mod channel;
mod pipe;

pub use channel::ChannelTransport;
pub use pipe::PipeTransport;

use std::time::Duration;

use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The write side is known-closed; surfaced before any I/O is attempted.
    #[error("transport closed")]
    Closed,

    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Duplex channel moving one framed part per call.
///
/// Parts written with `put` arrive at the peer's `get` intact and in order;
/// the channel is assumed reliable and FIFO.
#[async_trait::async_trait]
pub trait PartTransport: Send + Sync {
    /// Write one part, blocking under backpressure.
    async fn put(&self, part: Bytes) -> Result<(), TransportError>;

    /// Read one part, blocking up to `timeout` (`None` blocks indefinitely).
    ///
    /// Resolves to `Ok(None)` on timeout or end of stream.
    async fn get(&self, timeout: Option<Duration>) -> Result<Option<Bytes>, TransportError>;

    /// Close the transport. Idempotent; wakes blocked reads.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
