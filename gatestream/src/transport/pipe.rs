//! Byte-stream transport framing parts with a length prefix.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use super::{PartTransport, TransportError};
use crate::framing::{CONTINUATION_MARKER, MAX_PART};

/// Transport over any byte stream pair (child stdio, sockets, duplex pipes).
///
/// Each part travels as one length-delimited frame with a 4-byte prefix, so
/// `put`/`get` round-trip part boundaries exactly.
pub struct PipeTransport<R, W> {
    reader: tokio::sync::Mutex<FramedRead<R, LengthDelimitedCodec>>,
    writer: tokio::sync::Mutex<FramedWrite<W, LengthDelimitedCodec>>,
    closed: CancellationToken,
}

fn part_codec(max_part: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_part.saturating_add(CONTINUATION_MARKER.len()))
        .new_codec()
}

impl<R, W> PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_max_part(reader, writer, MAX_PART)
    }

    /// Size the frame limit for endpoints splitting at a non-default maximum.
    pub fn with_max_part(reader: R, writer: W, max_part: usize) -> Self {
        Self {
            reader: tokio::sync::Mutex::new(FramedRead::new(reader, part_codec(max_part))),
            writer: tokio::sync::Mutex::new(FramedWrite::new(writer, part_codec(max_part))),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait::async_trait]
impl<R, W> PartTransport for PipeTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn put(&self, part: Bytes) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.send(part).await?;
        Ok(())
    }

    async fn get(&self, timeout: Option<Duration>) -> Result<Option<Bytes>, TransportError> {
        let mut reader = self.reader.lock().await;
        // FramedRead keeps partially buffered frames across polls, so a
        // timeout here never loses bytes already read off the stream.
        let next = async {
            tokio::select! {
                biased;
                frame = reader.next() => frame,
                _ = self.closed.cancelled() => None,
            }
        };
        let frame = match timeout {
            Some(limit) => match tokio::time::timeout(limit, next).await {
                Ok(frame) => frame,
                Err(_) => return Ok(None),
            },
            None => next.await,
        };
        match frame {
            Some(Ok(part)) => Ok(Some(part.freeze())),
            Some(Err(e)) => Err(TransportError::Io(e)),
            None => Ok(None),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplex_pair() -> (
        PipeTransport<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
        PipeTransport<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>,
    ) {
        let (left, right) = tokio::io::duplex(64 * 1024);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);
        (
            PipeTransport::new(left_read, left_write),
            PipeTransport::new(right_read, right_write),
        )
    }

    #[tokio::test]
    async fn parts_round_trip_the_stream() {
        let (left, right) = duplex_pair();
        left.put(Bytes::from_static(b"alpha")).await.unwrap();
        left.put(Bytes::from_static(b"beta")).await.unwrap();

        assert_eq!(right.get(None).await.unwrap().unwrap(), "alpha");
        assert_eq!(right.get(None).await.unwrap().unwrap(), "beta");
    }

    #[tokio::test]
    async fn empty_part_survives_framing() {
        let (left, right) = duplex_pair();
        left.put(Bytes::new()).await.unwrap();
        let got = right.get(None).await.unwrap().unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn get_times_out_on_silent_stream() {
        let (left, _right) = duplex_pair();
        let got = left.get(Some(Duration::from_millis(20))).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn put_after_close_fails_before_io() {
        let (left, _right) = duplex_pair();
        left.close();
        assert!(matches!(
            left.put(Bytes::from_static(b"x")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn peer_eof_reads_as_none() {
        let (left, right) = duplex_pair();
        drop(left);
        assert!(right.get(None).await.unwrap().is_none());
    }
}
