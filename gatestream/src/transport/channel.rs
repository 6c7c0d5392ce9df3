//! In-memory transport over cross-wired channels.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{PartTransport, TransportError};

/// One endpoint of an in-memory duplex pipe.
///
/// Parts put on one endpoint arrive at the other's `get` unchanged. Closing
/// either endpoint closes the pipe as a whole, as with a real process pipe.
/// Intended for tests and in-process wiring.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: CancellationToken,
}

impl ChannelTransport {
    /// Build both endpoints of a connected pipe.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        (
            ChannelTransport {
                tx: left_tx,
                rx: tokio::sync::Mutex::new(left_rx),
                closed: closed.clone(),
            },
            ChannelTransport {
                tx: right_tx,
                rx: tokio::sync::Mutex::new(right_rx),
                closed,
            },
        )
    }
}

#[async_trait::async_trait]
impl PartTransport for ChannelTransport {
    async fn put(&self, part: Bytes) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.tx.send(part).map_err(|_| TransportError::Closed)
    }

    async fn get(&self, timeout: Option<Duration>) -> Result<Option<Bytes>, TransportError> {
        let mut rx = self.rx.lock().await;
        // Queued parts drain before close is honored.
        let recv = async {
            tokio::select! {
                biased;
                part = rx.recv() => part,
                _ = self.closed.cancelled() => None,
            }
        };
        let part = match timeout {
            Some(limit) => match tokio::time::timeout(limit, recv).await {
                Ok(part) => part,
                Err(_) => return Ok(None),
            },
            None => recv.await,
        };
        Ok(part)
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

    #[tokio::test]
    async fn parts_cross_the_pair_in_order() {
        let (left, right) = ChannelTransport::pair();
        left.put(Bytes::from_static(b"one")).await.unwrap();
        left.put(Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(right.get(None).await.unwrap().unwrap(), "one");
        assert_eq!(right.get(None).await.unwrap().unwrap(), "two");
    }

    #[tokio::test]
    async fn get_times_out_on_empty_pipe() {
        let (left, _right) = ChannelTransport::pair();
        let got = left.get(Some(Duration::from_millis(20))).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn put_after_close_fails() {
        let (left, right) = ChannelTransport::pair();
        left.close();
        assert!(left.is_closed());
        assert!(right.is_closed());
        assert!(matches!(
            left.put(Bytes::from_static(b"x")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_wakes_a_blocked_get() {
        let (left, right) = ChannelTransport::pair();
        let reader = tokio::spawn(async move { left.get(None).await });
        tokio::task::yield_now().await;
        right.close();
        let got = reader.await.unwrap().unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn queued_parts_drain_before_close_is_seen() {
        let (left, right) = ChannelTransport::pair();
        left.put(Bytes::from_static(b"last words")).await.unwrap();
        left.close();

        assert_eq!(right.get(None).await.unwrap().unwrap(), "last words");
        assert!(right.get(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (left, _right) = ChannelTransport::pair();
        left.close();
        left.close();
        assert!(left.is_closed());
    }
}
