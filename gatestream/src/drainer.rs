//! Background task pumping the server transport into the response buffer.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::ServerEndpoint;
use crate::transport::PartTransport;

/// Handle to the drain loop. One per server endpoint.
///
/// A plain worker loop with an explicit cancellation token: the loop calls
/// [`ServerEndpoint::receive_one`] until the transport ends, the stream
/// breaks, or [`Drainer::stop`] cancels it.
pub struct Drainer {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Drainer {
    pub fn spawn<T>(server: Arc<ServerEndpoint<T>>) -> Self
    where
        T: PartTransport + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tracing::debug!("drainer starting");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("drainer cancelled");
                        break;
                    }
                    received = server.receive_one(None) => match received {
                        Ok(Some(response)) => {
                            tracing::trace!(id = %response.id, "response drained");
                        }
                        Ok(None) => {
                            tracing::info!("transport ended, drainer exiting");
                            break;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "drain failed");
                            break;
                        }
                    },
                }
            }
        });
        Self { handle, cancel }
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// Cancellation abandons any partially received message; use it only
    /// when tearing the endpoint down.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
