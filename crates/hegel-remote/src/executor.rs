//! Command execution shared by the session and the keep-alive task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use hegel_core::error::{Error, Result};
use hegel_core::events::EventHandler;
use hegel_core::types::ResetDelay;

use crate::commands;
use crate::listener;
use crate::protocol::Command;
use crate::rendezvous::Rendezvous;

/// Issues one command at a time through the session's rendezvous.
pub(crate) struct Executor {
    pub(crate) rendezvous: Arc<dyn Rendezvous>,
    handler: Arc<dyn EventHandler>,
    command_timeout: Option<Duration>,
    /// Cancelled when disconnect starts.
    closing: CancellationToken,
}

impl Executor {
    pub(crate) fn new(
        rendezvous: Arc<dyn Rendezvous>,
        handler: Arc<dyn EventHandler>,
        command_timeout: Option<Duration>,
        closing: CancellationToken,
    ) -> Self {
        Self {
            rendezvous,
            handler,
            command_timeout,
            closing,
        }
    }

    /// Send `request` and return the raw response frame.
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        if self.closing.is_cancelled() {
            return Err(Error::NotConnected);
        }

        trace!(request = ?String::from_utf8_lossy(request), "sending command");
        let exchange = self.rendezvous.exchange(request);
        match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| Error::Timeout)?,
            None => exchange.await,
        }
    }

    /// Pass a parse result through, re-dispatching a frame that belonged to
    /// another command as the notification it most likely was.
    fn settle<T>(&self, result: Result<T>, frame: &[u8]) -> Result<T> {
        if let Err(Error::UnexpectedResponse { expected, .. }) = &result {
            warn!(
                expected = %char::from(*expected),
                frame = ?String::from_utf8_lossy(frame),
                "response does not match command, dispatching it as a notification"
            );
            if let Err(e) = listener::dispatch(frame, &*self.handler) {
                warn!(error = %e, "misattributed frame could not be dispatched");
            }
        }
        result
    }

    pub(crate) async fn request_bool(&self, request: &[u8], command: Command) -> Result<bool> {
        let frame = self.exchange(request).await?;
        self.settle(commands::parse_bool_response(command, &frame), &frame)
    }

    pub(crate) async fn request_number(&self, request: &[u8], command: Command) -> Result<u8> {
        let frame = self.exchange(request).await?;
        self.settle(commands::parse_number_response(command, &frame), &frame)
    }

    pub(crate) async fn request_reset(&self, request: &[u8]) -> Result<ResetDelay> {
        let frame = self.exchange(request).await?;
        self.settle(commands::parse_reset_response(&frame), &frame)
    }

    pub(crate) fn handler(&self) -> &dyn EventHandler {
        &*self.handler
    }
}
