//! SessionBuilder -- fluent builder for opening [`Session`]s.
//!
//! Separates configuration from connection so that callers can choose
//! timeouts, keep-alive behaviour and event delivery before dialing.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hegel_core::DeviceType;
//! use hegel_remote::SessionBuilder;
//!
//! # async fn example() -> hegel_core::Result<()> {
//! let session = SessionBuilder::new(DeviceType::H390)
//!     .dial_timeout(Duration::from_millis(500))
//!     .command_timeout(Duration::from_secs(2))
//!     .connect("192.168.1.40")
//!     .await?;
//! let volume = session.get_volume().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use hegel_core::device::DeviceType;
use hegel_core::error::Result;
use hegel_core::events::{AmpEvent, EventHandler};
use hegel_core::transport::Transport;
use hegel_core::types::Minutes;
use hegel_transport::{DEFAULT_CONNECT_TIMEOUT, TcpTransport, resolve_addr};

use crate::keepalive::{DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_RESET_DELAY};
use crate::session::{Session, SessionConfig};

/// Default time a command waits for its response.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the session's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Fluent builder for [`Session`].
///
/// All settings have defaults, so the simplest usage is:
///
/// ```ignore
/// let session = SessionBuilder::new(DeviceType::H95).connect("amp.local").await?;
/// ```
pub struct SessionBuilder {
    device: DeviceType,
    dial_timeout: Duration,
    command_timeout: Option<Duration>,
    keep_alive: bool,
    reset_delay: Minutes,
    keep_alive_interval: Duration,
    handler: Option<Arc<dyn EventHandler>>,
    events: Option<broadcast::Sender<AmpEvent>>,
    event_capacity: usize,
}

impl SessionBuilder {
    /// Create a new builder for the given amplifier model.
    pub fn new(device: DeviceType) -> Self {
        SessionBuilder {
            device,
            dial_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            keep_alive: true,
            reset_delay: DEFAULT_RESET_DELAY,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            handler: None,
            events: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Set the TCP dial timeout (default: 2s).
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set how long a command waits for its response (default: 5s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Let commands wait for their response indefinitely.
    pub fn no_command_timeout(mut self) -> Self {
        self.command_timeout = None;
        self
    }

    /// Enable or disable the keep-alive (default: enabled).
    ///
    /// When disabled, connect does not touch the reset delay at all.
    pub fn keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Set the reset delay the keep-alive writes (default: 3 minutes).
    pub fn reset_delay(mut self, minutes: Minutes) -> Self {
        self.reset_delay = minutes;
        self
    }

    /// Set how often the keep-alive runs (default: 2 minutes).
    ///
    /// Keep it below the reset delay or the amplifier will drop remote
    /// control between refreshes.
    pub fn keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set the handler that receives amplifier notifications and listener
    /// or keep-alive failures.
    pub fn handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Publish events on an existing broadcast channel.
    ///
    /// Subscribing before connecting is the only way to observe
    /// [`AmpEvent::Connected`].
    pub fn events(mut self, sender: broadcast::Sender<AmpEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Set the capacity of the event channel the session creates when no
    /// sender was given (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Dial `host` over TCP and open a session.
    ///
    /// `host` may carry a port; otherwise port 50001 is used.
    pub async fn connect(self, host: &str) -> Result<Session> {
        let transport = TcpTransport::connect_with_timeout(host, self.dial_timeout).await?;
        let peer = resolve_addr(host);
        self.open(Box::new(transport), &peer).await
    }

    /// Open a session over a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `hegel-test-harness`) and for transports other than plain TCP.
    pub async fn connect_with_transport(self, transport: Box<dyn Transport>) -> Result<Session> {
        self.open(transport, "custom").await
    }

    async fn open(self, transport: Box<dyn Transport>, peer: &str) -> Result<Session> {
        let events = self
            .events
            .unwrap_or_else(|| broadcast::channel(self.event_capacity).0);
        let config = SessionConfig {
            device: self.device,
            command_timeout: self.command_timeout,
            keep_alive: self
                .keep_alive
                .then_some((self.reset_delay, self.keep_alive_interval)),
            handler: self.handler,
            events,
        };
        Session::start(transport, config, peer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::Strategy;
    use hegel_test_harness::MockTransport;

    #[tokio::test]
    async fn builder_defaults() {
        let mock = MockTransport::new();
        mock.expect(b"-r.3\r", b"-r.3\r");

        let session = SessionBuilder::new(DeviceType::H190)
            .connect_with_transport(Box::new(mock.clone()))
            .await
            .unwrap();

        assert_eq!(session.device_type(), DeviceType::H190);
        assert_eq!(session.strategy(), Strategy::Deadline);
        assert!(session.is_connected());
        assert_eq!(mock.sent_data(), vec![b"-r.3\r".to_vec()]);

        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn builder_custom_reset_delay() {
        let mock = MockTransport::new();
        mock.expect(b"-r.10\r", b"-r.10\r");

        let session = SessionBuilder::new(DeviceType::H95)
            .reset_delay(10)
            .keep_alive_interval(Duration::from_secs(300))
            .connect_with_transport(Box::new(mock.clone()))
            .await
            .unwrap();

        assert_eq!(mock.remaining_expectations(), 0);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn builder_without_keep_alive_sends_nothing() {
        let mock = MockTransport::with_read_deadline(false);

        let session = SessionBuilder::new(DeviceType::H590)
            .keep_alive(false)
            .connect_with_transport(Box::new(mock.clone()))
            .await
            .unwrap();

        assert_eq!(session.strategy(), Strategy::Handoff);
        assert!(mock.sent_data().is_empty());
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn builder_events_sender_sees_connected() {
        let (tx, mut rx) = broadcast::channel(8);
        let mock = MockTransport::new();

        let session = SessionBuilder::new(DeviceType::H390)
            .keep_alive(false)
            .events(tx)
            .connect_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), AmpEvent::Connected);
        session.disconnect().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AmpEvent::Disconnected);
    }

    #[tokio::test]
    async fn builder_initial_refresh_failure_fails_connect() {
        let mock = MockTransport::new();
        mock.expect(b"-r.3\r", b"-e.3\r");

        let result = SessionBuilder::new(DeviceType::H120)
            .connect_with_transport(Box::new(mock.clone()))
            .await;

        assert!(matches!(
            result,
            Err(hegel_core::Error::Device(
                hegel_core::DeviceError::InvalidParameter
            ))
        ));
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn connect_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = SessionBuilder::new(DeviceType::H95).connect(&addr).await;
        assert!(matches!(result, Err(hegel_core::Error::Transport(_))));
    }
}
