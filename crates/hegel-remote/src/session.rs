//! Session -- a live remote-control connection to one amplifier.
//!
//! A [`Session`] ties the protocol engine together: the command executor and
//! its read-interruption strategy, the background notification listener, and
//! the keep-alive task that stops the amplifier from reverting to local
//! control. Sessions are created by [`SessionBuilder`](crate::SessionBuilder)
//! or [`Session::connect`], and live until [`Session::disconnect`] or drop.
//!
//! State changes observed on the wire reach the caller through the
//! [`EventHandler`] given to the builder and through [`Session::subscribe`].
//! Treat those as the source of truth: a command's return value is also
//! reported there when the amplifier pushes the change.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use hegel_core::device::DeviceType;
use hegel_core::error::{Error, Result};
use hegel_core::events::{AmpEvent, EventHandler};
use hegel_core::transport::Transport;
use hegel_core::types::{Input, Minutes, ResetDelay, Volume};

use crate::builder::SessionBuilder;
use crate::commands;
use crate::executor::Executor;
use crate::keepalive::spawn_keep_alive;
use crate::listener::spawn_listener;
use crate::protocol::Command;
use crate::rendezvous::{Strategy, rendezvous_for};

/// Settings resolved by the builder.
pub(crate) struct SessionConfig {
    pub(crate) device: DeviceType,
    pub(crate) command_timeout: Option<Duration>,
    /// Delay and interval, or `None` to disable the keep-alive.
    pub(crate) keep_alive: Option<(Minutes, Duration)>,
    pub(crate) handler: Option<Arc<dyn EventHandler>>,
    pub(crate) events: broadcast::Sender<AmpEvent>,
}

/// Forwards every notification to the caller's handler and the session's
/// broadcast channel.
struct Fanout {
    handler: Option<Arc<dyn EventHandler>>,
    events: broadcast::Sender<AmpEvent>,
}

impl EventHandler for Fanout {
    fn on_power(&self, on: bool) {
        if let Some(h) = &self.handler {
            h.on_power(on);
        }
        self.events.on_power(on);
    }

    fn on_volume(&self, volume: Volume) {
        if let Some(h) = &self.handler {
            h.on_volume(volume);
        }
        self.events.on_volume(volume);
    }

    fn on_mute(&self, muted: bool) {
        if let Some(h) = &self.handler {
            h.on_mute(muted);
        }
        self.events.on_mute(muted);
    }

    fn on_input(&self, input: Input) {
        if let Some(h) = &self.handler {
            h.on_input(input);
        }
        self.events.on_input(input);
    }

    fn on_remote_reset(&self) {
        if let Some(h) = &self.handler {
            h.on_remote_reset();
        }
        self.events.on_remote_reset();
    }

    fn on_error(&self, error: &Error) {
        if let Some(h) = &self.handler {
            h.on_error(error);
        }
        self.events.on_error(error);
    }
}

struct Task {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

struct Tasks {
    listener: Task,
    keep_alive: Option<Task>,
}

/// A connected amplifier.
///
/// All command methods take `&self` and may be called concurrently; they are
/// serialized internally in arrival order.
pub struct Session {
    device: DeviceType,
    executor: Arc<Executor>,
    events: broadcast::Sender<AmpEvent>,
    /// Cancelled when disconnect starts. Commands fail from then on.
    closing: CancellationToken,
    tasks: Mutex<Option<Tasks>>,
    span: Span,
}

impl Session {
    /// Connect to the amplifier at `host` with default settings.
    ///
    /// `host` is an address or hostname, optionally with a port; port 50001
    /// is used when none is given.
    pub async fn connect(host: &str, device: DeviceType) -> Result<Session> {
        SessionBuilder::new(device).connect(host).await
    }

    /// Start configuring a session.
    pub fn builder(device: DeviceType) -> SessionBuilder {
        SessionBuilder::new(device)
    }

    /// Bring a session up on an open transport.
    ///
    /// Starts the listener, performs the connect-time reset-delay refresh and
    /// starts the keep-alive. If the refresh fails the transport is closed
    /// again and the error returned.
    pub(crate) async fn start(
        transport: Box<dyn Transport>,
        config: SessionConfig,
        peer: &str,
    ) -> Result<Session> {
        let span = info_span!("session", peer = %peer, device = %config.device);
        let events = config.events;
        let handler: Arc<dyn EventHandler> = Arc::new(Fanout {
            handler: config.handler,
            events: events.clone(),
        });

        let rendezvous = rendezvous_for(transport);
        let strategy = rendezvous.strategy();
        let closing = CancellationToken::new();
        let executor = Arc::new(Executor::new(
            Arc::clone(&rendezvous),
            Arc::clone(&handler),
            config.command_timeout,
            closing.clone(),
        ));

        let listener_cancel = CancellationToken::new();
        let listener = Task {
            handle: spawn_listener(
                Arc::clone(&rendezvous),
                handler,
                closing.clone(),
                listener_cancel.clone(),
                span.clone(),
            ),
            cancel: listener_cancel,
        };

        let session = Session {
            device: config.device,
            executor,
            events,
            closing,
            tasks: Mutex::new(Some(Tasks {
                listener,
                keep_alive: None,
            })),
            span,
        };

        if let Some((delay, interval)) = config.keep_alive {
            let request = commands::cmd_set_reset_delay(delay);
            let first = session
                .executor
                .request_reset(&request)
                .instrument(session.span.clone())
                .await;
            if let Err(e) = first {
                warn!(parent: &session.span, error = %e, "initial reset delay refresh failed");
                let _ = session.disconnect().await;
                return Err(e);
            }

            let cancel = CancellationToken::new();
            let handle = spawn_keep_alive(
                Arc::clone(&session.executor),
                delay,
                interval,
                cancel.clone(),
                session.span.clone(),
            );
            if let Some(tasks) = session.tasks.lock().await.as_mut() {
                tasks.keep_alive = Some(Task { handle, cancel });
            }
        }

        info!(parent: &session.span, ?strategy, "session connected");
        let _ = session.events.send(AmpEvent::Connected);
        Ok(session)
    }

    /// The model this session was opened for.
    pub fn device_type(&self) -> DeviceType {
        self.device
    }

    /// Whether the session is open and its transport still connected.
    pub fn is_connected(&self) -> bool {
        !self.closing.is_cancelled() && self.executor.rendezvous.is_connected()
    }

    /// Which read-interruption strategy the transport allowed.
    pub fn strategy(&self) -> Strategy {
        self.executor.rendezvous.strategy()
    }

    /// Subscribe to session events.
    ///
    /// Receivers see every notification also given to the handler, and
    /// [`AmpEvent::Disconnected`]. To also see [`AmpEvent::Connected`], hand
    /// a sender to [`SessionBuilder::events`] and subscribe before connecting.
    pub fn subscribe(&self) -> broadcast::Receiver<AmpEvent> {
        self.events.subscribe()
    }

    /// Close the session.
    ///
    /// Stops the keep-alive, waits for any in-flight command, closes the
    /// transport and stops the listener. Calling it again is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(tasks) = self.tasks.lock().await.take() else {
            return Ok(());
        };

        info!(parent: &self.span, "disconnecting");
        self.closing.cancel();

        if let Some(keep_alive) = tasks.keep_alive {
            keep_alive.cancel.cancel();
            let _ = keep_alive.handle.await;
        }

        let result = self.executor.rendezvous.close().await;

        tasks.listener.cancel.cancel();
        let _ = tasks.listener.handle.await;

        debug!(parent: &self.span, "session closed");
        let _ = self.events.send(AmpEvent::Disconnected);
        result
    }

    // ---------------------------------------------------------------
    // Power
    // ---------------------------------------------------------------

    /// Read whether the amplifier is on.
    pub async fn get_power(&self) -> Result<bool> {
        self.bool_command(&commands::cmd_get_power(), Command::Power)
            .await
    }

    /// Switch the amplifier on or off. Returns the new state.
    pub async fn set_power(&self, on: bool) -> Result<bool> {
        self.bool_command(&commands::cmd_set_power(on), Command::Power)
            .await
    }

    /// Toggle power. Returns the new state.
    pub async fn toggle_power(&self) -> Result<bool> {
        self.bool_command(&commands::cmd_toggle_power(), Command::Power)
            .await
    }

    // ---------------------------------------------------------------
    // Volume
    // ---------------------------------------------------------------

    /// Read the volume in percent.
    pub async fn get_volume(&self) -> Result<Volume> {
        self.number_command(&commands::cmd_get_volume(), Command::Volume)
            .await
    }

    /// Set the volume, 0 to 100. Fails with
    /// [`Error::InvalidVolume`] above 100 without sending anything.
    pub async fn set_volume(&self, volume: Volume) -> Result<Volume> {
        let request = commands::cmd_set_volume(volume)?;
        self.number_command(&request, Command::Volume).await
    }

    /// Raise the volume one step. Returns the new volume.
    pub async fn volume_up(&self) -> Result<Volume> {
        self.number_command(&commands::cmd_volume_up(), Command::Volume)
            .await
    }

    /// Lower the volume one step. Returns the new volume.
    pub async fn volume_down(&self) -> Result<Volume> {
        self.number_command(&commands::cmd_volume_down(), Command::Volume)
            .await
    }

    // ---------------------------------------------------------------
    // Mute
    // ---------------------------------------------------------------

    pub async fn get_mute(&self) -> Result<bool> {
        self.bool_command(&commands::cmd_get_mute(), Command::Mute)
            .await
    }

    pub async fn set_mute(&self, muted: bool) -> Result<bool> {
        self.bool_command(&commands::cmd_set_mute(muted), Command::Mute)
            .await
    }

    pub async fn toggle_mute(&self) -> Result<bool> {
        self.bool_command(&commands::cmd_toggle_mute(), Command::Mute)
            .await
    }

    // ---------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------

    /// Read the selected input number.
    pub async fn get_input(&self) -> Result<Input> {
        self.number_command(&commands::cmd_get_input(), Command::Input)
            .await
    }

    /// Select an input by number, counting from 1.
    ///
    /// Input 0 fails with [`Error::InputIsZero`] without sending anything. A
    /// number past the model's last input is rejected by the amplifier.
    pub async fn set_input(&self, input: Input) -> Result<Input> {
        let request = commands::cmd_set_input(input)?;
        self.number_command(&request, Command::Input).await
    }

    /// Select an input by its front-panel name for this session's model.
    pub async fn set_input_by_name(&self, name: &str) -> Result<Input> {
        let input = self.device.input_number(name)?;
        self.set_input(input).await
    }

    /// Read the selected input and translate it to its front-panel name.
    pub async fn get_input_name(&self) -> Result<&'static str> {
        let input = self.get_input().await?;
        self.device.input_name(input)
    }

    // ---------------------------------------------------------------
    // Reset delay
    // ---------------------------------------------------------------

    pub async fn get_reset_delay(&self) -> Result<ResetDelay> {
        self.reset_command(&commands::cmd_get_reset_delay()).await
    }

    /// Set the number of minutes before the amplifier reverts to local
    /// control.
    pub async fn set_reset_delay(&self, minutes: Minutes) -> Result<ResetDelay> {
        self.reset_command(&commands::cmd_set_reset_delay(minutes))
            .await
    }

    /// Stop the reset timer.
    pub async fn stop_reset_delay(&self) -> Result<ResetDelay> {
        self.reset_command(&commands::cmd_stop_reset_delay()).await
    }

    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    async fn bool_command(&self, request: &[u8], command: Command) -> Result<bool> {
        self.executor
            .request_bool(request, command)
            .instrument(self.span.clone())
            .await
    }

    async fn number_command(&self, request: &[u8], command: Command) -> Result<u8> {
        self.executor
            .request_number(request, command)
            .instrument(self.span.clone())
            .await
    }

    async fn reset_command(&self, request: &[u8]) -> Result<ResetDelay> {
        self.executor
            .request_reset(request)
            .instrument(self.span.clone())
            .await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Without an await the best we can do is stop the tasks; the
        // transport closes when the last of them lets go of it.
        self.closing.cancel();
        if let Some(tasks) = self.tasks.get_mut().take() {
            if let Some(keep_alive) = tasks.keep_alive {
                keep_alive.cancel.cancel();
            }
            tasks.listener.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("strategy", &self.strategy())
            .field("connected", &self.is_connected())
            .finish()
    }
}
