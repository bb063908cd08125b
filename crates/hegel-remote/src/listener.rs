//! Background listener for unsolicited amplifier notifications.
//!
//! The amplifier pushes a frame whenever its state changes from the front
//! panel, the IR remote, or another controller. The listener task reads those
//! frames for the lifetime of the session and reports them to the session's
//! [`EventHandler`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error};

use hegel_core::error::{Error, Result};
use hegel_core::events::EventHandler;

use crate::protocol::{self, Command};
use crate::rendezvous::Rendezvous;

/// Decode one unsolicited frame and call the matching handler method.
///
/// Error frames and unknown command characters are returned as errors, as
/// are values that do not parse.
pub fn dispatch(frame: &[u8], handler: &dyn EventHandler) -> Result<()> {
    let decoded = protocol::decode(frame)?;
    match decoded.known_command() {
        Some(Command::Power) => {
            let on = protocol::parse_bool(decoded.value)?;
            debug!(on, "power changed");
            handler.on_power(on);
        }
        Some(Command::Volume) => {
            let volume = protocol::parse_u8(decoded.value)?;
            debug!(volume, "volume changed");
            handler.on_volume(volume);
        }
        Some(Command::Mute) => {
            let muted = protocol::parse_bool(decoded.value)?;
            debug!(muted, "mute changed");
            handler.on_mute(muted);
        }
        Some(Command::Input) => {
            let input = protocol::parse_u8(decoded.value)?;
            debug!(input, "input changed");
            handler.on_input(input);
        }
        Some(Command::Reset) => {
            // Only a delay of zero means the timer fired.
            if decoded.value == b"0" {
                debug!("amplifier reset the remote connection");
                handler.on_remote_reset();
            } else {
                debug!(value = ?decoded.value, "ignoring reset delay notification");
            }
        }
        None => return Err(Error::UnknownCommand(decoded.command)),
    }
    Ok(())
}

/// Spawn the listener task.
///
/// `closing` marks read errors as expected; `shutdown` stops the task once
/// the session has closed the transport.
pub(crate) fn spawn_listener(
    rendezvous: Arc<dyn Rendezvous>,
    handler: Arc<dyn EventHandler>,
    closing: CancellationToken,
    shutdown: CancellationToken,
    span: Span,
) -> JoinHandle<()> {
    tokio::spawn(listen_loop(rendezvous, handler, closing, shutdown).instrument(span))
}

async fn listen_loop(
    rendezvous: Arc<dyn Rendezvous>,
    handler: Arc<dyn EventHandler>,
    closing: CancellationToken,
    shutdown: CancellationToken,
) {
    debug!(strategy = ?rendezvous.strategy(), "listener started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rendezvous.listen() => next,
        };

        match next {
            Ok(None) => continue,
            Ok(Some(frame)) => {
                if let Err(e) = dispatch(&frame, &*handler) {
                    error!(error = %e, "listener stopped on bad notification");
                    handler.on_error(&e);
                    break;
                }
            }
            Err(_) if closing.is_cancelled() => break,
            Err(e) => {
                error!(error = %e, "listener stopped on read error");
                handler.on_error(&e);
                break;
            }
        }
    }

    rendezvous.listener_stopped();
    debug!("listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hegel_core::error::DeviceError;
    use hegel_core::events::AmpEvent;
    use tokio::sync::broadcast;

    fn events(frame: &[u8]) -> (Result<()>, Vec<AmpEvent>) {
        let (tx, mut rx) = broadcast::channel(8);
        let result = dispatch(frame, &tx);
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        (result, out)
    }

    #[test]
    fn dispatch_state_changes() {
        assert_eq!(events(b"-p.1\r").1, vec![AmpEvent::PowerChanged { on: true }]);
        assert_eq!(events(b"-v.35\r").1, vec![AmpEvent::VolumeChanged { volume: 35 }]);
        assert_eq!(events(b"-m.0\r").1, vec![AmpEvent::MuteChanged { muted: false }]);
        assert_eq!(events(b"-i.7\r").1, vec![AmpEvent::InputChanged { input: 7 }]);
    }

    #[test]
    fn dispatch_remote_reset_only_for_zero() {
        let (result, out) = events(b"-r.0\r");
        assert!(result.is_ok());
        assert_eq!(out, vec![AmpEvent::RemoteReset]);

        let (result, out) = events(b"-r.3\r");
        assert!(result.is_ok());
        assert!(out.is_empty());
    }

    #[test]
    fn dispatch_error_frame_fails() {
        let (result, out) = events(b"-e.3\r");
        assert!(matches!(
            result,
            Err(Error::Device(DeviceError::InvalidParameter))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn dispatch_unknown_command_fails() {
        let (result, _) = events(b"-x.1\r");
        match result {
            Err(Error::UnknownCommand(c)) => assert_eq!(c, b'x'),
            other => panic!("expected UnknownCommand, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_bad_value_fails() {
        let (result, _) = events(b"-v.abc\r");
        assert!(matches!(result, Err(Error::InvalidNumericValue(_))));
    }
}
