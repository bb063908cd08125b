//! Amplifier event types and the handler trait the session reports through.
//!
//! The amplifier pushes unsolicited frames when its state changes from the
//! front panel or the IR remote. The session's listener decodes those frames
//! and calls the [`EventHandler`] supplied at construction. The handler is the
//! single source of truth for observed state: callers should project it rather
//! than also patching their own copy from command results.

use tokio::sync::broadcast;

use crate::error::Error;
use crate::types::{Input, Volume};

/// An event emitted by a session when amplifier state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmpEvent {
    /// Power was switched on or off.
    PowerChanged {
        /// `true` if the amplifier is on.
        on: bool,
    },

    /// Volume changed.
    VolumeChanged {
        /// New volume in percent.
        volume: Volume,
    },

    /// Mute was switched on or off.
    MuteChanged {
        /// `true` if muted.
        muted: bool,
    },

    /// The selected input changed.
    InputChanged {
        /// New 1-based input number.
        input: Input,
    },

    /// The amplifier's reset timer fired and it dropped remote control.
    RemoteReset,

    /// The listener stopped because of an error, or a keep-alive failed.
    Error {
        /// Rendered error message.
        message: String,
    },

    /// A session was established.
    Connected,

    /// The session was closed.
    Disconnected,
}

/// Receiver of amplifier notifications and session failures.
///
/// All methods default to no-ops so implementors only override what they
/// need. Methods are called from the session's listener and keep-alive tasks
/// and must not block.
pub trait EventHandler: Send + Sync + 'static {
    /// Power was switched on or off.
    fn on_power(&self, _on: bool) {}

    /// Volume changed.
    fn on_volume(&self, _volume: Volume) {}

    /// Mute was switched on or off.
    fn on_mute(&self, _muted: bool) {}

    /// The selected input changed.
    fn on_input(&self, _input: Input) {}

    /// The amplifier reset its remote connection.
    fn on_remote_reset(&self) {}

    /// The listener stopped with an error, or a keep-alive tick failed.
    fn on_error(&self, _error: &Error) {}
}

/// Forward every notification into a broadcast channel as an [`AmpEvent`].
///
/// Send errors (no receivers) are ignored.
impl EventHandler for broadcast::Sender<AmpEvent> {
    fn on_power(&self, on: bool) {
        let _ = self.send(AmpEvent::PowerChanged { on });
    }

    fn on_volume(&self, volume: Volume) {
        let _ = self.send(AmpEvent::VolumeChanged { volume });
    }

    fn on_mute(&self, muted: bool) {
        let _ = self.send(AmpEvent::MuteChanged { muted });
    }

    fn on_input(&self, input: Input) {
        let _ = self.send(AmpEvent::InputChanged { input });
    }

    fn on_remote_reset(&self) {
        let _ = self.send(AmpEvent::RemoteReset);
    }

    fn on_error(&self, error: &Error) {
        let _ = self.send(AmpEvent::Error {
            message: error.to_string(),
        });
    }
}
