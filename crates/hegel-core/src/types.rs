//! Value types shared by the protocol engine and its callers.

use std::fmt;

/// Volume level in percent, 0 to 100 inclusive.
pub type Volume = u8;

/// Input source number. Inputs are numbered from 1.
pub type Input = u8;

/// A reset delay in minutes, 0 to 255.
pub type Minutes = u8;

/// Highest volume the amplifier accepts.
pub const MAX_VOLUME: Volume = 100;

/// State of the amplifier's auto-reset timer.
///
/// When the timer runs out the amplifier drops the remote connection and
/// reverts to local control. A stopped timer never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResetDelay {
    /// Minutes left until the reset. Always 0 when `stopped` is set.
    pub minutes: Minutes,
    /// Whether the timer is stopped.
    pub stopped: bool,
}

impl ResetDelay {
    /// A running timer with the given number of minutes.
    pub fn minutes(minutes: Minutes) -> Self {
        ResetDelay {
            minutes,
            stopped: false,
        }
    }

    /// A stopped timer.
    pub fn stopped() -> Self {
        ResetDelay {
            minutes: 0,
            stopped: true,
        }
    }
}

impl fmt::Display for ResetDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stopped {
            write!(f, "stopped")
        } else {
            write!(f, "{} min", self.minutes)
        }
    }
}
