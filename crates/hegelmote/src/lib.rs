//! # hegelmote -- network remote control for Hegel amplifiers
//!
//! `hegelmote` talks to Hegel's network-enabled integrated amplifiers over
//! their IP control protocol: power, volume, mute, input selection and the
//! reset timer, plus live notifications when somebody turns a knob.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hegelmote::{DeviceType, Session};
//!
//! #[tokio::main]
//! async fn main() -> hegelmote::Result<()> {
//!     let session = Session::connect("192.168.1.40", DeviceType::H390).await?;
//!
//!     session.set_volume(30).await?;
//!     println!("input: {}", session.get_input_name().await?);
//!
//!     session.disconnect().await
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                | Purpose                                          |
//! |----------------------|--------------------------------------------------|
//! | `hegel-core`         | [`Error`], [`Transport`], events, device catalog |
//! | `hegel-transport`    | TCP transport                                    |
//! | `hegel-remote`       | Protocol codec and the session engine            |
//! | **`hegelmote`**      | This facade crate -- re-exports everything       |
//!
//! ## Events
//!
//! The amplifier reports every state change, whoever caused it. Subscribe to
//! follow them:
//!
//! ```no_run
//! use hegelmote::{AmpEvent, Session};
//! # async fn example(session: &Session) {
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let AmpEvent::VolumeChanged { volume } = event {
//!         println!("volume is now {volume}");
//!     }
//! }
//! # }
//! ```
//!
//! Or pass an [`EventHandler`] to [`SessionBuilder::handler`] to be called
//! directly from the listener task.

pub use hegel_core::*;

pub use hegel_remote::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_EVENT_CAPACITY, DEFAULT_KEEP_ALIVE_INTERVAL,
    DEFAULT_RESET_DELAY, Session, SessionBuilder, Strategy,
};

/// Frame codec and command builders for callers speaking the protocol
/// directly.
pub mod protocol {
    pub use hegel_remote::commands;
    pub use hegel_remote::listener::dispatch;
    pub use hegel_remote::protocol::*;
}

/// Transports to reach an amplifier.
pub mod transport {
    pub use hegel_transport::*;
}
