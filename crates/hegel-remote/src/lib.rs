//! Session engine for the Hegel amplifier remote control protocol.
//!
//! Hegel's network-enabled amplifiers (Röst, H95, H120, H190, H190V, H390,
//! H590) accept short text commands on TCP port 50001 and push a frame
//! whenever their state changes from the front panel or the IR remote. This
//! crate provides:
//!
//! - **Protocol codec** ([`protocol`]) -- encode `-<cmd>.<value>\r` frames,
//!   decode responses and error frames, and split a byte stream into frames.
//! - **Command builders** ([`commands`]) -- one builder per operation and the
//!   parsers for their responses.
//! - **Session** ([`session`]) -- a connected amplifier with a background
//!   listener for notifications and a keep-alive that stops the amplifier
//!   from reverting to local control.
//! - **Builder** ([`builder`]) -- fluent construction of [`Session`]s.
//!
//! # Commands and notifications on one socket
//!
//! The amplifier uses the same connection for command responses and for
//! unsolicited notifications. The session decides which frame answers which
//! command with one of two [`Strategy`] values, chosen from what the
//! transport supports. Callers never need to care which is in use.
//!
//! # Example
//!
//! ```
//! use hegel_remote::protocol::{self, Command, Value};
//! use hegel_remote::commands::{cmd_set_volume, parse_number_response};
//!
//! let cmd = cmd_set_volume(42).unwrap();
//! assert_eq!(cmd, b"-v.42\r");
//! assert_eq!(protocol::encode(Command::Volume, Value::Number(42)), cmd);
//!
//! let volume = parse_number_response(Command::Volume, b"-v.42\r").unwrap();
//! assert_eq!(volume, 42);
//! ```

pub mod builder;
pub mod commands;
mod executor;
pub mod keepalive;
pub mod listener;
pub mod protocol;
mod rendezvous;
pub mod session;

pub use builder::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_EVENT_CAPACITY, SessionBuilder};
pub use keepalive::{DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_RESET_DELAY};
pub use rendezvous::Strategy;
pub use session::Session;
