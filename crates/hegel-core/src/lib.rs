//! hegel-core: Core traits, types, and error definitions for hegelmote.
//!
//! This crate defines the pieces shared by the session engine, the transports,
//! and the test harness. Applications that only need the value types or the
//! device catalog can depend on it without pulling in tokio networking.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel to an amplifier
//! - [`EventHandler`] / [`AmpEvent`] -- unsolicited state change notifications
//! - [`DeviceType`] -- supported models and their input names
//! - [`Error`] / [`Result`] -- error handling

pub mod device;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

pub use device::DeviceType;
pub use error::{DeviceError, Error, Result};
pub use events::{AmpEvent, EventHandler};
pub use transport::Transport;
pub use types::*;
