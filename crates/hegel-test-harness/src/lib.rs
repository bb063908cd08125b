//! hegel-test-harness: Test utilities and mock peers for hegelmote.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of the
//! session engine without an amplifier, and [`MockAmplifier`] for tests that
//! go through a real TCP socket.

pub mod mock_amplifier;
pub mod mock_transport;

pub use mock_amplifier::{AmpState, MockAmplifier};
pub use mock_transport::MockTransport;
