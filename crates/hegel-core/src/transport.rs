//! Transport trait for amplifier communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to an amplifier.
//! Implementations exist for TCP sockets (`hegel-transport`) and for scripted
//! mock peers (`hegel-test-harness`).
//!
//! Unlike a plain request/response link, the session engine reads and writes
//! concurrently: a background listener may be parked in [`receive`] while a
//! foreground command calls [`send`]. All methods therefore take `&self`, and
//! implementations keep their read and write halves behind separate locks.
//!
//! [`receive`]: Transport::receive
//! [`send`]: Transport::send

use async_trait::async_trait;

use crate::error::Result;

/// Asynchronous byte-level transport to an amplifier.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all of `data` to the amplifier.
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Read available bytes into `buf`, waiting until at least one byte
    /// arrives.
    ///
    /// Returns the number of bytes read, which is never zero. A peer that
    /// closed the stream is reported as
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost).
    async fn receive(&self, buf: &mut [u8]) -> Result<usize>;

    /// Close the transport.
    ///
    /// After `close()`, `send()` and `receive()` return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected). Closing an
    /// already closed transport is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Whether an in-flight [`receive`](Transport::receive) may be abandoned
    /// at a read deadline without losing data.
    ///
    /// Stream sockets return `true`: dropping a pending read leaves unread
    /// bytes in the kernel buffer. Message-oriented tunnels that consume a
    /// whole message per read return `false`, which forces the session onto
    /// the handoff strategy where only the listener ever reads.
    fn supports_read_deadline(&self) -> bool {
        true
    }
}
