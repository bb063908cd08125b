//! Transport implementations for hegelmote.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](hegel_core::Transport) trait from `hegel-core`:
//!
//! - [`TcpTransport`]: the amplifier's native TCP control port (50001)
//!
//! # Example
//!
//! ```no_run
//! use hegel_transport::TcpTransport;
//! use hegel_core::transport::Transport;
//!
//! # async fn example() -> hegel_core::Result<()> {
//! let transport = TcpTransport::connect("192.168.1.40").await?;
//! transport.send(b"-p.?\r").await?;
//!
//! let mut buf = [0u8; 16];
//! let n = transport.receive(&mut buf).await?;
//! # Ok(())
//! # }
//! ```

pub mod tcp;

pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, TcpTransport, resolve_addr};
