//! Mock transport for deterministic testing of the session engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs, plus unsolicited bytes that can be pushed at any
//! time to play the part of an amplifier reporting a front-panel change.
//!
//! The mock is a cheap handle: clones share state, so a test can hand one
//! clone to a session and keep another to inspect what was sent.
//!
//! # Example
//!
//! ```
//! use hegel_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! // When the engine sends "-p.?\r", answer "-p.1\r".
//! mock.expect(b"-p.?\r", b"-p.1\r");
//! // Something the amplifier says without being asked.
//! mock.push(b"-v.30\r");
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use hegel_core::error::{Error, Result};
use hegel_core::transport::Transport;

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Bytes made readable once the request is sent. May be empty.
    response: Vec<u8>,
}

#[derive(Debug)]
struct State {
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    readable: VecDeque<u8>,
    /// Largest number of bytes a single `receive()` returns.
    chunk_size: usize,
    connected: bool,
    /// The far end hung up; reads fail once `readable` is drained.
    peer_closed: bool,
    sent_log: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
    read_deadline: bool,
}

/// A mock [`Transport`] for testing without an amplifier.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation, and the
/// expectation's response becomes readable. `receive()` waits until bytes
/// are readable, the transport is closed, or the peer hangs up.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    /// Create a new connected mock that supports read deadlines.
    pub fn new() -> Self {
        Self::with_read_deadline(true)
    }

    /// Create a mock that reports the given read-deadline capability.
    ///
    /// Pass `false` to drive a session onto the handoff strategy.
    pub fn with_read_deadline(read_deadline: bool) -> Self {
        MockTransport {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    expectations: VecDeque::new(),
                    readable: VecDeque::new(),
                    chunk_size: usize::MAX,
                    connected: true,
                    peer_closed: false,
                    sent_log: Vec::new(),
                }),
                notify: Notify::new(),
                read_deadline,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an expected request/response pair.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.state().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Expect a request that the amplifier never answers.
    pub fn expect_no_reply(&self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Make bytes readable as if the amplifier sent them unprompted.
    pub fn push(&self, data: &[u8]) {
        self.state().readable.extend(data.iter().copied());
        self.inner.notify.notify_waiters();
    }

    /// Limit how many bytes one `receive()` returns, to split frames.
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.state().chunk_size = chunk_size.max(1);
    }

    /// Simulate the amplifier closing the connection.
    pub fn hang_up(&self) {
        self.state().peer_closed = true;
        self.inner.notify.notify_waiters();
    }

    /// Everything sent so far, one element per `send()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state().sent_log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.state().expectations.len()
    }

    /// Number of bytes readable but not yet received.
    pub fn unread(&self) -> usize {
        self.state().readable.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        {
            let mut state = self.state();
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if state.peer_closed {
                return Err(Error::ConnectionLost);
            }

            state.sent_log.push(data.to_vec());

            let expectation = state.expectations.pop_front().ok_or_else(|| {
                Error::Transport(format!(
                    "no more expectations in mock transport, got {:?}",
                    String::from_utf8_lossy(data)
                ))
            })?;
            if data != expectation.request.as_slice() {
                return Err(Error::Transport(format!(
                    "unexpected send data: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            state.readable.extend(expectation.response);
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if !state.connected {
                    return Err(Error::NotConnected);
                }
                if !state.readable.is_empty() {
                    let n = state.readable.len().min(buf.len()).min(state.chunk_size);
                    for (slot, byte) in buf.iter_mut().zip(state.readable.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
                if state.peer_closed {
                    return Err(Error::ConnectionLost);
                }
            }

            notified.await;
        }
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.state();
            state.connected = false;
            state.readable.clear();
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        let state = self.state();
        state.connected && !state.peer_closed
    }

    fn supports_read_deadline(&self) -> bool {
        self.inner.read_deadline
    }
}
