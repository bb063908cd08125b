//! Pairing of command responses with the background listener.
//!
//! The listener task reads the transport for the whole life of a session,
//! yet a command must receive the frame that answers it rather than have the
//! listener dispatch it as a notification. Two strategies solve this:
//!
//! - [`Deadline`]: the command raises a read deadline that makes the listener
//!   abandon its read, takes the exclusion lock (which also owns the inbound
//!   buffer), writes and reads its response itself. Only usable when the
//!   transport can abandon a read without losing bytes.
//! - [`Handoff`]: the listener does every read. A command registers a pending
//!   exchange before writing, and the listener forwards the first frame read
//!   after that to it through a single-slot channel instead of dispatching
//!   it. Each frame is tagged with the exchange pending when its last bytes
//!   were received, so frames already buffered stay notifications.
//!
//! [`rendezvous_for`] picks one from
//! [`Transport::supports_read_deadline`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use hegel_core::error::{Error, Result};
use hegel_core::transport::Transport;

use crate::protocol::FrameBuffer;

/// Which strategy a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Deadline,
    Handoff,
}

/// The interface the executor and listener share, whatever the strategy.
#[async_trait]
pub(crate) trait Rendezvous: Send + Sync {
    /// Write `request` under exclusive access and return the next frame.
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>>;

    /// Read the next frame for the listener.
    ///
    /// `Ok(None)` is a benign interruption: the read was given up to a
    /// command, or its frame was handed to one.
    async fn listen(&self) -> Result<Option<Vec<u8>>>;

    /// Acquire exclusive access one final time and close the transport.
    async fn close(&self) -> Result<()>;

    /// Called once when the listener task exits.
    fn listener_stopped(&self) {}

    fn is_connected(&self) -> bool;

    fn strategy(&self) -> Strategy;
}

/// Choose the strategy the transport allows.
pub(crate) fn rendezvous_for(transport: Box<dyn Transport>) -> Arc<dyn Rendezvous> {
    if transport.supports_read_deadline() {
        Arc::new(Deadline::new(transport))
    } else {
        Arc::new(Handoff::new(transport))
    }
}

/// Read from `transport` until `inbound` yields a complete frame.
///
/// Cancel safe: bytes are only moved into `inbound` after a completed read.
async fn read_frame(transport: &dyn Transport, inbound: &mut FrameBuffer) -> Result<Vec<u8>> {
    let mut buf = [0u8; 64];
    loop {
        if let Some(frame) = inbound.next_frame() {
            trace!(frame = ?String::from_utf8_lossy(&frame), "frame received");
            return Ok(frame);
        }
        let n = transport.receive(&mut buf).await?;
        inbound.extend(&buf[..n]);
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// Interrupt-the-reader strategy.
pub(crate) struct Deadline {
    transport: Box<dyn Transport>,
    /// The exclusion lock. Whoever holds it is the only reader.
    inbound: Mutex<FrameBuffer>,
    /// Number of callers waiting for the lock. The listener's read is
    /// abandoned while this is above zero.
    waiting: watch::Sender<usize>,
    /// Complete frames found buffered ahead of a command's response.
    backlog: std::sync::Mutex<VecDeque<Vec<u8>>>,
}

/// Keeps the deadline raised until dropped.
struct RaisedDeadline<'a>(&'a watch::Sender<usize>);

impl<'a> RaisedDeadline<'a> {
    fn raise(waiting: &'a watch::Sender<usize>) -> Self {
        waiting.send_modify(|n| *n += 1);
        Self(waiting)
    }
}

impl Drop for RaisedDeadline<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

impl Deadline {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            inbound: Mutex::new(FrameBuffer::new()),
            waiting: watch::Sender::new(0),
            backlog: std::sync::Mutex::new(VecDeque::new()),
        }
    }

    async fn lock_inbound(&self) -> tokio::sync::MutexGuard<'_, FrameBuffer> {
        let raised = RaisedDeadline::raise(&self.waiting);
        let inbound = self.inbound.lock().await;
        drop(raised);
        inbound
    }
}

#[async_trait]
impl Rendezvous for Deadline {
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut inbound = self.lock_inbound().await;

        // Frames already buffered arrived before the request was written.
        let mut stray = Vec::new();
        while let Some(frame) = inbound.next_frame() {
            stray.push(frame);
        }
        if !stray.is_empty() {
            debug!(count = stray.len(), "deferring buffered frames to the listener");
            self.backlog
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(stray);
        }

        self.transport.send(request).await?;
        read_frame(&*self.transport, &mut inbound).await
    }

    async fn listen(&self) -> Result<Option<Vec<u8>>> {
        let deferred = self
            .backlog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(frame) = deferred {
            return Ok(Some(frame));
        }

        let mut waiting = self.waiting.subscribe();
        // Let queued commands through before competing for the lock.
        let _ = waiting.wait_for(|n| *n == 0).await;
        let mut inbound = self.inbound.lock().await;

        tokio::select! {
            biased;
            _ = waiting.wait_for(|n| *n > 0) => {
                trace!("listener read interrupted by a command");
                Ok(None)
            }
            frame = read_frame(&*self.transport, &mut inbound) => frame.map(Some),
        }
    }

    async fn close(&self) -> Result<()> {
        let _inbound = self.lock_inbound().await;
        self.transport.close().await
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn strategy(&self) -> Strategy {
        Strategy::Deadline
    }
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// A frame or read error tagged with the exchange it was read for.
type Delivery = (u64, Result<Vec<u8>>);

/// Listener-reads-everything strategy.
pub(crate) struct Handoff {
    transport: Box<dyn Transport>,
    /// Only the listener touches this.
    inbound: Mutex<Inbound>,
    /// The exclusion lock, owning the receiving end of the handoff slot.
    slot: Mutex<Slot>,
    tx: mpsc::Sender<Delivery>,
    /// Id of the exchange waiting for a frame, 0 if none.
    pending: AtomicU64,
    /// Cancelled when the listener can no longer deliver frames.
    stopped: CancellationToken,
}

struct Slot {
    rx: mpsc::Receiver<Delivery>,
    last_id: u64,
}

/// Listener-side stream state for [`Handoff`].
#[derive(Default)]
struct Inbound {
    buffer: FrameBuffer,
    /// Complete frames with the exchange id pending when they were received.
    ready: VecDeque<(Vec<u8>, u64)>,
}

impl Inbound {
    /// Next complete frame and its owner, receiving more bytes as needed.
    ///
    /// Cancel safe: bytes are only moved in after a completed read.
    async fn next(
        &mut self,
        transport: &dyn Transport,
        pending: &AtomicU64,
    ) -> Result<(Vec<u8>, u64)> {
        let mut buf = [0u8; 64];
        loop {
            if let Some((frame, owner)) = self.ready.pop_front() {
                trace!(frame = ?String::from_utf8_lossy(&frame), owner, "frame received");
                return Ok((frame, owner));
            }
            let n = transport.receive(&mut buf).await?;
            let owner = pending.load(Ordering::SeqCst);
            self.buffer.extend(&buf[..n]);
            while let Some(frame) = self.buffer.next_frame() {
                self.ready.push_back((frame, owner));
            }
        }
    }
}

/// Registers an exchange as pending until dropped.
struct PendingExchange<'a> {
    pending: &'a AtomicU64,
    id: u64,
}

impl<'a> PendingExchange<'a> {
    fn register(pending: &'a AtomicU64, id: u64) -> Self {
        pending.store(id, Ordering::SeqCst);
        Self { pending, id }
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        // The listener may already have claimed it.
        let _ = self
            .pending
            .compare_exchange(self.id, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl Handoff {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            transport,
            inbound: Mutex::new(Inbound::default()),
            slot: Mutex::new(Slot { rx, last_id: 0 }),
            tx,
            pending: AtomicU64::new(0),
            stopped: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Rendezvous for Handoff {
    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut slot = self.slot.lock().await;
        if self.stopped.is_cancelled() {
            return Err(Error::ConnectionLost);
        }

        slot.last_id += 1;
        let id = slot.last_id;
        // Registered before the write so a fast response cannot slip past.
        let _pending = PendingExchange::register(&self.pending, id);
        self.transport.send(request).await?;

        loop {
            let (from, result) = tokio::select! {
                biased;
                delivery = slot.rx.recv() => delivery.ok_or(Error::ConnectionLost)?,
                _ = self.stopped.cancelled() => return Err(Error::ConnectionLost),
            };
            if from == id {
                return result;
            }
            debug!(stale = from, current = id, "discarding frame of an abandoned exchange");
        }
    }

    async fn listen(&self) -> Result<Option<Vec<u8>>> {
        let result = {
            let mut inbound = self.inbound.lock().await;
            inbound.next(&*self.transport, &self.pending).await
        };

        match result {
            // Claimed at most once, and only if still pending.
            Ok((frame, owner))
                if owner != 0
                    && self
                        .pending
                        .compare_exchange(owner, 0, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok() =>
            {
                trace!(id = owner, "handing frame to pending exchange");
                let _ = self.tx.send((owner, Ok(frame))).await;
                Ok(None)
            }
            Ok((frame, _)) => Ok(Some(frame)),
            Err(e) => {
                let id = self.pending.swap(0, Ordering::SeqCst);
                if id != 0 {
                    let _ = self.tx.send((id, Err(Error::ConnectionLost))).await;
                }
                self.stopped.cancel();
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let _slot = self.slot.lock().await;
        self.transport.close().await
    }

    fn listener_stopped(&self) {
        // Nobody is left to read on behalf of an exchange.
        self.stopped.cancel();
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected() && !self.stopped.is_cancelled()
    }

    fn strategy(&self) -> Strategy {
        Strategy::Handoff
    }
}
