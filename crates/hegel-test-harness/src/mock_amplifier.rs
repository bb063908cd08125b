//! Simulated amplifier on a local TCP port.
//!
//! [`MockAmplifier`] listens on a random localhost port and behaves like a
//! Hegel amplifier: it keeps power, volume, mute, input and reset-delay state,
//! answers every command frame the way the device does (including its `-e.N`
//! error frames), and can push unsolicited frames to simulate front-panel use.
//!
//! # Example
//!
//! ```
//! use hegel_core::DeviceType;
//! use hegel_test_harness::MockAmplifier;
//!
//! # async fn example() -> hegel_core::Result<()> {
//! let amp = MockAmplifier::start(DeviceType::H190).await?;
//! // Connect a TcpTransport or session to `amp.addr()`, then:
//! amp.front_panel_volume(30);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hegel_core::device::DeviceType;
use hegel_core::error::{Error, Result};
use hegel_core::types::{Input, MAX_VOLUME, Minutes, Volume};

/// Observable state of a [`MockAmplifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmpState {
    pub power: bool,
    pub volume: Volume,
    pub muted: bool,
    pub input: Input,
    /// `None` while the reset timer is stopped.
    pub reset_delay: Option<Minutes>,
}

impl Default for AmpState {
    fn default() -> Self {
        AmpState {
            power: true,
            volume: 20,
            muted: false,
            input: 1,
            reset_delay: None,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: AmpState,
    received: Vec<Vec<u8>>,
    connections: usize,
}

/// A scripted amplifier peer for TCP-level tests.
///
/// One client is served at a time; after it disconnects the next connection
/// is accepted with state preserved.
pub struct MockAmplifier {
    addr: String,
    device: DeviceType,
    shared: Arc<Mutex<Shared>>,
    push_tx: mpsc::UnboundedSender<Vec<u8>>,
    server_handle: JoinHandle<()>,
}

impl MockAmplifier {
    /// Bind to a random localhost port and start serving.
    pub async fn start(device: DeviceType) -> Result<Self> {
        Self::start_with_state(device, AmpState::default()).await
    }

    /// Like [`start`](MockAmplifier::start) with a given initial state.
    pub async fn start_with_state(device: DeviceType, state: AmpState) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock amplifier: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();

        let shared = Arc::new(Mutex::new(Shared {
            state,
            ..Shared::default()
        }));
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let server_handle = tokio::spawn(serve(listener, device, Arc::clone(&shared), push_rx));

        Ok(Self {
            addr,
            device,
            shared,
            push_tx,
            server_handle,
        })
    }

    /// Get the address the amplifier is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn device(&self) -> DeviceType {
        self.device
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AmpState {
        self.shared().state.clone()
    }

    /// Every command frame received so far, in order.
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.shared().received.clone()
    }

    /// Number of client connections accepted so far.
    pub fn connections(&self) -> usize {
        self.shared().connections
    }

    /// Send raw bytes to the connected client.
    pub fn push(&self, frame: &[u8]) {
        let _ = self.push_tx.send(frame.to_vec());
    }

    /// Change the volume as if turned on the front panel and report it.
    pub fn front_panel_volume(&self, volume: Volume) {
        self.shared().state.volume = volume;
        self.push(format!("-v.{volume}\r").as_bytes());
    }

    /// Switch power as if pressed on the front panel and report it.
    pub fn front_panel_power(&self, on: bool) {
        self.shared().state.power = on;
        self.push(if on { b"-p.1\r" } else { b"-p.0\r" });
    }

    /// Report that the reset timer fired.
    pub fn fire_reset(&self) {
        self.push(b"-r.0\r");
    }
}

impl Drop for MockAmplifier {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

async fn serve(
    listener: TcpListener,
    device: DeviceType,
    shared: Arc<Mutex<Shared>>,
    mut push_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Ok((mut stream, _)) = listener.accept().await {
        shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connections += 1;

        let mut pending = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            tokio::select! {
                read = stream.read(&mut buf) => {
                    let n = match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(end) = pending.iter().position(|&b| b == b'\r') {
                        let frame: Vec<u8> = pending.drain(..=end).collect();
                        let reply = {
                            let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
                            shared.received.push(frame.clone());
                            respond(&mut shared.state, device, &frame)
                        };
                        if stream.write_all(&reply).await.is_err() {
                            break;
                        }
                    }
                }
                pushed = push_rx.recv() => {
                    let Some(frame) = pushed else { return };
                    if stream.write_all(&frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Apply one command frame to `state` and build the amplifier's reply.
fn respond(state: &mut AmpState, device: DeviceType, frame: &[u8]) -> Vec<u8> {
    const MALFORMED: &[u8] = b"-e.1\r";
    const UNKNOWN: &[u8] = b"-e.2\r";
    const INVALID: &[u8] = b"-e.3\r";

    if frame.len() < 5 || frame.len() > 7 || frame[0] != b'-' || frame[2] != b'.' {
        return MALFORMED.to_vec();
    }
    let command = frame[1];
    let value = &frame[3..frame.len() - 1];
    let number = std::str::from_utf8(value)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u8>().ok());

    let flag = |current: bool| -> Option<bool> {
        match value {
            b"?" => Some(current),
            b"0" => Some(false),
            b"1" => Some(true),
            b"t" => Some(!current),
            _ => None,
        }
    };

    match command {
        b'p' => match flag(state.power) {
            Some(on) => {
                state.power = on;
                format!("-p.{}\r", u8::from(on)).into_bytes()
            }
            None => INVALID.to_vec(),
        },
        b'm' => match flag(state.muted) {
            Some(muted) => {
                state.muted = muted;
                format!("-m.{}\r", u8::from(muted)).into_bytes()
            }
            None => INVALID.to_vec(),
        },
        b'v' => {
            let volume = match (value, number) {
                (b"?", _) => state.volume,
                (b"u", _) => (state.volume + 1).min(MAX_VOLUME),
                (b"d", _) => state.volume.saturating_sub(1),
                (_, Some(v)) if v <= MAX_VOLUME => v,
                _ => return INVALID.to_vec(),
            };
            state.volume = volume;
            format!("-v.{volume}\r").into_bytes()
        }
        b'i' => {
            let input = match (value, number) {
                (b"?", _) => state.input,
                (_, Some(n)) if n >= 1 && usize::from(n) <= device.input_count() => n,
                _ => return INVALID.to_vec(),
            };
            state.input = input;
            format!("-i.{input}\r").into_bytes()
        }
        b'r' => {
            match (value, number) {
                (b"?", _) => {}
                (b"~", _) => state.reset_delay = None,
                (_, Some(m)) => state.reset_delay = Some(m),
                _ => return INVALID.to_vec(),
            }
            match state.reset_delay {
                Some(m) => format!("-r.{m}\r").into_bytes(),
                None => b"-r.~\r".to_vec(),
            }
        }
        _ => UNKNOWN.to_vec(),
    }
}
