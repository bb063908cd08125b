//! Error types for hegelmote.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Local validation, frame decoding,
//! device-reported, and transport-level failures are all captured here.

/// An error reported by the amplifier itself in an `-e.<code>\r` frame.
///
/// The codes were worked out by sending deliberately broken commands; the
/// device documentation does not list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DeviceError {
    /// `-e.1\r`: the command frame was not well formed.
    #[error("malformed command")]
    MalformedCommand,
    /// `-e.2\r`: the command character is not known to the device.
    #[error("unknown command")]
    UnknownCommand,
    /// `-e.3\r`: the command was understood but its value was rejected.
    #[error("invalid parameter")]
    InvalidParameter,
}

impl DeviceError {
    /// Map the ASCII digit of an error frame to a device error.
    ///
    /// Returns `None` for any digit outside `1..=3`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'1' => Some(DeviceError::MalformedCommand),
            b'2' => Some(DeviceError::UnknownCommand),
            b'3' => Some(DeviceError::InvalidParameter),
            _ => None,
        }
    }
}

/// The error type for all hegelmote operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A volume above 100 was passed to a command. No I/O was performed.
    #[error("invalid volume: {0} (must be 0-100)")]
    InvalidVolume(u8),

    /// Input 0 was passed to a command. Inputs are numbered from 1.
    #[error("input cannot be zero, numbering starts at 1")]
    InputIsZero,

    /// An input number is larger than the device's input count.
    #[error("input {input} is out of range for {device} (has {count} inputs)")]
    InputOutOfRange {
        /// The requested input number.
        input: u8,
        /// Display name of the device type.
        device: &'static str,
        /// Number of inputs the device has.
        count: usize,
    },

    /// An input name does not exist on the device.
    #[error("unknown input {name:?} for {device}")]
    UnknownInput {
        /// The requested input name.
        name: String,
        /// Display name of the device type.
        device: &'static str,
    },

    /// A model name could not be matched to a supported device type.
    #[error("unsupported device: {0}")]
    UnsupportedDevice(String),

    /// A received frame violates the `-<cmd>.<value>\r` structure.
    #[error("malformed frame: {0:?}")]
    MalformedFrame(Vec<u8>),

    /// A numeric frame value contained non-digit bytes or did not fit in 8 bits.
    #[error("invalid numeric value: {0:?}")]
    InvalidNumericValue(Vec<u8>),

    /// The response answered a different command than the one sent.
    #[error("unexpected response to '{}': {frame:?}", *.expected as char)]
    UnexpectedResponse {
        /// The command character that was sent.
        expected: u8,
        /// The raw frame that came back.
        frame: Vec<u8>,
    },

    /// The device answered with one of its known error codes.
    #[error("device error: {0}")]
    Device(DeviceError),

    /// The device answered with an error code outside the known set.
    #[error("received unknown error code: {}", *.0 as char)]
    UnknownErrorCode(u8),

    /// The device pushed a frame with a command character we do not know.
    #[error("received unknown command '{}' from amplifier", *.0 as char)]
    UnknownCommand(u8),

    /// A transport-level error (dial failure, socket error).
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for a connection or a response.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection is established, or the session is closing.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Error::Device(e)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
