//! Hegel remote control frame encoder/decoder.
//!
//! Every message in either direction is a short ASCII frame:
//!
//! ```text
//! -<cmd>.<value>\r
//! ```
//!
//! - `cmd`: one of `p` (power), `v` (volume), `m` (mute), `i` (input),
//!   `r` (reset delay) or, from the amplifier only, `e` (error).
//! - `value`: a decimal number 0-255 without leading zeros, or one of the
//!   single-character flags `0`/`1`, `t` (toggle), `u`/`d` (step up/down),
//!   `?` (query) and `~` (stop the reset timer).
//! - Terminator: `\r` (0x0D).
//!
//! Frames are 5 to 7 bytes long; the longest is `-v.100\r`. The amplifier
//! answers every command with a frame carrying the same command character,
//! or with `-e.<digit>\r` if it rejected the command.

use bytes::{BufMut, BytesMut};

use hegel_core::error::{DeviceError, Error, Result};

/// First byte of every frame.
pub const START: u8 = b'-';

/// Separator between the command character and the value.
pub const SEPARATOR: u8 = b'.';

/// Last byte of every frame.
pub const TERMINATOR: u8 = b'\r';

/// Shortest well-formed frame, e.g. `-p.1\r`.
pub const MIN_FRAME_LEN: usize = 5;

/// Longest well-formed frame, `-v.100\r`.
pub const MAX_FRAME_LEN: usize = 7;

/// Command character of error frames sent by the amplifier.
pub const ERROR_COMMAND: u8 = b'e';

/// Commands understood by the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Power,
    Volume,
    Mute,
    Input,
    Reset,
}

impl Command {
    /// The wire character for this command.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Power => b'p',
            Command::Volume => b'v',
            Command::Mute => b'm',
            Command::Input => b'i',
            Command::Reset => b'r',
        }
    }

    /// Look up a command by its wire character.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'p' => Some(Command::Power),
            b'v' => Some(Command::Volume),
            b'm' => Some(Command::Mute),
            b'i' => Some(Command::Input),
            b'r' => Some(Command::Reset),
            _ => None,
        }
    }
}

/// The value part of an outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// Decimal number, 1 to 3 digits.
    Number(u8),
    /// `1` or `0`.
    Bool(bool),
    /// `t`
    Toggle,
    /// `u`
    Up,
    /// `d`
    Down,
    /// `?`
    Query,
    /// `~`
    Stop,
}

/// A decoded, non-error frame.
///
/// `value` borrows the bytes between the separator and the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// The raw command character. Not guaranteed to be a known [`Command`].
    pub command: u8,
    /// Value bytes, at least one.
    pub value: &'a [u8],
}

impl Frame<'_> {
    /// The frame's command, if it is one we know.
    pub fn known_command(&self) -> Option<Command> {
        Command::from_byte(self.command)
    }
}

/// Encode a command frame.
///
/// # Example
///
/// ```
/// use hegel_remote::protocol::{encode, Command, Value};
///
/// assert_eq!(encode(Command::Volume, Value::Number(100)), b"-v.100\r");
/// assert_eq!(encode(Command::Power, Value::Bool(true)), b"-p.1\r");
/// assert_eq!(encode(Command::Reset, Value::Stop), b"-r.~\r");
/// ```
pub fn encode(command: Command, value: Value) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_LEN);
    buf.put_u8(START);
    buf.put_u8(command.as_byte());
    buf.put_u8(SEPARATOR);
    match value {
        Value::Number(n) => buf.put_slice(n.to_string().as_bytes()),
        Value::Bool(on) => buf.put_u8(if on { b'1' } else { b'0' }),
        Value::Toggle => buf.put_u8(b't'),
        Value::Up => buf.put_u8(b'u'),
        Value::Down => buf.put_u8(b'd'),
        Value::Query => buf.put_u8(b'?'),
        Value::Stop => buf.put_u8(b'~'),
    }
    buf.put_u8(TERMINATOR);
    buf.to_vec()
}

/// Decode one complete frame, terminator included.
///
/// Structural problems yield [`Error::MalformedFrame`]. Error frames are
/// mapped to [`Error::Device`], or [`Error::UnknownErrorCode`] for a digit
/// outside the known set.
///
/// # Example
///
/// ```
/// use hegel_core::error::{DeviceError, Error};
/// use hegel_remote::protocol::decode;
///
/// let frame = decode(b"-v.42\r").unwrap();
/// assert_eq!(frame.command, b'v');
/// assert_eq!(frame.value, b"42");
///
/// assert!(matches!(
///     decode(b"-e.3\r"),
///     Err(Error::Device(DeviceError::InvalidParameter))
/// ));
/// ```
pub fn decode(buf: &[u8]) -> Result<Frame<'_>> {
    let n = buf.len();
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&n)
        || buf[0] != START
        || buf[2] != SEPARATOR
        || buf[n - 1] != TERMINATOR
    {
        return Err(Error::MalformedFrame(buf.to_vec()));
    }

    let command = buf[1];
    let value = &buf[3..n - 1];
    if value.contains(&TERMINATOR) {
        return Err(Error::MalformedFrame(buf.to_vec()));
    }

    if command == ERROR_COMMAND {
        let code = value[0];
        return Err(match DeviceError::from_code(code) {
            Some(e) => Error::Device(e),
            None => Error::UnknownErrorCode(code),
        });
    }

    Ok(Frame { command, value })
}

/// Parse a decimal value of 1 to 3 digits into a `u8`.
pub fn parse_u8(value: &[u8]) -> Result<u8> {
    if value.is_empty() || value.len() > 3 || !value.iter().all(u8::is_ascii_digit) {
        return Err(Error::InvalidNumericValue(value.to_vec()));
    }
    let number = value
        .iter()
        .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
    u8::try_from(number).map_err(|_| Error::InvalidNumericValue(value.to_vec()))
}

/// Parse a `0`/`1` value.
pub fn parse_bool(value: &[u8]) -> Result<bool> {
    match value {
        b"1" => Ok(true),
        b"0" => Ok(false),
        _ => Err(Error::InvalidNumericValue(value.to_vec())),
    }
}

// ---------------------------------------------------------------------------
// Stream framing
// ---------------------------------------------------------------------------

/// Bytes accumulated without a terminator before the buffer is discarded.
///
/// Real frames are at most 7 bytes; anything this long is line noise.
const MAX_BUF: usize = 64;

/// Accumulates inbound bytes and splits them into `\r`-terminated frames.
///
/// TCP gives no message boundaries: a frame may arrive across two reads, or
/// two frames may arrive in one.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        if self.buf.len() > MAX_BUF && !self.buf.contains(&TERMINATOR) {
            tracing::warn!(len = self.buf.len(), "inbound buffer overflow, resetting");
            self.buf.clear();
        }
    }

    /// Take the next complete frame, terminator included.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let end = self.buf.iter().position(|&b| b == TERMINATOR)?;
        let frame = self.buf.split_to(end + 1).to_vec();
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // encode
    // -----------------------------------------------------------------------

    #[test]
    fn encode_numbers_without_leading_zeros() {
        assert_eq!(encode(Command::Volume, Value::Number(0)), b"-v.0\r");
        assert_eq!(encode(Command::Volume, Value::Number(7)), b"-v.7\r");
        assert_eq!(encode(Command::Volume, Value::Number(42)), b"-v.42\r");
        assert_eq!(encode(Command::Reset, Value::Number(255)), b"-r.255\r");
    }

    #[test]
    fn encode_booleans() {
        assert_eq!(encode(Command::Power, Value::Bool(true)), b"-p.1\r");
        assert_eq!(encode(Command::Mute, Value::Bool(false)), b"-m.0\r");
    }

    #[test]
    fn encode_sentinels() {
        assert_eq!(encode(Command::Power, Value::Toggle), b"-p.t\r");
        assert_eq!(encode(Command::Volume, Value::Up), b"-v.u\r");
        assert_eq!(encode(Command::Volume, Value::Down), b"-v.d\r");
        assert_eq!(encode(Command::Input, Value::Query), b"-i.?\r");
        assert_eq!(encode(Command::Reset, Value::Stop), b"-r.~\r");
    }

    #[test]
    fn command_bytes_round_trip() {
        for cmd in [
            Command::Power,
            Command::Volume,
            Command::Mute,
            Command::Input,
            Command::Reset,
        ] {
            assert_eq!(Command::from_byte(cmd.as_byte()), Some(cmd));
        }
        assert_eq!(Command::from_byte(b'e'), None);
        assert_eq!(Command::from_byte(b'x'), None);
    }

    // -----------------------------------------------------------------------
    // decode
    // -----------------------------------------------------------------------

    #[test]
    fn decode_shortest_and_longest() {
        let f = decode(b"-p.1\r").unwrap();
        assert_eq!(f.command, b'p');
        assert_eq!(f.value, b"1");
        assert_eq!(f.known_command(), Some(Command::Power));

        let f = decode(b"-v.100\r").unwrap();
        assert_eq!(f.command, b'v');
        assert_eq!(f.value, b"100");
    }

    #[test]
    fn decode_rejects_short_frames() {
        for buf in [&b""[..], b"-", b"-p.\r", b"-p1\r"] {
            assert!(
                matches!(decode(buf), Err(Error::MalformedFrame(_))),
                "{buf:?}"
            );
        }
    }

    #[test]
    fn decode_rejects_long_frames() {
        assert!(matches!(
            decode(b"-v.1000\r"),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn decode_rejects_bad_structure() {
        for buf in [
            &b"+p.1\r"[..],
            b"-p,1\r",
            b"-p.1\n",
            b"-p.\r\r",
            b"-v.1\r0\r",
        ] {
            assert!(
                matches!(decode(buf), Err(Error::MalformedFrame(_))),
                "{buf:?}"
            );
        }
    }

    #[test]
    fn decode_keeps_unknown_command_bytes() {
        let f = decode(b"-x.1\r").unwrap();
        assert_eq!(f.command, b'x');
        assert_eq!(f.known_command(), None);
    }

    #[test]
    fn decode_device_errors() {
        assert!(matches!(
            decode(b"-e.1\r"),
            Err(Error::Device(DeviceError::MalformedCommand))
        ));
        assert!(matches!(
            decode(b"-e.2\r"),
            Err(Error::Device(DeviceError::UnknownCommand))
        ));
        assert!(matches!(
            decode(b"-e.3\r"),
            Err(Error::Device(DeviceError::InvalidParameter))
        ));
    }

    #[test]
    fn decode_unknown_error_codes() {
        assert!(matches!(
            decode(b"-e.0\r"),
            Err(Error::UnknownErrorCode(b'0'))
        ));
        assert!(matches!(
            decode(b"-e.9\r"),
            Err(Error::UnknownErrorCode(b'9'))
        ));
    }

    #[test]
    fn encode_decode_round_trip_for_command_set() {
        let mut frames: Vec<Vec<u8>> = Vec::new();
        for cmd in [Command::Power, Command::Mute] {
            for value in [Value::Bool(true), Value::Bool(false), Value::Toggle, Value::Query] {
                frames.push(encode(cmd, value));
            }
        }
        for v in 0..=100 {
            frames.push(encode(Command::Volume, Value::Number(v)));
        }
        frames.push(encode(Command::Volume, Value::Up));
        frames.push(encode(Command::Volume, Value::Down));
        frames.push(encode(Command::Volume, Value::Query));
        for n in 1..=20 {
            frames.push(encode(Command::Input, Value::Number(n)));
        }
        frames.push(encode(Command::Input, Value::Query));
        for n in 0..=255 {
            frames.push(encode(Command::Reset, Value::Number(n)));
        }
        frames.push(encode(Command::Reset, Value::Query));
        frames.push(encode(Command::Reset, Value::Stop));

        for frame in frames {
            let decoded = decode(&frame).unwrap();
            let cmd = decoded.known_command().unwrap();
            let value = match decoded.value {
                b"t" => Value::Toggle,
                b"u" => Value::Up,
                b"d" => Value::Down,
                b"?" => Value::Query,
                b"~" => Value::Stop,
                v if matches!(cmd, Command::Power | Command::Mute) => {
                    Value::Bool(parse_bool(v).unwrap())
                }
                v => Value::Number(parse_u8(v).unwrap()),
            };
            assert_eq!(encode(cmd, value), frame);
        }
    }

    // -----------------------------------------------------------------------
    // value parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_u8_accepts_full_range() {
        assert_eq!(parse_u8(b"0").unwrap(), 0);
        assert_eq!(parse_u8(b"42").unwrap(), 42);
        assert_eq!(parse_u8(b"255").unwrap(), 255);
    }

    #[test]
    fn parse_u8_rejects_overflow() {
        assert!(matches!(
            parse_u8(b"256"),
            Err(Error::InvalidNumericValue(v)) if v == b"256"
        ));
        assert!(matches!(
            parse_u8(b"999"),
            Err(Error::InvalidNumericValue(_))
        ));
    }

    #[test]
    fn parse_u8_rejects_non_digits() {
        for v in [&b"?"[..], b"~", b"1a", b"-1", b""] {
            assert!(
                matches!(parse_u8(v), Err(Error::InvalidNumericValue(_))),
                "{v:?}"
            );
        }
    }

    #[test]
    fn parse_bool_values() {
        assert!(parse_bool(b"1").unwrap());
        assert!(!parse_bool(b"0").unwrap());
        assert!(matches!(
            parse_bool(b"2"),
            Err(Error::InvalidNumericValue(_))
        ));
    }

    // -----------------------------------------------------------------------
    // FrameBuffer
    // -----------------------------------------------------------------------

    #[test]
    fn frame_buffer_reassembles_split_frame() {
        let mut buf = FrameBuffer::new();
        buf.extend(b"-v.");
        assert_eq!(buf.next_frame(), None);
        buf.extend(b"42\r");
        assert_eq!(buf.next_frame().unwrap(), b"-v.42\r");
        assert_eq!(buf.buf.len(), 0);
    }

    #[test]
    fn frame_buffer_splits_coalesced_frames() {
        let mut buf = FrameBuffer::new();
        buf.extend(b"-p.1\r-v.20\r-m");
        assert_eq!(buf.next_frame().unwrap(), b"-p.1\r");
        assert_eq!(buf.next_frame().unwrap(), b"-v.20\r");
        assert_eq!(buf.next_frame(), None);
        assert_eq!(buf.buf.len(), 2);
    }

    #[test]
    fn frame_buffer_discards_runaway_noise() {
        let mut buf = FrameBuffer::new();
        buf.extend(&[b'x'; MAX_BUF + 1]);
        assert_eq!(buf.buf.len(), 0);
        buf.extend(b"-i.3\r");
        assert_eq!(buf.next_frame().unwrap(), b"-i.3\r");
    }
}
