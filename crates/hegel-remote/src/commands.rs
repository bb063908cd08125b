//! Hegel command builders and response parsers.
//!
//! All functions are pure: builders produce frame bytes and parsers consume a
//! received frame, without performing any I/O. Builders that take a value
//! validate it first, so an invalid argument never reaches the wire.
//!
//! Every command is answered with a frame for the same command character that
//! carries the resulting state, so setters, toggles and steps share the
//! parsers of their matching query.

use hegel_core::error::{Error, Result};
use hegel_core::types::{Input, MAX_VOLUME, Minutes, ResetDelay, Volume};

use crate::protocol::{self, Command, Frame, Value, encode};

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// Build a "read power" command (`-p.?\r`).
pub fn cmd_get_power() -> Vec<u8> {
    encode(Command::Power, Value::Query)
}

/// Build a "set power" command (`-p.0\r` / `-p.1\r`).
pub fn cmd_set_power(on: bool) -> Vec<u8> {
    encode(Command::Power, Value::Bool(on))
}

/// Build a "toggle power" command (`-p.t\r`).
pub fn cmd_toggle_power() -> Vec<u8> {
    encode(Command::Power, Value::Toggle)
}

/// Build a "read volume" command (`-v.?\r`).
pub fn cmd_get_volume() -> Vec<u8> {
    encode(Command::Volume, Value::Query)
}

/// Build a "set volume" command (`-v.<n>\r`).
///
/// Fails with [`Error::InvalidVolume`] above [`MAX_VOLUME`].
pub fn cmd_set_volume(volume: Volume) -> Result<Vec<u8>> {
    if volume > MAX_VOLUME {
        return Err(Error::InvalidVolume(volume));
    }
    Ok(encode(Command::Volume, Value::Number(volume)))
}

/// Build a "volume up one step" command (`-v.u\r`).
pub fn cmd_volume_up() -> Vec<u8> {
    encode(Command::Volume, Value::Up)
}

/// Build a "volume down one step" command (`-v.d\r`).
pub fn cmd_volume_down() -> Vec<u8> {
    encode(Command::Volume, Value::Down)
}

/// Build a "read mute" command (`-m.?\r`).
pub fn cmd_get_mute() -> Vec<u8> {
    encode(Command::Mute, Value::Query)
}

/// Build a "set mute" command (`-m.0\r` / `-m.1\r`).
pub fn cmd_set_mute(muted: bool) -> Vec<u8> {
    encode(Command::Mute, Value::Bool(muted))
}

/// Build a "toggle mute" command (`-m.t\r`).
pub fn cmd_toggle_mute() -> Vec<u8> {
    encode(Command::Mute, Value::Toggle)
}

/// Build a "read input" command (`-i.?\r`).
pub fn cmd_get_input() -> Vec<u8> {
    encode(Command::Input, Value::Query)
}

/// Build a "select input" command (`-i.<n>\r`).
///
/// Input numbers start at 1; 0 fails with [`Error::InputIsZero`]. The upper
/// bound depends on the model and is left to the amplifier.
pub fn cmd_set_input(input: Input) -> Result<Vec<u8>> {
    if input == 0 {
        return Err(Error::InputIsZero);
    }
    Ok(encode(Command::Input, Value::Number(input)))
}

/// Build a "read reset delay" command (`-r.?\r`).
pub fn cmd_get_reset_delay() -> Vec<u8> {
    encode(Command::Reset, Value::Query)
}

/// Build a "set reset delay" command (`-r.<minutes>\r`).
pub fn cmd_set_reset_delay(minutes: Minutes) -> Vec<u8> {
    encode(Command::Reset, Value::Number(minutes))
}

/// Build a "stop reset timer" command (`-r.~\r`).
pub fn cmd_stop_reset_delay() -> Vec<u8> {
    encode(Command::Reset, Value::Stop)
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Decode `frame` and check that it answers `expected`.
///
/// Error frames surface as device errors. A well-formed frame for another
/// command fails with [`Error::UnexpectedResponse`].
pub fn expect_response(expected: Command, frame: &[u8]) -> Result<Frame<'_>> {
    let decoded = protocol::decode(frame)?;
    if decoded.command != expected.as_byte() {
        return Err(Error::UnexpectedResponse {
            expected: expected.as_byte(),
            frame: frame.to_vec(),
        });
    }
    Ok(decoded)
}

/// Parse a `0`/`1` response to a power or mute command.
pub fn parse_bool_response(expected: Command, frame: &[u8]) -> Result<bool> {
    let decoded = expect_response(expected, frame)?;
    protocol::parse_bool(decoded.value)
}

/// Parse a numeric response to a volume or input command.
pub fn parse_number_response(expected: Command, frame: &[u8]) -> Result<u8> {
    let decoded = expect_response(expected, frame)?;
    protocol::parse_u8(decoded.value)
}

/// Parse a response to any reset delay command.
///
/// A `~` value means the timer is stopped, whichever command was sent.
pub fn parse_reset_response(frame: &[u8]) -> Result<ResetDelay> {
    let decoded = expect_response(Command::Reset, frame)?;
    if decoded.value == b"~" {
        return Ok(ResetDelay::stopped());
    }
    protocol::parse_u8(decoded.value).map(ResetDelay::minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hegel_core::error::DeviceError;

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    #[test]
    fn power_commands() {
        assert_eq!(cmd_get_power(), b"-p.?\r");
        assert_eq!(cmd_set_power(true), b"-p.1\r");
        assert_eq!(cmd_set_power(false), b"-p.0\r");
        assert_eq!(cmd_toggle_power(), b"-p.t\r");
    }

    #[test]
    fn volume_commands() {
        assert_eq!(cmd_get_volume(), b"-v.?\r");
        assert_eq!(cmd_volume_up(), b"-v.u\r");
        assert_eq!(cmd_volume_down(), b"-v.d\r");
    }

    #[test]
    fn set_volume_writes_every_valid_level() {
        for v in 0..=MAX_VOLUME {
            assert_eq!(cmd_set_volume(v).unwrap(), format!("-v.{v}\r").as_bytes());
        }
    }

    #[test]
    fn set_volume_rejects_above_max() {
        for v in [101, 150, 255] {
            assert!(matches!(cmd_set_volume(v), Err(Error::InvalidVolume(got)) if got == v));
        }
    }

    #[test]
    fn mute_commands() {
        assert_eq!(cmd_get_mute(), b"-m.?\r");
        assert_eq!(cmd_set_mute(true), b"-m.1\r");
        assert_eq!(cmd_toggle_mute(), b"-m.t\r");
    }

    #[test]
    fn input_commands() {
        assert_eq!(cmd_get_input(), b"-i.?\r");
        assert_eq!(cmd_set_input(1).unwrap(), b"-i.1\r");
        assert_eq!(cmd_set_input(11).unwrap(), b"-i.11\r");
        assert!(matches!(cmd_set_input(0), Err(Error::InputIsZero)));
    }

    #[test]
    fn reset_commands() {
        assert_eq!(cmd_get_reset_delay(), b"-r.?\r");
        assert_eq!(cmd_set_reset_delay(3), b"-r.3\r");
        assert_eq!(cmd_set_reset_delay(255), b"-r.255\r");
        assert_eq!(cmd_stop_reset_delay(), b"-r.~\r");
    }

    // ---------------------------------------------------------------
    // Parsers
    // ---------------------------------------------------------------

    #[test]
    fn parse_bool_responses() {
        assert!(parse_bool_response(Command::Power, b"-p.1\r").unwrap());
        assert!(!parse_bool_response(Command::Mute, b"-m.0\r").unwrap());
    }

    #[test]
    fn parse_number_responses() {
        assert_eq!(parse_number_response(Command::Volume, b"-v.100\r").unwrap(), 100);
        assert_eq!(parse_number_response(Command::Input, b"-i.4\r").unwrap(), 4);
    }

    #[test]
    fn parse_reset_responses() {
        assert_eq!(
            parse_reset_response(b"-r.3\r").unwrap(),
            ResetDelay::minutes(3)
        );
        assert_eq!(
            parse_reset_response(b"-r.~\r").unwrap(),
            ResetDelay::stopped()
        );
    }

    #[test]
    fn mismatched_command_is_unexpected_response() {
        let err = parse_bool_response(Command::Power, b"-v.1\r").unwrap_err();
        match err {
            Error::UnexpectedResponse { expected, frame } => {
                assert_eq!(expected, b'p');
                assert_eq!(frame, b"-v.1\r");
            }
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
    }

    #[test]
    fn error_frames_map_to_device_errors_for_every_parser() {
        let frame = b"-e.2\r";
        assert!(matches!(
            parse_bool_response(Command::Power, frame),
            Err(Error::Device(DeviceError::UnknownCommand))
        ));
        assert!(matches!(
            parse_number_response(Command::Volume, frame),
            Err(Error::Device(DeviceError::UnknownCommand))
        ));
        assert!(matches!(
            parse_reset_response(frame),
            Err(Error::Device(DeviceError::UnknownCommand))
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            parse_number_response(Command::Volume, b"-v.abc\r"),
            Err(Error::InvalidNumericValue(_))
        ));
        assert!(matches!(
            parse_reset_response(b"-r.300\r"),
            Err(Error::InvalidNumericValue(_))
        ));
        assert!(matches!(
            parse_bool_response(Command::Mute, b"-m.t\r"),
            Err(Error::InvalidNumericValue(_))
        ));
    }
}
