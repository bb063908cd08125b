//! Amplifier commands shared by one-shot invocations and interactive mode.

use anyhow::Result;
use clap::Subcommand;

use hegelmote::{Input, Session};

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Action {
    /// Power operations.
    Power {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Volume operations.
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Mute operations.
    Mute {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Input selection.
    Input {
        #[command(subcommand)]
        action: InputAction,
    },

    /// Reset delay (minutes until the amplifier reverts to local control).
    Reset {
        #[command(subcommand)]
        action: ResetAction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum SwitchAction {
    /// Read the current state.
    Get,
    On,
    Off,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum VolumeAction {
    /// Read the volume.
    Get,
    /// Set the volume in percent (0-100).
    Set { percent: u8 },
    /// One step up.
    Up,
    /// One step down.
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum InputAction {
    /// Read the selected input.
    Get,
    /// Select an input by number (from 1) or by name, e.g. `set Analog 1`.
    Set {
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ResetAction {
    /// Read the reset delay.
    Get,
    /// Set the reset delay in minutes.
    Set { minutes: u8 },
    /// Stop the reset timer.
    Stop,
}

/// Execute `action` and describe the amplifier's answer.
pub async fn run(session: &Session, action: &Action) -> Result<String> {
    let out = match action {
        Action::Power { action } => {
            let on = match action {
                SwitchAction::Get => session.get_power().await?,
                SwitchAction::On => session.set_power(true).await?,
                SwitchAction::Off => session.set_power(false).await?,
                SwitchAction::Toggle => session.toggle_power().await?,
            };
            format!("power: {}", if on { "on" } else { "off" })
        }
        Action::Volume { action } => {
            let volume = match action {
                VolumeAction::Get => session.get_volume().await?,
                VolumeAction::Set { percent } => session.set_volume(*percent).await?,
                VolumeAction::Up => session.volume_up().await?,
                VolumeAction::Down => session.volume_down().await?,
            };
            format!("volume: {volume}%")
        }
        Action::Mute { action } => {
            let muted = match action {
                SwitchAction::Get => session.get_mute().await?,
                SwitchAction::On => session.set_mute(true).await?,
                SwitchAction::Off => session.set_mute(false).await?,
                SwitchAction::Toggle => session.toggle_mute().await?,
            };
            format!("muted: {}", if muted { "yes" } else { "no" })
        }
        Action::Input { action } => {
            let input = match action {
                InputAction::Get => session.get_input().await?,
                InputAction::Set { input } => {
                    let input = input.join(" ");
                    match input.parse::<Input>() {
                        Ok(number) => session.set_input(number).await?,
                        Err(_) => session.set_input_by_name(&input).await?,
                    }
                }
            };
            describe_input(session, input)
        }
        Action::Reset { action } => {
            let delay = match action {
                ResetAction::Get => session.get_reset_delay().await?,
                ResetAction::Set { minutes } => session.set_reset_delay(*minutes).await?,
                ResetAction::Stop => session.stop_reset_delay().await?,
            };
            format!("reset delay: {delay}")
        }
    };
    Ok(out)
}

fn describe_input(session: &Session, input: Input) -> String {
    match session.device_type().input_name(input) {
        Ok(name) => format!("input: {input} ({name})"),
        Err(_) => format!("input: {input}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hegel_test_harness::MockTransport;
    use hegelmote::{DeviceType, SessionBuilder};

    async fn session(mock: &MockTransport) -> Session {
        SessionBuilder::new(DeviceType::H190)
            .keep_alive(false)
            .connect_with_transport(Box::new(mock.clone()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn power_and_mute_output() {
        let mock = MockTransport::new();
        let session = session(&mock).await;

        mock.expect(b"-p.0\r", b"-p.0\r");
        let out = run(&session, &Action::Power { action: SwitchAction::Off }).await;
        assert_eq!(out.unwrap(), "power: off");

        mock.expect(b"-m.t\r", b"-m.1\r");
        let out = run(&session, &Action::Mute { action: SwitchAction::Toggle }).await;
        assert_eq!(out.unwrap(), "muted: yes");

        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn volume_output() {
        let mock = MockTransport::new();
        let session = session(&mock).await;

        mock.expect(b"-v.35\r", b"-v.35\r");
        let action = Action::Volume {
            action: VolumeAction::Set { percent: 35 },
        };
        assert_eq!(run(&session, &action).await.unwrap(), "volume: 35%");

        let action = Action::Volume {
            action: VolumeAction::Set { percent: 150 },
        };
        assert!(run(&session, &action).await.is_err());
        assert_eq!(mock.sent_data().len(), 1);

        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn input_by_number_or_name() {
        let mock = MockTransport::new();
        let session = session(&mock).await;

        mock.expect(b"-i.2\r", b"-i.2\r");
        let action = Action::Input {
            action: InputAction::Set {
                input: vec!["2".into()],
            },
        };
        assert_eq!(run(&session, &action).await.unwrap(), "input: 2 (Analog 1)");

        let number = DeviceType::H190.input_number("Optical 1").unwrap();
        let frame = format!("-i.{number}\r").into_bytes();
        mock.expect(&frame, &frame);
        let action = Action::Input {
            action: InputAction::Set {
                input: vec!["Optical".into(), "1".into()],
            },
        };
        assert_eq!(
            run(&session, &action).await.unwrap(),
            format!("input: {number} (Optical 1)")
        );

        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn reset_output() {
        let mock = MockTransport::new();
        let session = session(&mock).await;

        mock.expect(b"-r.?\r", b"-r.~\r");
        let action = Action::Reset {
            action: ResetAction::Get,
        };
        assert_eq!(run(&session, &action).await.unwrap(), "reset delay: stopped");

        mock.expect(b"-r.4\r", b"-r.4\r");
        let action = Action::Reset {
            action: ResetAction::Set { minutes: 4 },
        };
        assert_eq!(run(&session, &action).await.unwrap(), "reset delay: 4 min");

        session.disconnect().await.unwrap();
    }
}
