// hegelcli -- command-line remote for Hegel amplifiers.
//
// Usage:
//   hegelcli --host 192.168.1.40 --device H390 volume get
//   hegelcli --host 192.168.1.40 input set "Analog 1"
//   HEGEL_HOST=amp.local hegelcli power toggle
//   hegelcli --host amp.local:50001 watch --duration 60
//   hegelcli --host amp.local interactive
//   hegelcli --device H190V inputs
//   hegelcli devices

mod actions;
mod interactive;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use hegelmote::{DeviceType, Session, SessionBuilder};

use crate::actions::Action;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Remote control for Hegel amplifiers on the local network.
#[derive(Parser)]
#[command(name = "hegelcli", version, about)]
struct Cli {
    /// Amplifier address, optionally with a port (default port 50001).
    #[arg(long, env = "HEGEL_HOST")]
    host: Option<String>,

    /// Amplifier model, used to translate input names.
    #[arg(long, env = "HEGEL_DEVICE", default_value = "H95", value_parser = parse_device)]
    device: DeviceType,

    /// TCP dial timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    dial_timeout: u64,

    /// Do not refresh the reset delay while connected.
    #[arg(long)]
    no_keep_alive: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

fn parse_device(s: &str) -> std::result::Result<DeviceType, String> {
    s.parse::<DeviceType>().map_err(|e| e.to_string())
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Amp(Action),

    /// Print amplifier notifications as they happen.
    Watch {
        /// Duration in seconds (0 = run until Ctrl-C).
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Read commands from stdin, one per line.
    Interactive,

    /// List the input names of the selected model.
    Inputs,

    /// List supported models.
    Devices,
}

fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_devices() -> Result<()> {
    for device in DeviceType::ALL {
        println!("{:<6} {} inputs", device.name(), device.input_count());
    }
    Ok(())
}

fn cmd_inputs(device: DeviceType) -> Result<()> {
    println!("{device}:");
    for (i, name) in device.inputs().iter().enumerate() {
        println!("  {:>2}  {name}", i + 1);
    }
    Ok(())
}

async fn cmd_watch(session: &Session, duration_secs: u64) -> Result<()> {
    let mut events = session.subscribe();

    println!("Watching {} (Ctrl-C to stop)...", session.device_type());

    let deadline = (duration_secs > 0).then(|| Instant::now() + Duration::from_secs(duration_secs));

    loop {
        let timeout = match deadline {
            Some(dl) => {
                let remaining = dl.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                remaining
            }
            None => Duration::from_secs(3600),
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = tokio::time::timeout(timeout, events.recv()) => match event {
                Ok(Ok(event)) => println!("[event] {event:?}"),
                Ok(Err(RecvError::Lagged(n))) => {
                    println!("[warning] missed {n} events (consumer too slow)");
                }
                Ok(Err(RecvError::Closed)) => break,
                // The hourly wake-up without a deadline just loops.
                Err(_) if deadline.is_none() => {}
                Err(_) => break,
            },
        }
    }

    Ok(())
}

async fn connect(cli: &Cli) -> Result<Session> {
    let host = cli
        .host
        .as_deref()
        .context("no amplifier address: pass --host or set HEGEL_HOST")?;
    debug!(host, device = %cli.device, "connecting");

    let builder = SessionBuilder::new(cli.device)
        .dial_timeout(Duration::from_millis(cli.dial_timeout))
        .keep_alive(!cli.no_keep_alive);

    builder
        .connect(host)
        .await
        .with_context(|| format!("failed to connect to {host}"))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match &cli.command {
        // Catalog commands do not need a connection.
        Command::Devices => cmd_devices(),
        Command::Inputs => cmd_inputs(cli.device),
        Command::Amp(action) => {
            let session = connect(&cli).await?;
            let result = actions::run(&session, action)
                .await
                .map(|out| println!("{out}"));
            finish(session, result).await
        }
        Command::Watch { duration } => {
            let session = connect(&cli).await?;
            let result = cmd_watch(&session, *duration).await;
            finish(session, result).await
        }
        Command::Interactive => {
            let session = connect(&cli).await?;
            let result = interactive::run(&session).await;
            finish(session, result).await
        }
    }
}

/// Disconnect, keeping the command's own result.
async fn finish(session: Session, result: Result<()>) -> Result<()> {
    if let Err(e) = session.disconnect().await {
        debug!(error = %e, "disconnect failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::VolumeAction;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_one_shot_command() {
        let cli = Cli::try_parse_from([
            "hegelcli", "--host", "10.0.0.5", "--device", "h390", "volume", "set", "40",
        ])
        .unwrap();

        assert_eq!(cli.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(cli.device, DeviceType::H390);
        match cli.command {
            Command::Amp(Action::Volume {
                action: VolumeAction::Set { percent },
            }) => assert_eq!(percent, 40),
            _ => panic!("expected volume set"),
        }
    }

    #[test]
    fn rejects_unknown_device() {
        let result = Cli::try_parse_from(["hegelcli", "--device", "H1000", "devices"]);
        assert!(result.is_err());
    }

    #[test]
    fn catalog_commands_run_without_a_connection() {
        let cli = Cli::try_parse_from(["hegelcli", "--device", "H190", "inputs"]).unwrap();
        assert!(matches!(cli.command, Command::Inputs));
        assert!(cmd_inputs(cli.device).is_ok());
        assert!(cmd_devices().is_ok());
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["hegelcli", "-vv", "devices"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Devices));
    }
}
