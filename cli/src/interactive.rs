//! Interactive mode: one command per stdin line, with notifications printed
//! as they arrive.
//!
//! Lines use the same grammar as the one-shot subcommands, e.g.
//! `volume set 30`, `input set Analog 1`, `power toggle`. `exit` or `quit`
//! ends the session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use hegelmote::Session;

use crate::actions::{self, Action};

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: LineCommand,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum LineCommand {
    #[command(flatten)]
    Amp(Action),

    /// Leave interactive mode.
    #[command(alias = "quit")]
    Exit,
}

fn parse_line(line: &str) -> std::result::Result<LineCommand, clap::Error> {
    Line::try_parse_from(line.split_whitespace()).map(|l| l.command)
}

pub async fn run(session: &Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = session.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(LineCommand::Exit) => break,
                    Ok(LineCommand::Amp(action)) => match actions::run(session, &action).await {
                        Ok(out) => println!("{out}"),
                        Err(e) => eprintln!("error: {e:#}"),
                    },
                    Err(e) => eprintln!("{e}"),
                }
            }
            event = events.recv() => match event {
                Ok(event) => println!("[event] {event:?}"),
                Err(RecvError::Lagged(n)) => println!("[warning] missed {n} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
