//! Control Lines
//!
//! One command per stdin line, standing in for the accessory host:
//!
//! ```text
//! on | off              power
//! activity <id>         select an input
//! key <name>            remote key (up, down, select, play, ...)
//! mute                  toggle mute
//! volume up|down        step volume
//! refresh               forced re-read of the current activity
//! status                cached session state
//! list                  catalog
//! ```
//!
//! End of input only stops command reading; the daemon keeps running until
//! it is signalled, so it behaves the same with stdin on `/dev/null`.

use std::future::Future;

use harmony_core::{ActivityId, RemoteKey, VolumeDirection};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Errors that can occur when parsing a control line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    /// First word is not a known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command needs an argument
    #[error("Missing argument for '{0}'")]
    MissingArgument(&'static str),

    /// Argument could not be parsed
    #[error("Invalid argument for '{command}': {value}")]
    InvalidArgument {
        /// Command being parsed
        command: &'static str,
        /// Offending value
        value: String,
    },
}

/// A parsed control line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlCommand {
    /// Turn the accessory on or off
    Power(bool),
    /// Select an activity by id
    Activity(ActivityId),
    /// Press a remote key
    Key(RemoteKey),
    /// Toggle mute
    Mute,
    /// Step the volume
    Volume(VolumeDirection),
    /// Forced refresh
    Refresh,
    /// Print session state
    Status,
    /// Print the catalog
    List,
}

impl ControlCommand {
    /// Parse a line; blank lines yield `Ok(None)`
    pub fn parse(line: &str) -> Result<Option<Self>, ControlError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();

        let parsed = match command.to_ascii_lowercase().as_str() {
            "on" => Self::Power(true),
            "off" => Self::Power(false),
            "activity" => {
                let value = argument.ok_or(ControlError::MissingArgument("activity"))?;
                let id = value
                    .parse::<i64>()
                    .map_err(|_| ControlError::InvalidArgument {
                        command: "activity",
                        value: value.to_string(),
                    })?;
                Self::Activity(ActivityId(id))
            }
            "key" => {
                let value = argument.ok_or(ControlError::MissingArgument("key"))?;
                let key = RemoteKey::from_name(value).ok_or_else(|| {
                    ControlError::InvalidArgument {
                        command: "key",
                        value: value.to_string(),
                    }
                })?;
                Self::Key(key)
            }
            "mute" => Self::Mute,
            "volume" => {
                let value = argument.ok_or(ControlError::MissingArgument("volume"))?;
                let direction = match value.to_ascii_lowercase().as_str() {
                    "up" | "+" => VolumeDirection::Increment,
                    "down" | "-" => VolumeDirection::Decrement,
                    _ => {
                        return Err(ControlError::InvalidArgument {
                            command: "volume",
                            value: value.to_string(),
                        })
                    }
                };
                Self::Volume(direction)
            }
            "refresh" => Self::Refresh,
            "status" => Self::Status,
            "list" => Self::List,
            other => return Err(ControlError::UnknownCommand(other.to_string())),
        };

        Ok(Some(parsed))
    }
}

/// Hand every parsed line to `handle` until end of input
pub async fn read_commands<R, F, Fut>(reader: R, mut handle: F) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(ControlCommand) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match ControlCommand::parse(&line) {
            Ok(Some(command)) => handle(command).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring control line"),
        }
    }
    Ok(())
}

/// [`read_commands`], then wait forever once input is closed
pub async fn serve<R, F, Fut>(reader: R, handle: F) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(ControlCommand) -> Fut,
    Fut: Future<Output = ()>,
{
    read_commands(reader, handle).await?;
    info!("Control input closed, waiting for a signal");
    std::future::pending().await
}
