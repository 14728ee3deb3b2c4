use std::fmt;
use thiserror::Error;

use super::bus::BusError;

/// Remote operations issued against an adapter or device.
///
/// Device commands are reported with the device MAC. `SetDiscoverable` and
/// `SetDiscovering` only know the adapter path, so callers that hold the
/// adapter MAC add it to their own context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Pair,
    Trust,
    Remove,
    SetDiscoverable,
    SetDiscovering,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Command::Connect => "connect to device",
            Command::Pair => "pair with device",
            Command::Trust => "trust device",
            Command::Remove => "remove device",
            Command::SetDiscoverable => "set discoverable on adapter",
            Command::SetDiscovering => "toggle discovery on adapter",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Error)]
pub enum BluetoothError {
    #[error("failed to get managed objects: {0}")]
    Transport(String),

    #[error("failed to parse managed objects: {0}")]
    Decode(String),

    #[error("adapter with MAC address {0} not found")]
    NotFound(String),

    #[error("failed to {command} {target}: {source}")]
    Command {
        command: Command,
        /// Device MAC, or adapter path for adapter-level commands.
        target: String,
        #[source]
        source: BusError,
    },
}

impl From<BusError> for BluetoothError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Transport(msg) => BluetoothError::Transport(msg),
            BusError::Decode(msg) => BluetoothError::Decode(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, BluetoothError>;
