use std::io;

use thiserror::Error;

/// Error that possible while assembling a command frame or a message layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("command text must not be empty")]
    EmptyCommand,
    #[error("illegal character {ch:?} in command text {text:?}")]
    IllegalCharacter { text: String, ch: char },
    #[error("payload too long for a 16-bit length field: {len} bytes")]
    PayloadTooLong { len: usize },
    #[error("field {field} of message {message} does not fit in a {frame_len}-byte frame")]
    InvalidField {
        message: &'static str,
        field: &'static str,
        frame_len: usize,
    },
    #[error("invalid signature for message {message}")]
    InvalidSignature { message: &'static str },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot open serial device {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Whether the error means the device itself cannot be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, TransportError::Connection { .. })
    }
}

/// Terminal outcome of a command that did not succeed
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no reply to {command} after {attempts} attempt(s)")]
    Timeout { command: String, attempts: u32 },
    #[error("reply to {command} arrived corrupted (checksum mismatch) after {attempts} attempt(s)")]
    ChecksumMismatch { command: String, attempts: u32 },
    #[error("device rejected {command}: {reply}")]
    Rejected { command: String, reply: String },
    #[error("device unreachable: {0}")]
    Unreachable(#[source] TransportError),
    #[error("serial I/O failed: {0}")]
    Io(#[source] io::Error),
    #[error("{command} was cancelled before any attempt")]
    Cancelled { command: String },
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<TransportError> for CommandError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Io(e) => CommandError::Io(e),
            other => CommandError::Unreachable(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateTimeError {
    #[error("invalid date")]
    InvalidDate,
    #[error("invalid time")]
    InvalidTime,
}
