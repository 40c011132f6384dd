//! Error types for streaming-asr.

use crate::session::SessionState;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AsrError {
    // Raised before any network activity
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Frame decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Payload compression error: {0}")]
    Compression(#[source] std::io::Error),

    #[error("Payload serialization error: {0}")]
    Serialization(String),

    #[error("Invalid extension header of {0} bytes (multiple of 4, at most 56)")]
    InvalidExtension(usize),

    /// Non-success status code returned by the server, surfaced verbatim.
    #[error("Server returned code {code}: {message}")]
    Protocol { code: u32, message: String },

    #[error("Cannot {operation} while session is {state:?}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AsrError {
    /// Status code carried by a protocol error, if any.
    pub fn code(&self) -> Option<u32> {
        match self {
            AsrError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AsrError {
    fn from(err: serde_json::Error) -> Self {
        AsrError::Serialization(err.to_string())
    }
}

/// A received frame could not be split along its declared boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame truncated reading {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid header size {0} (must be at least 1)")]
    InvalidHeaderSize(u8),

    #[error("Unknown message type 0x{0:X}")]
    UnknownMessageType(u8),

    #[error("Unknown message type flags 0x{0:X}")]
    UnknownFlags(u8),

    #[error("Unknown serialization method 0x{0:X}")]
    UnknownSerialization(u8),

    #[error("Unknown compression method 0x{0:X}")]
    UnknownCompression(u8),

    #[error("Negative payload size {0}")]
    NegativePayloadSize(i32),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Unexpected {0} message on binary channel")]
    UnexpectedMessage(&'static str),
}

pub type Result<T> = std::result::Result<T, AsrError>;
