//! Protocol error types

use std::io;
use thiserror::Error;

/// Errors reading or writing framed messages
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid message type tag: {0}")]
    InvalidMessageType(u8),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::ConnectionClosed
        } else {
            CodecError::Io(e)
        }
    }
}

/// Fence protocol violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenceError {
    #[error("SceneEnd without a matching SceneBegin")]
    UnmatchedEnd,

    #[error("SceneBegin while a transaction is open; pending changes discarded")]
    NestedBegin,
}

/// Query reply failures seen by the waiting side
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("Responder dropped without finish_respond")]
    Abandoned,

    #[error("Stopped while waiting for a response")]
    Cancelled,
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
