// src/core/errors.rs

//! Defines the primary error type for the entire crate.

use std::num::ParseIntError;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the client.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations.
#[derive(Error, Debug)]
pub enum DiloError {
    /// An I/O failure on the underlying transport. Always fatal to the
    /// connection it occurred on; the client never retries internally.
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The read buffer does not yet contain a complete frame. This is the
    /// codec's internal "need more bytes" signal and never escapes the
    /// connection layer.
    #[error("Incomplete data in stream")]
    IncompleteData,

    /// Malformed bytes on the wire. Indicates a codec/server mismatch and is
    /// never retryable.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A well-formed `-` error reply from the server. The connection remains
    /// usable after this is raised.
    #[error("Server error: {0}")]
    ServerError(String),

    /// The blocking acquire did not obtain a token within the configured
    /// window. Only raised when the lock is configured to throw on timeout.
    #[error("could not acquire a lock for the name [{name}] in [{seconds}] seconds")]
    LockTimeout { name: String, seconds: String },

    /// Invalid lock parameters or an invalid command shape, raised
    /// synchronously before any I/O happens.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for DiloError {
    fn clone(&self) -> Self {
        match self {
            DiloError::Io(e) => DiloError::Io(Arc::clone(e)),
            DiloError::IncompleteData => DiloError::IncompleteData,
            DiloError::ProtocolViolation(s) => DiloError::ProtocolViolation(s.clone()),
            DiloError::ServerError(s) => DiloError::ServerError(s.clone()),
            DiloError::LockTimeout { name, seconds } => DiloError::LockTimeout {
                name: name.clone(),
                seconds: seconds.clone(),
            },
            DiloError::InvalidRequest(s) => DiloError::InvalidRequest(s.clone()),
        }
    }
}

impl PartialEq for DiloError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DiloError::Io(e1), DiloError::Io(e2)) => e1.to_string() == e2.to_string(),
            (DiloError::ProtocolViolation(s1), DiloError::ProtocolViolation(s2)) => s1 == s2,
            (DiloError::ServerError(s1), DiloError::ServerError(s2)) => s1 == s2,
            (DiloError::InvalidRequest(s1), DiloError::InvalidRequest(s2)) => s1 == s2,
            (
                DiloError::LockTimeout {
                    name: n1,
                    seconds: s1,
                },
                DiloError::LockTimeout {
                    name: n2,
                    seconds: s2,
                },
            ) => n1 == n2 && s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for DiloError {
    fn from(e: std::io::Error) -> Self {
        DiloError::Io(Arc::new(e))
    }
}

impl From<ParseIntError> for DiloError {
    fn from(_: ParseIntError) -> Self {
        DiloError::ProtocolViolation("invalid integer field".to_string())
    }
}
