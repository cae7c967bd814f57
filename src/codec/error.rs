//! Error types for the codec layer.
//!
//! This module separates framing errors (a line that cannot be accepted as a
//! message) from protocol errors (a line that is not valid JSON), I/O errors,
//! and EOF conditions.
//!
//! # Error Categories
//!
//! - [`FramingError`]: the line exceeded the configured maximum size. Framing recovers at the next
//!   newline, so the connection stays usable.
//! - [`EofError`]: end-of-stream conditions distinguishing a clean close from a peer that hung up
//!   in the middle of a line.
//! - [`CodecError`]: top-level enum wrapping all categories plus I/O and JSON errors.

use std::io;

use thiserror::Error;

/// Framing-level errors raised while splitting the byte stream into lines.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The line exceeded the configured maximum message size.
    #[error("message too large: {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Length of the offending line, excluding the newline terminator.
        size: usize,
        /// Maximum permitted line length.
        max: usize,
    },
}

/// EOF handling variants distinguishing normal vs. premature closure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the connection at a message boundary.
    #[error("connection closed cleanly at message boundary")]
    CleanClose,

    /// The peer closed the connection before terminating the current line.
    #[error("premature EOF: {bytes_received} bytes received without a newline")]
    MidLine {
        /// Bytes buffered (or discarded) for the unterminated line.
        bytes_received: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use wireline::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::MessageTooLarge {
///     size: 2000,
///     max: 1024,
/// });
/// assert!(!err.should_disconnect());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// The line was not a valid JSON document for the expected message type.
    #[error("malformed message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    /// An outbound message could not be serialized.
    #[error("failed to serialize message: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns true if this error represents a clean connection close.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns true if the error was caused by an expired I/O deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == io::ErrorKind::TimedOut)
    }

    /// Returns true if the connection cannot be used after this error.
    ///
    /// Oversized and malformed messages are answered and the session carries
    /// on; transport failures and premature EOF end it.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        match self {
            Self::Framing(_) | Self::MalformedMessage(_) | Self::Serialize(_) => false,
            Self::Io(_) | Self::Eof(_) => true,
        }
    }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of: `"framing"`, `"protocol"`, `"serialize"`, `"io"`, or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::MalformedMessage(_) => "protocol",
            Self::Serialize(_) => "serialize",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(inner) => inner,
            CodecError::Eof(_) => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
