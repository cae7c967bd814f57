//! Error types for client operations.

use std::{fmt, io};

use thiserror::Error;

use crate::{codec::FramingError, context::ContextError};

/// Step of a round trip during which a timeout expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Establishing the TCP connection.
    Connect,
    /// Writing the request.
    Write,
    /// Waiting for the response.
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Write => "write",
            Self::Read => "read",
        })
    }
}

/// Errors emitted by [`Client`](super::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The address could not be resolved or dialled.
    #[error("failed to connect to {address}: {source}")]
    ConnectFailed {
        /// Address that was dialled.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// [`connect`](super::Client::connect) was called while connected.
    #[error("client already connected")]
    AlreadyConnected,
    /// The client has not connected or was closed.
    #[error("client not connected")]
    NotConnected,
    /// A connect, write or read deadline expired.
    #[error("{0} timed out")]
    Timeout(Phase),
    /// Transport error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The server closed the connection before a response arrived.
    #[error("connection closed by server")]
    Disconnected,
    /// The response line exceeded the client's size limit.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// The response line was not a valid response object.
    #[error("malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
    /// The request could not be serialized.
    #[error("failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The server answered with `status: false`.
    #[error("request failed: {0}")]
    Remote(String),
    /// The response data did not match the requested type.
    #[error("unexpected response data: {0}")]
    UnexpectedData(#[source] serde_json::Error),
    /// The caller's context was cancelled.
    #[error("request cancelled")]
    Cancelled,
    /// The caller's context deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl ClientError {
    /// Returns true if a failed attempt may be retried on a fresh connection.
    ///
    /// Transport failures, timeouts in any phase and malformed responses are
    /// retryable. Cancellation, local misuse and application failures are
    /// not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_)
            | Self::Io(_)
            | Self::Disconnected
            | Self::Framing(_)
            | Self::MalformedResponse(_)
            | Self::ConnectFailed { .. } => true,
            Self::AlreadyConnected
            | Self::NotConnected
            | Self::Serialize(_)
            | Self::Remote(_)
            | Self::UnexpectedData(_)
            | Self::Cancelled
            | Self::DeadlineExceeded => false,
        }
    }
}

impl From<ContextError> for ClientError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}
