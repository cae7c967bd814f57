//! Errors raised by [`Server`](super::Server) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// [`Server::start`](super::Server::start) was called on a server that is
    /// running or has been shut down.
    #[error("server already started")]
    AlreadyStarted,
}
