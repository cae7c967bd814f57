//! Client for the newline-delimited JSON protocol.
//!
//! [`Client`] holds at most one connection. Round trips on it are serialized,
//! retried on transport failures with a fixed delay, and bounded by the
//! caller's [`Context`](crate::context::Context).

mod error;
mod runtime;
mod socket;

pub use error::{ClientError, Phase};
pub use runtime::Client;
