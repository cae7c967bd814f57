//! Metric helpers for `wireline`.
//!
//! This module defines metric names and thin helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live sessions.
pub const CONNECTIONS_ACTIVE: &str = "wireline_connections_active";
/// Name of the counter tracking connections refused by admission control.
pub const CONNECTIONS_REJECTED: &str = "wireline_connections_rejected_total";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "wireline_frames_processed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "wireline_errors_total";
/// Name of the counter tracking client retry attempts.
pub const CLIENT_RETRIES: &str = "wireline_client_retries_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Inbound frames received from a peer.
    Inbound,
    /// Outbound frames sent to a peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Category label attached to [`ERRORS_TOTAL`].
#[derive(Clone, Copy, Debug)]
pub enum ErrorKind {
    /// A line exceeded the message size limit.
    MessageTooLarge,
    /// A line was not valid request JSON.
    MalformedMessage,
    /// No handler was registered for the request type.
    UnknownRequestType,
    /// A handler returned an error.
    Handler,
    /// A read or write deadline expired.
    Timeout,
    /// The transport failed.
    Transport,
}

impl ErrorKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MessageTooLarge => "message_too_large",
            ErrorKind::MalformedMessage => "malformed_message",
            ErrorKind::UnknownRequestType => "unknown_request_type",
            ErrorKind::Handler => "handler",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a connection refused because the admission pool was empty.
pub fn inc_rejected_connections() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_REJECTED).increment(1);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error occurrence.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a client retry.
pub fn inc_client_retries() {
    #[cfg(feature = "metrics")]
    counter!(CLIENT_RETRIES).increment(1);
}
