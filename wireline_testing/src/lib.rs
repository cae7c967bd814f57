//! Utilities for exercising a [`wireline`] server over real sockets during
//! tests.
//!
//! [`TestServer`] starts a [`Server`](wireline::server::Server) on an unused
//! localhost port and [`LineClient`] speaks the newline-delimited protocol
//! byte for byte, so tests can send malformed or oversized lines that the
//! typed [`Client`](wireline::client::Client) never produces.
//!
//! ```rust,no_run
//! use wireline_testing::{LineClient, TestResult, TestServer, echo_router};
//!
//! # async fn example() -> TestResult {
//! let server = TestServer::start(Default::default(), echo_router())?;
//! let mut client = LineClient::connect(server.addr()).await?;
//! let reply = client.request(r#"{"type":"echo","payload":{"n":1}}"#).await?;
//! assert_eq!(reply["data"]["n"], 1);
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod integration_helpers;
pub mod line_client;
pub mod logging;
pub mod metrics;

pub use integration_helpers::{TestResult, TestServer, echo_router, unused_listener};
pub use line_client::LineClient;
pub use logging::{LoggerHandle, logger};
pub use metrics::MetricsCapture;
