//! Shared helpers for integration testing `wireline` servers.
//!
//! Provides a router fixture with an `echo` handler, a helper to bind an
//! unused local port, and [`TestServer`], which keeps a started server
//! together with the address it listens on.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;
use serde_json::Value;
use wireline::{
    config::ServerConfig,
    context::Context,
    message::Payload,
    router::{HandlerResult, Router},
    server::{Server, ShutdownOutcome},
};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr)
}

async fn echo(_ctx: Context, payload: Payload) -> HandlerResult {
    let value: Value = payload.decode()?;
    Ok(value)
}

/// A router whose `echo` handler answers with the request payload.
#[fixture]
pub fn echo_router() -> Arc<Router> {
    let router = Router::new();
    router.register("echo", echo);
    Arc::new(router)
}

/// A running [`Server`] bound to an unused localhost port.
#[derive(Debug)]
pub struct TestServer {
    server: Server,
    addr: SocketAddr,
}

impl TestServer {
    /// Start a server with `config` routing through `router`.
    ///
    /// The configured address is ignored in favour of an unused port. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if no port can be bound or the server fails to start.
    pub fn start(config: ServerConfig, router: Arc<Router>) -> TestResult<Self> {
        Self::start_with_context(config, router, &Context::background())
    }

    /// Start a server whose lifetime is also bounded by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if no port can be bound or the server fails to start.
    pub fn start_with_context(
        config: ServerConfig,
        router: Arc<Router>,
        ctx: &Context,
    ) -> TestResult<Self> {
        let server = Server::with_router(config, router);
        let addr = server.start_with_listener(ctx, unused_listener()?)?;
        Ok(Self { server, addr })
    }

    /// Address the server accepts on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// The underlying server.
    #[must_use]
    pub fn server(&self) -> &Server { &self.server }

    /// Shut the server down and report how the drain ended.
    pub async fn shutdown(&self) -> ShutdownOutcome { self.server.shutdown().await }
}
