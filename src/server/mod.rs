//! Tokio-based TCP server for newline-delimited JSON requests.
//!
//! A [`Server`] owns a [`Router`], accepts connections up to
//! [`ServerConfig::max_connections`], and runs one supervised session task per
//! connection. Each session answers requests strictly in order; there is no
//! ordering between connections.
//!
//! # Examples
//!
//! ```no_run
//! use wireline::{
//!     config::ServerConfig,
//!     context::Context,
//!     message::Payload,
//!     router::HandlerResult,
//!     server::Server,
//! };
//!
//! async fn ping(_ctx: Context, _payload: Payload) -> HandlerResult {
//!     Ok(serde_json::json!("pong"))
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), wireline::server::ServerError> {
//! let server = Server::new(ServerConfig::default().with_address("127.0.0.1:0"));
//! server.register_handler("ping", ping);
//! let addr = server.start(&Context::background()).await?;
//! println!("listening on {addr}");
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::ServerConfig,
    router::{Handler, Router},
};

mod connection;
pub mod error;
pub mod registry;
mod runtime;
mod session;

pub use error::ServerError;
pub use registry::{SessionInfo, SessionRegistry};
pub use runtime::{BackoffConfig, ShutdownOutcome};

#[cfg(test)]
pub(crate) mod test_util;

/// Lifecycle of a [`Server`]. A server runs at most once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running { local_addr: SocketAddr },
    Stopped,
}

/// TCP server dispatching newline-delimited JSON requests to a [`Router`].
#[derive(Debug)]
pub struct Server {
    config: Arc<ServerConfig>,
    router: Arc<Router>,
    backoff: BackoffConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    registry: Arc<SessionRegistry>,
    lifecycle: Mutex<Lifecycle>,
}

impl Server {
    /// Create an unstarted server with an empty router.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self { Self::with_router(config, Arc::new(Router::new())) }

    /// Create an unstarted server dispatching through `router`.
    #[must_use]
    pub fn with_router(config: ServerConfig, router: Arc<Router>) -> Self {
        Self {
            config: Arc::new(config.normalized()),
            router,
            backoff: BackoffConfig::default(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            registry: Arc::new(SessionRegistry::default()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Configure the accept-error back-off.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Register `handler` for `request_type`. Safe before or after start.
    pub fn register_handler<H: Handler>(&self, request_type: impl Into<String>, handler: H) {
        self.router.register(request_type, handler);
    }

    /// The server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// The router used for dispatch.
    #[must_use]
    pub fn router(&self) -> &Arc<Router> { &self.router }

    /// The bound address while the server is running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.lifecycle() {
            Lifecycle::Running { local_addr } => Some(local_addr),
            Lifecycle::Idle | Lifecycle::Stopped => None,
        }
    }

    /// Remote addresses of live sessions, sorted.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SocketAddr> { self.registry.peers() }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize { self.registry.len() }

    /// The live-session registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry { &self.registry }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
