//! Start and shutdown control for [`Server`].

mod accept;
mod backoff;

use std::{net::SocketAddr, sync::Arc};

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use log::{debug, info, warn};
use tokio::{net::TcpListener, sync::Semaphore, time::timeout};

use super::{Lifecycle, Server, ServerError, session::SessionOptions};
use crate::context::Context;

/// Result of [`Server::shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every session finished within the shutdown timeout.
    Drained,
    /// The timeout passed with sessions still running. They keep running
    /// until they finish their current request.
    TimedOut {
        /// Sessions still live when the timeout passed.
        remaining: usize,
    },
}

impl Server {
    /// Bind the configured address and start accepting connections.
    ///
    /// Returns once the listener is bound; the accept loop runs in the
    /// background until [`shutdown`](Self::shutdown) is called or `ctx` is
    /// done. Handler contexts derive from `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound and
    /// [`ServerError::AlreadyStarted`] if the server was started before.
    pub async fn start(&self, ctx: &Context) -> Result<SocketAddr, ServerError> {
        if *self.lifecycle() != Lifecycle::Idle {
            return Err(ServerError::AlreadyStarted);
        }
        let address = self.config.address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        self.launch(listener, ctx)
    }

    /// Start accepting on an already bound standard library listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be registered with
    /// the runtime and [`ServerError::AlreadyStarted`] if the server was
    /// started before.
    pub fn start_with_listener(
        &self,
        ctx: &Context,
        listener: std::net::TcpListener,
    ) -> Result<SocketAddr, ServerError> {
        let address = listener
            .local_addr()
            .map_or_else(|_| self.config.address.clone(), |addr| addr.to_string());
        let listener = listener
            .set_nonblocking(true)
            .and_then(|()| TcpListener::from_std(listener))
            .map_err(|source| ServerError::Bind { address, source })?;
        self.launch(listener, ctx)
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    fn launch(&self, listener: TcpListener, ctx: &Context) -> Result<SocketAddr, ServerError> {
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            address: self.config.address.clone(),
            source,
        })?;
        {
            let mut lifecycle = self.lifecycle();
            if *lifecycle != Lifecycle::Idle {
                return Err(ServerError::AlreadyStarted);
            }
            *lifecycle = Lifecycle::Running { local_addr };
        }
        info!(
            "server listening: local_addr={local_addr}, max_connections={}",
            self.config.max_connections
        );

        let shutdown = self.shutdown.clone();
        let caller = ctx.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {}
                reason = caller.done() => {
                    debug!("server context finished, stopping: reason={reason}");
                    shutdown.cancel();
                }
            }
        });

        let options = AcceptLoopOptions {
            shutdown: self.shutdown.clone(),
            tracker: self.tracker.clone(),
            backoff: self.backoff,
            admission: Arc::new(Semaphore::new(self.config.max_connections)),
            registry: Arc::clone(&self.registry),
            session: SessionOptions {
                config: Arc::clone(&self.config),
                router: Arc::clone(&self.router),
                ctx: ctx.child(),
                shutdown: self.shutdown.clone(),
            },
        };
        self.tracker.spawn(accept_loop(Arc::new(listener), options));
        Ok(local_addr)
    }

    /// Stop accepting, close idle sessions and wait for the rest to finish.
    ///
    /// Sessions in the middle of a request finish writing their response
    /// before closing. Waits at most
    /// [`shutdown_timeout`](crate::config::ServerConfig::shutdown_timeout).
    /// Calling this on a server that never
    /// started, or a second time, returns [`ShutdownOutcome::Drained`]
    /// immediately.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        {
            let mut lifecycle = self.lifecycle();
            match *lifecycle {
                Lifecycle::Running { .. } => *lifecycle = Lifecycle::Stopped,
                Lifecycle::Idle | Lifecycle::Stopped => return ShutdownOutcome::Drained,
            }
        }

        info!("server shutting down: sessions={}", self.registry.len());
        self.shutdown.cancel();
        self.tracker.close();
        match timeout(self.config.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("server stopped");
                ShutdownOutcome::Drained
            }
            Err(_) => {
                let remaining = self.registry.len();
                warn!(
                    "shutdown timed out: remaining={remaining}, timeout={:?}",
                    self.config.shutdown_timeout
                );
                ShutdownOutcome::TimedOut { remaining }
            }
        }
    }
}
