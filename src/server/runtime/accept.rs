//! Accept loop with admission control.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::Semaphore,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    metrics,
    server::{connection::spawn_session_task, registry::SessionRegistry, session::SessionOptions},
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
    /// One permit per allowed concurrent session.
    pub admission: Arc<Semaphore>,
    pub registry: Arc<SessionRegistry>,
    pub session: SessionOptions,
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each accepted stream takes an admission permit; when none is free the
/// stream is dropped at once so the peer sees the connection closed. Accept
/// failures back off exponentially per `backoff`. The listener is dropped when
/// the loop returns, which stops the operating system from queueing further
/// connections.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + 'static,
{
    let backoff = options.backoff.normalized();
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(listener.as_ref(), &options, &backoff, delay).await
    {
        delay = next_delay;
    }
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration<L: AcceptListener>(
    listener: &L,
    options: &AcceptLoopOptions,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration> {
    let accepted = select! {
        biased;

        () = options.shutdown.cancelled() => return None,
        res = listener.accept() => res,
    };

    match accepted {
        Ok((stream, peer_addr)) => {
            admit(stream, peer_addr, options);
            Some(backoff.initial_delay)
        }
        Err(e) => {
            let local_addr = listener.local_addr().ok();
            warn!("accept error: error={e:?}, local_addr={local_addr:?}");
            metrics::inc_errors(metrics::ErrorKind::Transport);
            select! {
                biased;

                () = options.shutdown.cancelled() => None,
                () = sleep(delay) => Some(backoff.next_delay(delay)),
            }
        }
    }
}

fn admit(stream: TcpStream, peer_addr: SocketAddr, options: &AcceptLoopOptions) {
    match Arc::clone(&options.admission).try_acquire_owned() {
        Ok(permit) => spawn_session_task(
            stream,
            peer_addr,
            permit,
            &options.registry,
            options.session.clone(),
            &options.tracker,
        ),
        Err(_) => {
            warn!("connection limit reached, refusing connection: peer_addr={peer_addr}");
            metrics::inc_rejected_connections();
            drop(stream);
        }
    }
}
