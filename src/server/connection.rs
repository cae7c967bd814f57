//! Spawning of supervised session tasks.

use std::{any::Any, net::SocketAddr, sync::Arc};

use futures::FutureExt;
use log::error;
use tokio::{net::TcpStream, sync::OwnedSemaphorePermit};
use tokio_util::task::TaskTracker;

use super::{
    registry::SessionRegistry,
    session::{SessionOptions, run_session},
};

/// Spawn a tracked task serving `stream`, logging and discarding any panic.
///
/// The admission `permit` and the registry entry are held for the lifetime of
/// the task and released even if the session panics.
pub(super) fn spawn_session_task(
    stream: TcpStream,
    peer_addr: SocketAddr,
    permit: OwnedSemaphorePermit,
    registry: &Arc<SessionRegistry>,
    options: SessionOptions,
    tracker: &TaskTracker,
) {
    let guard = registry.register(peer_addr);
    tracker.spawn(async move {
        let _permit = permit;
        let _guard = guard;
        let session = std::panic::AssertUnwindSafe(run_session(stream, peer_addr, options));
        if let Err(panic) = session.catch_unwind().await {
            let panic_msg = panic_message(panic.as_ref());
            error!("session task panicked: panic={panic_msg}, peer_addr={peer_addr}");
            tracing::error!(panic = %panic_msg, %peer_addr, "session task panicked");
        }
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        format!("{payload:?}")
    }
}
