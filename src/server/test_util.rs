//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;

use super::{Server, session::SessionOptions};
use crate::{
    config::ServerConfig,
    context::Context,
    message::Payload,
    router::{HandlerResult, Router},
};

async fn echo(_ctx: Context, payload: Payload) -> HandlerResult {
    let value: Value = payload.decode()?;
    Ok(value)
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents races where another process claims the
/// port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

#[fixture]
/// A router with an `echo` handler returning its payload.
pub fn echo_router() -> Arc<Router> {
    let router = Router::new();
    router.register("echo", echo);
    Arc::new(router)
}

/// Session options over `router` with default configuration.
pub fn session_options(router: Arc<Router>) -> SessionOptions {
    SessionOptions {
        config: Arc::new(ServerConfig::default()),
        router,
        ctx: Context::background(),
        shutdown: CancellationToken::new(),
    }
}

/// Start a server with `config` on `listener`, routing through `router`.
pub fn start_server(config: ServerConfig, router: Arc<Router>, listener: StdTcpListener) -> Server {
    let server = Server::with_router(config, router);
    server
        .start_with_listener(&Context::background(), listener)
        .expect("start server");
    server
}

/// Send one raw line and parse the reply as JSON.
pub async fn request_line(reader: &mut BufReader<TcpStream>, line: &str) -> Value {
    reader
        .get_mut()
        .write_all(format!("{line}\n").as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    reader.read_line(&mut response).await.expect("read response");
    serde_json::from_str(&response).expect("response is JSON")
}
