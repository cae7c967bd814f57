//! Per-connection request/response loop.
//!
//! A session reads one line at a time, answers it, and only then reads the
//! next, so requests on one connection are handled strictly in order. Framing
//! and parse failures are answered and the session continues; transport
//! failures, deadline expiry and peer close end it.

use std::{net::SocketAddr, sync::Arc};

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::{
    net::TcpStream,
    time::{Instant, timeout, timeout_at},
};
use tokio_util::{codec::Framed, sync::CancellationToken};

use crate::{
    codec::{DecodedLine, JsonLineCodec, decode_message},
    config::ServerConfig,
    context::{Context, deadline_after},
    message::{INVALID_JSON_MESSAGE, Request, Response},
    metrics::{self, Direction, ErrorKind},
    router::{DispatchError, Router},
};

/// Everything a session needs besides its stream.
#[derive(Clone, Debug)]
pub(crate) struct SessionOptions {
    pub config: Arc<ServerConfig>,
    pub router: Arc<Router>,
    /// Parent of every handler context created by the session.
    pub ctx: Context,
    /// Cancelled when the server stops; idle sessions close on it.
    pub shutdown: CancellationToken,
}

/// Serve `stream` until the peer leaves, a deadline passes, a transport error
/// occurs, or the server shuts down while the session is between requests.
pub(crate) async fn run_session(stream: TcpStream, peer_addr: SocketAddr, options: SessionOptions) {
    let SessionOptions {
        config,
        router,
        ctx,
        shutdown,
    } = options;
    let mut framed = Framed::new(stream, JsonLineCodec::new(config.max_message_size));
    let mut idle_deadline = deadline_after(config.idle_timeout);
    info!("session opened: peer_addr={peer_addr}");

    loop {
        let read_deadline = deadline_after(config.read_timeout).min(idle_deadline);
        let Some(line) = read_line(&mut framed, read_deadline, &shutdown, peer_addr).await else {
            break;
        };

        let response = match line {
            Ok(line) => {
                idle_deadline = deadline_after(config.idle_timeout);
                process_line(&line, &router, &ctx, peer_addr).await
            }
            Err(err) => {
                warn!("oversized message rejected: peer_addr={peer_addr}, error={err}");
                metrics::inc_errors(ErrorKind::MessageTooLarge);
                Response::failure(err.to_string())
            }
        };

        if !write_response(&mut framed, &response, &config, peer_addr).await {
            break;
        }
    }
    info!("session closed: peer_addr={peer_addr}");
}

/// Wait for the next line. `None` means the session should close.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn read_line(
    framed: &mut Framed<TcpStream, JsonLineCodec>,
    deadline: Instant,
    shutdown: &CancellationToken,
    peer_addr: SocketAddr,
) -> Option<DecodedLine> {
    let next = tokio::select! {
        biased;

        () = shutdown.cancelled() => {
            debug!("closing idle session for shutdown: peer_addr={peer_addr}");
            return None;
        }
        next = timeout_at(deadline, framed.next()) => next,
    };

    match next {
        Err(_) => {
            info!("read deadline expired: peer_addr={peer_addr}");
            metrics::inc_errors(ErrorKind::Timeout);
            None
        }
        Ok(None) => {
            debug!("peer closed connection: peer_addr={peer_addr}");
            None
        }
        Ok(Some(Ok(line))) => {
            metrics::inc_frames(Direction::Inbound);
            Some(line)
        }
        Ok(Some(Err(err))) => {
            warn!(
                "read error: peer_addr={peer_addr}, error_type={}, error={err}",
                err.error_type()
            );
            metrics::inc_errors(if err.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Transport
            });
            None
        }
    }
}

/// Turn one complete line into the response that answers it.
async fn process_line(line: &[u8], router: &Router, ctx: &Context, peer_addr: SocketAddr) -> Response {
    let request: Request = match decode_message(line) {
        Ok(request) => request,
        Err(err) => {
            debug!("malformed request: peer_addr={peer_addr}, error={err}");
            metrics::inc_errors(ErrorKind::MalformedMessage);
            return Response::failure(INVALID_JSON_MESSAGE);
        }
    };

    let (request_type, payload) = request.into_parts();
    match router.dispatch(&request_type, payload, ctx).await {
        Ok(data) => Response::success(data),
        Err(err) => {
            let kind = match err {
                DispatchError::UnknownRequestType(_) => ErrorKind::UnknownRequestType,
                DispatchError::Handler(_) => ErrorKind::Handler,
            };
            debug!("request failed: peer_addr={peer_addr}, request_type={request_type}, error={err}");
            metrics::inc_errors(kind);
            Response::failure(err.to_string())
        }
    }
}

/// Write `response` within the write timeout. Returns false if the session
/// must close.
async fn write_response(
    framed: &mut Framed<TcpStream, JsonLineCodec>,
    response: &Response,
    config: &ServerConfig,
    peer_addr: SocketAddr,
) -> bool {
    match timeout(config.write_timeout, framed.send(response)).await {
        Ok(Ok(())) => {
            metrics::inc_frames(Direction::Outbound);
            true
        }
        Ok(Err(err)) => {
            warn!("write error: peer_addr={peer_addr}, error={err}");
            metrics::inc_errors(ErrorKind::Transport);
            false
        }
        Err(_) => {
            warn!("write deadline expired: peer_addr={peer_addr}");
            metrics::inc_errors(ErrorKind::Timeout);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use serde_json::{Value, json};
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;
    use crate::{
        message::Payload,
        router::{HandlerError, HandlerResult},
    };

    async fn echo(_ctx: Context, payload: Payload) -> HandlerResult {
        let value: Value = payload.decode()?;
        Ok(value)
    }

    #[fixture]
    fn options() -> SessionOptions {
        let router = Router::new();
        router.register("echo", echo);
        router.register("fail", |_ctx: Context, _payload: Payload| async {
            Err::<Value, HandlerError>("boom".into())
        });
        SessionOptions {
            config: Arc::new(ServerConfig::default().with_max_message_size(64)),
            router: Arc::new(router),
            ctx: Context::background(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Accept one connection and run a session on it.
    async fn serve_one(options: SessionOptions) -> (TcpStream, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.expect("accept");
            run_session(stream, peer_addr, options).await;
        });
        let client = TcpStream::connect(addr).await.expect("connect");
        (client, handle)
    }

    async fn round_trip(reader: &mut BufReader<TcpStream>, line: &[u8]) -> Value {
        reader.get_mut().write_all(line).await.expect("write");
        let mut response = String::new();
        reader.read_line(&mut response).await.expect("read");
        serde_json::from_str(&response).expect("response json")
    }

    #[rstest]
    #[tokio::test]
    async fn session_answers_in_order_and_survives_bad_input(options: SessionOptions) {
        let (client, handle) = serve_one(options).await;
        let mut reader = BufReader::new(client);

        let value = round_trip(&mut reader, b"{\"type\":\"echo\",\"payload\":[1]}\n").await;
        assert_eq!(value, json!({"status": true, "data": [1]}));

        let value = round_trip(&mut reader, b"not json\n").await;
        assert_eq!(value, json!({"status": false, "message": "invalid JSON format"}));

        let long = format!("{}\n", "x".repeat(100));
        let value = round_trip(&mut reader, long.as_bytes()).await;
        assert_eq!(
            value,
            json!({"status": false, "message": "message too large: 100 bytes exceeds limit of 64"})
        );

        let value = round_trip(&mut reader, b"{\"type\":\"nope\"}\n").await;
        assert_eq!(value, json!({"status": false, "message": "unknown request type: nope"}));

        let value = round_trip(&mut reader, b"{\"type\":\"fail\"}\n").await;
        assert_eq!(value, json!({"status": false, "message": "boom"}));

        let value = round_trip(&mut reader, b"{\"type\":\"echo\"}\n").await;
        assert_eq!(value, json!({"status": true}));

        drop(reader);
        handle.await.expect("session task");
    }

    #[rstest]
    #[tokio::test]
    async fn idle_session_closes_on_shutdown(options: SessionOptions) {
        let shutdown = options.shutdown.clone();
        let (client, handle) = serve_one(options).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("session should close promptly")
            .expect("session task");
        drop(client);
    }

    #[rstest]
    #[tokio::test]
    async fn session_closes_after_idle_timeout(mut options: SessionOptions) {
        options.config = Arc::new(
            ServerConfig::default()
                .with_idle_timeout(Duration::from_millis(50))
                .with_read_timeout(Duration::from_secs(5)),
        );
        let (client, handle) = serve_one(options).await;
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("idle deadline should close the session")
            .expect("session task");

        let mut reader = BufReader::new(client);
        let mut rest = String::new();
        let read = reader.read_line(&mut rest).await.expect("read after close");
        assert_eq!(read, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn unbounded_timeouts_do_not_overflow_deadlines(mut options: SessionOptions) {
        options.config = Arc::new(
            ServerConfig::default()
                .with_idle_timeout(Duration::MAX)
                .with_read_timeout(Duration::MAX)
                .with_write_timeout(Duration::MAX),
        );
        let (client, handle) = serve_one(options).await;
        let mut reader = BufReader::new(client);

        for _ in 0..2 {
            let value = round_trip(&mut reader, b"{\"type\":\"echo\",\"payload\":1}\n").await;
            assert_eq!(value, json!({"status": true, "data": 1}));
        }

        drop(reader);
        handle.await.expect("session task should not panic");
    }
}
