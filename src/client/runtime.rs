//! Client runtime: connection state, round trips and retries.

use std::{future::Future, time::Duration};

use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, value::RawValue};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{Mutex, MutexGuard},
    time::{sleep, timeout, timeout_at},
};
use tokio_util::codec::Framed;

use super::{ClientError, Phase, socket};
use crate::{
    codec::{CodecError, JsonLineCodec, MAX_MESSAGE_SIZE},
    config::ClientConfig,
    context::{Context, deadline_after},
    message::{Payload, Request, Response},
    metrics,
};

type Connection = Framed<TcpStream, JsonLineCodec>;

#[derive(Debug)]
enum State {
    /// Never connected, or closed.
    Disconnected,
    Connected(Connection),
    /// The last attempt failed mid-exchange; the next attempt redials.
    Broken,
}

/// Client for the newline-delimited JSON protocol.
///
/// Round trips are serialized: concurrent [`send`](Self::send) calls on one
/// client queue behind each other, so responses always pair with the request
/// that produced them.
///
/// # Examples
///
/// ```no_run
/// use wireline::{client::Client, config::ClientConfig, context::Context, message::Payload};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), wireline::client::ClientError> {
/// let client = Client::new(ClientConfig::default().with_address("127.0.0.1:8080"));
/// client.connect().await?;
/// let response = client
///     .send(&Context::background(), "list_schools", Payload::none())
///     .await?;
/// assert!(response.status());
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    state: Mutex<State>,
}

impl Client {
    /// Create a disconnected client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Disconnected),
        }
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.config }

    /// Dial the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadyConnected`] if a healthy connection
    /// exists, [`ClientError::ConnectFailed`] if the address cannot be
    /// resolved or dialled, and [`ClientError::Timeout`] if dialling exceeds
    /// the connect timeout.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Connected(_)) {
            return Err(ClientError::AlreadyConnected);
        }
        *state = State::Connected(self.dial().await?);
        Ok(())
    }

    /// Returns true while the client holds a healthy connection.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, State::Connected(_))
    }

    /// Close the connection. Closing an unconnected client is a no-op.
    ///
    /// # Errors
    ///
    /// Does not currently fail. Errors from shutting down the socket are
    /// logged and ignored.
    pub async fn close(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if let State::Connected(connection) = std::mem::replace(&mut *state, State::Disconnected) {
            let mut stream = connection.into_inner();
            if let Err(e) = stream.shutdown().await {
                debug!("error shutting down client stream: error={e}");
            }
            debug!("client closed: address={}", self.config.address);
        }
        Ok(())
    }

    /// Send one request and wait for its response.
    ///
    /// The request is serialized once and sent up to `max_retries + 1`
    /// times. Each attempt is bounded by `ctx`'s deadline when it has one,
    /// otherwise by the configured write and read timeouts. After a failed
    /// attempt the connection is discarded and the next attempt redials.
    /// Cancelling `ctx`, or reaching its deadline, ends the call at once and
    /// is never retried.
    ///
    /// A response with `status: false` is a successful round trip and is
    /// returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the client is not connected,
    /// [`ClientError::Cancelled`] or [`ClientError::DeadlineExceeded`] when
    /// `ctx` ends, and otherwise the error from the last attempt.
    pub async fn send(
        &self,
        ctx: &Context,
        request_type: &str,
        payload: Payload,
    ) -> Result<Response, ClientError> {
        let request = serde_json::value::to_raw_value(&Request::new(request_type, payload))
            .map_err(ClientError::Serialize)?;
        let mut state = self.lock_state(ctx).await?;
        if matches!(*state, State::Disconnected) {
            return Err(ClientError::NotConnected);
        }

        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            let err = match self.attempt(ctx, &mut *state, &request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(
                    "request failed: request_type={request_type}, attempts={attempt}, error={err}"
                );
                return Err(err);
            }
            warn!(
                "request attempt failed, retrying: request_type={request_type}, \
                 attempt={attempt}, max_attempts={max_attempts}, error={err}"
            );
            metrics::inc_client_retries();
            pause(ctx, self.config.retry_delay).await?;
            attempt += 1;
        }
    }

    /// Send a request with a serializable payload and decode the response
    /// data into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus
    /// [`ClientError::Serialize`] for an unserializable payload,
    /// [`ClientError::Remote`] when the server answers `status: false`, and
    /// [`ClientError::UnexpectedData`] when the data does not decode as `T`.
    pub async fn send_typed<P, T>(
        &self,
        ctx: &Context,
        request_type: &str,
        payload: &P,
    ) -> Result<T, ClientError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = Payload::from_value(payload).map_err(ClientError::Serialize)?;
        let response = self.send(ctx, request_type, payload).await?;
        if !response.status() {
            return Err(ClientError::Remote(response.message().to_owned()));
        }
        serde_json::from_value(response.into_data().unwrap_or(Value::Null))
            .map_err(ClientError::UnexpectedData)
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    async fn lock_state(&self, ctx: &Context) -> Result<MutexGuard<'_, State>, ClientError> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }
        tokio::select! {
            biased;

            reason = ctx.done() => Err(reason.into()),
            guard = self.state.lock() => Ok(guard),
        }
    }

    async fn dial(&self) -> Result<Connection, ClientError> {
        let address = &self.config.address;
        let stream = match timeout(self.config.connect_timeout, socket::dial(&self.config)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ClientError::ConnectFailed {
                    address: address.clone(),
                    source,
                });
            }
            Err(_) => return Err(ClientError::Timeout(Phase::Connect)),
        };
        debug!(
            "client connected: address={address}, local_addr={:?}",
            stream.local_addr().ok()
        );
        Ok(Framed::new(stream, JsonLineCodec::new(MAX_MESSAGE_SIZE)))
    }

    async fn attempt(
        &self,
        ctx: &Context,
        state: &mut State,
        request: &RawValue,
    ) -> Result<Response, ClientError> {
        if matches!(state, State::Broken) {
            let connection = bounded(ctx, self.config.connect_timeout, Phase::Connect, self.dial())
                .await?;
            *state = State::Connected(connection);
        }
        let State::Connected(connection) = state else {
            return Err(ClientError::NotConnected);
        };

        let result = exchange(ctx, connection, request, &self.config).await;
        if result.is_err() {
            *state = State::Broken;
        }
        result
    }
}

/// Write `request` and read one response on `connection`.
async fn exchange(
    ctx: &Context,
    connection: &mut Connection,
    request: &RawValue,
    config: &ClientConfig,
) -> Result<Response, ClientError> {
    bounded(ctx, config.write_timeout, Phase::Write, async {
        connection
            .send(request)
            .await
            .map_err(|e| ClientError::Io(e.into()))
    })
    .await?;
    metrics::inc_frames(metrics::Direction::Outbound);

    let line = bounded(ctx, config.read_timeout, Phase::Read, async {
        match connection.next().await {
            None => Err(ClientError::Disconnected),
            Some(Err(CodecError::Eof(_))) => Err(ClientError::Disconnected),
            Some(Err(e)) => Err(ClientError::Io(e.into())),
            Some(Ok(line)) => line.map_err(ClientError::Framing),
        }
    })
    .await?;
    metrics::inc_frames(metrics::Direction::Inbound);

    serde_json::from_slice(&line).map_err(ClientError::MalformedResponse)
}

/// Run `fut` until it completes, `ctx` is cancelled, or the deadline passes.
///
/// The deadline is `ctx`'s own when it has one and `fallback` from now
/// otherwise. Expiry of `ctx`'s deadline reports
/// [`ClientError::DeadlineExceeded`]; expiry of the fallback reports
/// [`ClientError::Timeout`] for `phase`.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn bounded<F, T>(
    ctx: &Context,
    fallback: Duration,
    phase: Phase,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let (deadline, expiry) = match ctx.deadline() {
        Some(deadline) => (deadline, ClientError::DeadlineExceeded),
        None => (deadline_after(fallback), ClientError::Timeout(phase)),
    };
    tokio::select! {
        biased;

        () = ctx.token().cancelled() => Err(ClientError::Cancelled),
        res = timeout_at(deadline, fut) => res.unwrap_or(Err(expiry)),
    }
}

/// Wait `delay` between attempts unless `ctx` finishes first.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn pause(ctx: &Context, delay: Duration) -> Result<(), ClientError> {
    tokio::select! {
        biased;

        reason = ctx.done() => Err(reason.into()),
        () = sleep(delay) => Ok(()),
    }
}
