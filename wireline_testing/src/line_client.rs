//! Raw line-level client for protocol tests.

use std::net::SocketAddr;

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::TestResult;

/// A TCP connection that writes arbitrary bytes and reads newline-terminated
/// replies.
#[derive(Debug)]
pub struct LineClient {
    reader: BufReader<TcpStream>,
}

impl LineClient {
    /// Connect to `addr`.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while connecting.
    pub async fn connect(addr: SocketAddr) -> TestResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            reader: BufReader::new(stream),
        })
    }

    /// Write `bytes` exactly as given.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while writing.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> TestResult {
        self.reader.get_mut().write_all(bytes).await?;
        Ok(())
    }

    /// Write `line` followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while writing.
    pub async fn send_line(&mut self, line: &str) -> TestResult {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    /// Read the next reply, or `None` once the server has closed the
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the reply is not JSON.
    pub async fn read_reply(&mut self) -> TestResult<Option<Value>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&line)?))
    }

    /// Send `line` and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server closes the
    /// connection instead of replying.
    pub async fn request(&mut self, line: &str) -> TestResult<Value> {
        self.send_line(line).await?;
        self.read_reply()
            .await?
            .ok_or_else(|| "connection closed before a reply arrived".into())
    }

    /// Send a request built from `request_type` and `payload`.
    ///
    /// # Errors
    ///
    /// As for [`request`](Self::request).
    pub async fn call(&mut self, request_type: &str, payload: Value) -> TestResult<Value> {
        let line = serde_json::json!({ "type": request_type, "payload": payload }).to_string();
        self.request(&line).await
    }
}
