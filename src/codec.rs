//! Newline-delimited JSON framing.
//!
//! Every message on the wire is exactly one JSON object followed by a single
//! `\n` byte. There is no length prefix; JSON escapes control characters, so a
//! serialized message can never contain a raw newline.
//!
//! [`JsonLineCodec`] implements Tokio's [`Decoder`] and [`Encoder`] traits so
//! it can drive a [`tokio_util::codec::Framed`] stream on both ends of a
//! connection.
//!
//! # Error Handling
//!
//! A line longer than the configured maximum is not a stream error. The
//! decoder discards the excess bytes instead of buffering them, waits for the
//! terminating newline and then yields
//! [`FramingError::MessageTooLarge`] as an *item*, so the session can answer
//! it and carry on with the next line. Transport failures and premature EOF
//! surface as [`CodecError`] stream errors.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::codec::{Decoder, Encoder};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Line terminator used by the protocol.
pub const DELIMITER: u8 = b'\n';

/// Minimum accepted message size in bytes.
///
/// Limits passed to [`JsonLineCodec::new`] are clamped to at least this value.
pub const MIN_MESSAGE_SIZE: usize = 64;

/// Maximum accepted message size in bytes (16 MiB).
///
/// Limits passed to [`JsonLineCodec::new`] are clamped to at most this value
/// to prevent unbounded memory allocation.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default message size limit (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub(crate) fn clamp_message_size(value: usize) -> usize {
    value.clamp(MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE)
}

/// Outcome of decoding one line from the stream.
///
/// `Ok` carries the line without its terminator; `Err` reports a line that
/// was dropped because it exceeded the size limit.
pub type DecodedLine = Result<Bytes, FramingError>;

/// Codec framing JSON documents as newline-terminated lines.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use wireline::{codec::JsonLineCodec, message::Response};
///
/// let mut codec = JsonLineCodec::default();
/// let mut buf = BytesMut::new();
/// codec
///     .encode(&Response::failure("nope"), &mut buf)
///     .expect("encode");
/// assert!(buf.ends_with(b"\n"));
///
/// let line = codec
///     .decode(&mut buf)
///     .expect("decode")
///     .expect("complete line")
///     .expect("within size limit");
/// let response: Response = wireline::codec::decode_message(&line).expect("parse");
/// assert_eq!(response.message(), "nope");
/// ```
#[derive(Clone, Debug)]
pub struct JsonLineCodec {
    max_message_size: usize,
    /// Offset from which to resume scanning for a newline.
    next_index: usize,
    /// Bytes dropped so far from an oversized line awaiting its newline.
    discarded: Option<usize>,
}

impl JsonLineCodec {
    /// Construct a codec rejecting lines longer than `max_message_size`.
    ///
    /// The limit is clamped to [`MIN_MESSAGE_SIZE`]..=[`MAX_MESSAGE_SIZE`].
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size: clamp_message_size(max_message_size),
            next_index: 0,
            discarded: None,
        }
    }

    /// Return the maximum line length accepted by this codec.
    #[must_use]
    pub fn max_message_size(&self) -> usize { self.max_message_size }

    fn too_large(&self, size: usize) -> DecodedLine {
        Err(FramingError::MessageTooLarge {
            size,
            max: self.max_message_size,
        })
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self { Self::new(DEFAULT_MAX_MESSAGE_SIZE) }
}

impl Decoder for JsonLineCodec {
    type Item = DecodedLine;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let start = self.next_index.min(src.len());
        let newline = src
            .get(start..)
            .and_then(|tail| tail.iter().position(|b| *b == DELIMITER))
            .map(|offset| start + offset);

        match (self.discarded, newline) {
            (Some(discarded), Some(offset)) => {
                src.advance(offset + 1);
                self.discarded = None;
                self.next_index = 0;
                Ok(Some(self.too_large(discarded + offset)))
            }
            (Some(discarded), None) => {
                let len = src.len();
                src.advance(len);
                self.discarded = Some(discarded + len);
                self.next_index = 0;
                Ok(None)
            }
            (None, Some(offset)) => {
                self.next_index = 0;
                if offset > self.max_message_size {
                    src.advance(offset + 1);
                    return Ok(Some(self.too_large(offset)));
                }
                let mut line = src.split_to(offset + 1);
                line.truncate(offset);
                Ok(Some(Ok(line.freeze())))
            }
            (None, None) => {
                if src.len() > self.max_message_size {
                    // Drop what we have; the rest of the line is skipped as it arrives.
                    self.discarded = Some(src.len());
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        let pending = src.len() + self.discarded.unwrap_or(0);
        if pending == 0 {
            return Ok(None);
        }
        tracing::debug!(bytes_received = pending, "stream ended mid-line");
        src.clear();
        self.discarded = None;
        self.next_index = 0;
        Err(EofError::MidLine {
            bytes_received: pending,
        }
        .into())
    }
}

impl<T> Encoder<T> for JsonLineCodec
where
    T: Serialize,
{
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        serde_json::to_writer((&mut *dst).writer(), &item).map_err(CodecError::Serialize)?;
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

/// Serialize `message` into a single newline-terminated frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the value cannot be represented as
/// JSON (for example, a map with non-string keys).
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    JsonLineCodec::default().encode(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Parse one line (without its terminator) into a typed message.
///
/// # Errors
///
/// Returns [`CodecError::MalformedMessage`] if `line` is not valid JSON for
/// `T`.
pub fn decode_message<T: DeserializeOwned>(line: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(line).map_err(CodecError::MalformedMessage)
}

#[cfg(test)]
mod tests;
