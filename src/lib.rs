#![doc(html_root_url = "https://docs.rs/wireline/latest")]
//! Public API for the `wireline` library.
//!
//! `wireline` serves request/response traffic over TCP where every message is
//! one JSON object terminated by a newline. A [`Server`] dispatches each
//! [`Request`] to the handler registered for its type on a [`Router`] and
//! answers with a [`Response`] envelope; a [`Client`] performs synchronous
//! round trips with deadlines and retries. The [`directory`] module provides
//! the in-memory school directory served by the `wireline` binary.

pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod directory;
pub mod message;
pub mod metrics;
pub mod router;
pub mod server;

pub use client::{Client, ClientError};
pub use codec::{CodecError, FramingError, JsonLineCodec};
pub use config::{ClientConfig, ServerConfig, Settings};
pub use context::{Context, ContextError};
pub use message::{Payload, Request, Response};
pub use router::{Handler, HandlerError, HandlerResult, Router};
pub use server::{Server, ServerError, ShutdownOutcome};
