//! Request routing by request-type tag.
//!
//! A [`Router`] maps request-type strings to [`Handler`]s. Sessions dispatch
//! through it concurrently and handlers may still be registered while the
//! server runs, so the table sits behind a read/write lock.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use futures::future::BoxFuture;
use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::{context::Context, message::Payload};

/// Deadline applied to every handler invocation.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type returned by handlers. Its text becomes the response message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result produced by a handler.
pub type HandlerResult = Result<Value, HandlerError>;

/// Asynchronous request handler.
///
/// Implemented for any `Fn(Context, Payload) -> impl Future<Output =
/// HandlerResult>`, so plain async functions and closures can be registered
/// directly.
///
/// # Examples
///
/// ```
/// use wireline::{
///     context::Context,
///     message::Payload,
///     router::{HandlerResult, Router},
/// };
///
/// async fn ping(_ctx: Context, _payload: Payload) -> HandlerResult {
///     Ok(serde_json::json!("pong"))
/// }
///
/// let router = Router::new();
/// router.register("ping", ping);
/// assert!(router.contains("ping"));
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn call(&self, ctx: Context, payload: Payload) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context, payload: Payload) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx, payload))
    }
}

/// Errors produced by [`Router::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered for the request type.
    #[error("unknown request type: {0}")]
    UnknownRequestType(String),
    /// The handler reported an application error.
    #[error("{0}")]
    Handler(HandlerError),
}

/// Table of handlers keyed by request type.
#[derive(Default)]
pub struct Router {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("request_types", &self.request_types())
            .finish()
    }
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `handler` for `request_type`, replacing any previous handler.
    pub fn register<H: Handler>(&self, request_type: impl Into<String>, handler: H) {
        let request_type = request_type.into();
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers
            .insert(request_type.clone(), Arc::new(handler))
            .is_some()
        {
            debug!("handler replaced: request_type={request_type}");
        }
    }

    /// Returns true if a handler is registered for `request_type`.
    #[must_use]
    pub fn contains(&self, request_type: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(request_type)
    }

    /// All registered request types, sorted.
    #[must_use]
    pub fn request_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort_unstable();
        types
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Look up the handler for `request_type` and invoke it.
    ///
    /// The handler receives a child of `ctx` with a [`HANDLER_TIMEOUT`]
    /// deadline. The child is cancelled once the handler returns. Handlers are
    /// expected to observe the context; the router does not abort them.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownRequestType`] if no handler is
    /// registered, or [`DispatchError::Handler`] with the handler's error.
    pub async fn dispatch(
        &self,
        request_type: &str,
        payload: Payload,
        ctx: &Context,
    ) -> Result<Value, DispatchError> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_type)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownRequestType(request_type.to_owned()))?;

        let handler_ctx = ctx.with_timeout(HANDLER_TIMEOUT);
        let _cancel_on_return = handler_ctx.token().clone().drop_guard();
        handler
            .call(handler_ctx, payload)
            .await
            .map_err(DispatchError::Handler)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    async fn echo(_ctx: Context, payload: Payload) -> HandlerResult {
        let value: Value = payload.decode()?;
        Ok(value)
    }

    async fn fail(_ctx: Context, _payload: Payload) -> HandlerResult {
        Err("school name is required".into())
    }

    #[fixture]
    fn router() -> Router {
        let router = Router::new();
        router.register("echo", echo);
        router.register("fail", fail);
        router
    }

    #[rstest]
    #[tokio::test]
    async fn dispatch_invokes_registered_handler(router: Router) {
        let payload = Payload::from_value(&json!({"n": 1})).expect("payload");
        let value = router
            .dispatch("echo", payload, &Context::background())
            .await
            .expect("dispatch");
        assert_eq!(value, json!({"n": 1}));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_type_is_reported(router: Router) {
        let err = router
            .dispatch("nope", Payload::none(), &Context::background())
            .await
            .expect_err("unknown type");
        assert_eq!(err.to_string(), "unknown request type: nope");
    }

    #[rstest]
    #[tokio::test]
    async fn handler_error_text_is_verbatim(router: Router) {
        let err = router
            .dispatch("fail", Payload::none(), &Context::background())
            .await
            .expect_err("handler error");
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(err.to_string(), "school name is required");
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn handler_receives_bounded_context(router: Router) {
        router.register("deadline", |ctx: Context, _payload: Payload| async move {
            let remaining = ctx.remaining().expect("handler context has a deadline");
            Ok::<_, HandlerError>(json!(remaining.as_secs()))
        });
        let value = router
            .dispatch("deadline", Payload::none(), &Context::background())
            .await
            .expect("dispatch");
        assert_eq!(value, json!(HANDLER_TIMEOUT.as_secs()));
    }

    #[tokio::test]
    async fn handler_context_is_cancelled_after_return() {
        let router = Router::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        router.register("leak", move |ctx: Context, _payload: Payload| {
            if let Some(tx) = tx.lock().expect("lock").take() {
                let _ = tx.send(ctx.clone());
            }
            async { Ok::<_, HandlerError>(Value::Null) }
        });
        router
            .dispatch("leak", Payload::none(), &Context::background())
            .await
            .expect("dispatch");
        let leaked = rx.await.expect("context sent");
        assert!(leaked.token().is_cancelled());
    }

    #[tokio::test]
    async fn register_overwrites_existing_handler() {
        let router = Router::new();
        let calls = Arc::new(AtomicUsize::new(0));
        router.register("x", fail);
        let counter = Arc::clone(&calls);
        router.register("x", move |_ctx: Context, _payload: Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, HandlerError>(json!("second")) }
        });
        let value = router
            .dispatch("x", Payload::none(), &Context::background())
            .await
            .expect("dispatch");
        assert_eq!(value, json!("second"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_dispatch_and_registration() {
        let router = Arc::new(Router::new());
        let mut tasks = Vec::new();
        for i in 0..16_u64 {
            let router = Arc::clone(&router);
            tasks.push(tokio::spawn(async move {
                let request_type = format!("type_{i}");
                router.register(
                    request_type.clone(),
                    move |_ctx: Context, _payload: Payload| async move {
                        Ok::<_, HandlerError>(json!(i))
                    },
                );
                router
                    .dispatch(&request_type, Payload::none(), &Context::background())
                    .await
                    .expect("dispatch")
            }));
        }
        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.expect("join"), json!(i));
        }
        assert_eq!(router.request_types().len(), 16);
    }
}
