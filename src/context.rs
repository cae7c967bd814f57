//! Cancellable execution contexts with optional deadlines.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline. The
//! server derives one per request and hands it to the handler; clients pass
//! one to [`Client::send`](crate::client::Client::send) to bound or abort a
//! round trip. Deriving a context never shortens the parent's lifetime:
//! cancelling a child leaves the parent untouched, while cancelling the parent
//! cancels every child.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Roughly 30 years, used in place of deadlines that would overflow
/// [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `timeout` from now, saturating at a far-future instant.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Reason a [`Context`] finished.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The context was cancelled explicitly.
    #[error("context cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal plus optional deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use wireline::context::{Context, ContextError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let parent = Context::background();
/// let child = parent.with_timeout(Duration::from_secs(5));
/// parent.cancel();
/// assert_eq!(child.done().await, ContextError::Cancelled);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A fresh context that is never cancelled unless [`cancel`](Self::cancel)
    /// is called and has no deadline.
    #[must_use]
    pub fn background() -> Self { Self::default() }

    /// Wrap an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child that is cancelled with `self` and keeps its deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(deadline_after(timeout))
    }

    /// Derive a child whose deadline is the earlier of `deadline` and the
    /// parent's deadline.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// The instant after which this context is done, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Time left until the deadline, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken { &self.token }

    /// Cancel this context and all contexts derived from it.
    pub fn cancel(&self) { self.token.cancel(); }

    /// Returns true once [`cancel`](Self::cancel) was called here or on an
    /// ancestor.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.token.is_cancelled() }

    /// Returns true once the context is cancelled or past its deadline.
    #[must_use]
    pub fn is_done(&self) -> bool { self.err().is_some() }

    /// Why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Cancelled)
        } else if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Wait until the context is cancelled or its deadline passes.
    ///
    /// Cancellation wins when both have happened.
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "tokio::select! expands to modulus internally"
    )]
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;

                () = self.token.cancelled() => ContextError::Cancelled,
                () = sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}
