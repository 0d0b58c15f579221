//! Async utilities for cancellation-aware futures.
//!
//! Provides the `OrCancelExt` trait for racing futures against a tokio
//! `CancellationToken` (optionally bounded by a deadline), a cancellable
//! sleep, and `AttemptScope`, a child cancellation scope that is torn down
//! when dropped.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;

/// Error returned when a future is cancelled.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelErr {
    Cancelled,
}

/// Why a deadline-bounded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The token (or one of its ancestors) was cancelled.
    Cancelled,
    /// The deadline elapsed first.
    DeadlineElapsed(Duration),
}

impl From<CancelErr> for Interrupted {
    fn from(_: CancelErr) -> Self {
        Interrupted::Cancelled
    }
}

/// Extension trait for making futures cancellable.
///
/// Allows any future to race against a `CancellationToken`, returning
/// `Err(CancelErr::Cancelled)` if the token is cancelled before the
/// future completes.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Race this future against the cancellation token.
    ///
    /// Returns `Ok(output)` if the future completes first, or
    /// `Err(CancelErr::Cancelled)` if the token is cancelled.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr>;

    /// Race this future against the token and a deadline.
    ///
    /// Cancellation wins ties so an already-cancelled token never lets the
    /// future run to completion.
    async fn or_cancel_within(
        self,
        token: &CancellationToken,
        deadline: Duration,
    ) -> Result<Self::Output, Interrupted>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, CancelErr> {
        tokio::select! {
            _ = token.cancelled() => Err(CancelErr::Cancelled),
            res = self => Ok(res),
        }
    }

    async fn or_cancel_within(
        self,
        token: &CancellationToken,
        deadline: Duration,
    ) -> Result<Self::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupted::Cancelled),
            res = self => Ok(res),
            _ = tokio::time::sleep(deadline) => Err(Interrupted::DeadlineElapsed(deadline)),
        }
    }
}

/// Sleep for `duration` unless `token` is cancelled first.
pub async fn sleep_or_cancel(token: &CancellationToken, duration: Duration) -> Result<(), CancelErr> {
    if token.is_cancelled() {
        return Err(CancelErr::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }

    tokio::time::sleep(duration).or_cancel(token).await
}

/// A child cancellation scope for one unit of work.
///
/// The scope's token is cancelled when the parent is cancelled, when the
/// deadline passed to [`AttemptScope::run`] elapses, or when the scope is
/// dropped, so anything holding a clone of [`AttemptScope::token`] learns
/// that the work is over.
pub struct AttemptScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl AttemptScope {
    pub fn new(parent: &CancellationToken) -> Self {
        let token = parent.child_token();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run `fut` inside this scope, bounded by `deadline`.
    pub async fn run<F>(&self, fut: F, deadline: Duration) -> Result<F::Output, Interrupted>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let result = fut.or_cancel_within(&self.token, deadline).await;
        if matches!(result, Err(Interrupted::DeadlineElapsed(_))) {
            self.token.cancel();
        }
        result
    }
}
