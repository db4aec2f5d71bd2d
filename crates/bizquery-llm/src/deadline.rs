//! Per-request time budget and cancellation.
//!
//! A [`Deadline`] combines an optional expiry instant with a
//! [`CancellationToken`]. Every wait on the request path (HTTP attempts,
//! retry sleeps, query execution) races against it so no stage can outlive
//! the request that started it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded wait stopped early.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    Expired,
    #[error("cancelled")]
    Cancelled,
}

/// An optional expiry plus a cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    cancel: CancellationToken,
}

impl Deadline {
    /// No expiry; only cancellation can stop it.
    pub fn none() -> Self {
        Self::default()
    }

    /// Expires `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token (e.g. one tied to a client connection).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails if the deadline has passed or the token was cancelled.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.at {
            Some(at) if Instant::now() >= at => Err(Interrupted::Expired),
            _ => Ok(()),
        }
    }

    /// Resolves once the deadline passes or the token is cancelled.
    pub async fn interrupted(&self) -> Interrupted {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Interrupted::Cancelled,
            _ = expiry(self.at) => Interrupted::Expired,
        }
    }

    /// Drive `fut` to completion unless the deadline or cancellation wins.
    ///
    /// The future is dropped when interrupted.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.interrupted() => Err(reason),
            out = fut => Ok(out),
        }
    }
}

async fn expiry(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
