//! Cancellation and deadline handling for lookups.
//!
//! Every network await inside an adapter or solver goes through
//! [`LookupContext::run`], so cancelling a context (or letting its deadline
//! pass) interrupts in-flight requests instead of waiting for them to finish.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Why a context stopped an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline plus cancellation signal carried through every lookup.
#[derive(Debug, Clone)]
pub struct LookupContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl LookupContext {
    /// Context without a deadline; only explicit cancellation stops it.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// Derive a context that expires after `timeout` or when `self` does,
    /// whichever comes first. Cancelling the child leaves the parent running.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the interruption reason if the context is already done.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes or the context is interrupted. The
    /// future is dropped on interruption, which aborts any request it owns.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let expiry = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = expiry => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration` unless the context is interrupted first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.run(tokio::time::sleep(duration)).await
    }
}

impl Default for LookupContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_returns_output_when_not_interrupted() {
        let ctx = LookupContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run(async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn deadline_interrupts_pending_future() {
        let ctx = LookupContext::with_timeout(Duration::from_millis(20));
        let outcome = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(outcome, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancellation_reaches_child_but_not_parent() {
        let parent = LookupContext::background();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        child.cancel();
        assert_eq!(child.check(), Err(Interrupted::Cancelled));
        assert_eq!(parent.check(), Ok(()));

        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert_eq!(
            child.run(std::future::pending::<()>()).await,
            Err(Interrupted::Cancelled)
        );
    }

    #[test]
    fn child_keeps_earlier_parent_deadline() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let parent = LookupContext::with_timeout(Duration::from_secs(1));
            let child = parent.child_with_timeout(Duration::from_secs(120));
            assert_eq!(child.deadline(), parent.deadline());
        });
    }
}
