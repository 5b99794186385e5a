//! Per-operation cancellation and deadline.
//!
//! Every REST call and every retry sleep runs through an [`OperationContext`],
//! so a host cancel or an expired deadline unwinds the operation at the next
//! suspension point.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Default deadline for resource operations when the host supplies none.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Per-operation deadlines applied when the host passes none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    /// Deadline for create.
    pub create: Duration,
    /// Deadline for read.
    pub read: Duration,
    /// Deadline for update.
    pub update: Duration,
    /// Deadline for delete.
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_OPERATION_TIMEOUT,
            read: DEFAULT_OPERATION_TIMEOUT,
            update: DEFAULT_OPERATION_TIMEOUT,
            delete: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

/// Cancellation token and optional deadline of one host operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by the host's token.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Expire the context after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Apply `timeout` only when no deadline is set yet.
    pub fn or_timeout(self, timeout: Duration) -> Self {
        if self.deadline.is_some() {
            self
        } else {
            self.with_timeout(timeout)
        }
    }

    /// The token cancelling this operation.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the operation is already cancelled or expired.
    pub fn check(&self, what: &str) -> Result<(), ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled(what.to_string()));
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(ProviderError::DeadlineExceeded(what.to_string()));
        }
        Ok(())
    }

    /// Run `fut` until it finishes, the token fires, or the deadline passes.
    pub async fn run<F, T>(&self, what: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        self.check(what)?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled(what.to_string())),
            _ = deadline => Err(ProviderError::DeadlineExceeded(what.to_string())),
            result = fut => result,
        }
    }

    /// Sleep for `duration` unless cancelled or expired first.
    pub async fn sleep(&self, duration: Duration, what: &str) -> Result<(), ProviderError> {
        self.run(what, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
