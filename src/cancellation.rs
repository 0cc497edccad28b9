//! Cooperative cancellation (§4.N).
//!
//! A `CancellationToken` is checked at every blocking sleep, every HTTP call,
//! every streaming chunk boundary, and every LRO poll. Cancellation is
//! idempotent: firing the source twice, or checking an already-fired token
//! twice, has no additional effect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::OperationCancelled;

/// Shared, clonable handle that long operations poll for cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise `OperationCancelled` if this token has fired.
    pub fn throw_if_cancelled(&self, context: impl Into<String>) -> Result<(), OperationCancelled> {
        if self.is_cancelled() {
            Err(OperationCancelled {
                context: Some(context.into()),
            })
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, but wake early and at most once per second to
    /// check for cancellation, so cancellation latency is bounded at ~1s
    /// (§4.M LRO polling requirement).
    pub async fn sleep_cancellable(
        &self,
        duration: std::time::Duration,
        context: &str,
    ) -> Result<(), OperationCancelled> {
        let slice = std::time::Duration::from_secs(1);
        let mut remaining = duration;
        loop {
            self.throw_if_cancelled(context)?;
            if remaining.is_zero() {
                return Ok(());
            }
            let step = remaining.min(slice);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

/// Owns the mutable cancellation flag; `fire()` is the only way to cancel.
#[derive(Debug, Clone)]
pub struct CancellationTokenSource {
    flag: Arc<AtomicBool>,
}

impl CancellationTokenSource {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken::new(self.flag.clone())
    }

    /// Fire the cancellation signal. Idempotent.
    pub fn fire(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancellationTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a SIGINT handler that fires the given source's token once, then
/// returns. Intended to be spawned once at process startup.
pub async fn install_sigint_handler(source: CancellationTokenSource) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("SIGINT received, cancelling in-flight operations");
        source.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let source = CancellationTokenSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        assert!(token.throw_if_cancelled("test").is_ok());
    }

    #[test]
    fn firing_source_cancels_all_clones() {
        let source = CancellationTokenSource::new();
        let token_a = source.token();
        let token_b = source.token();
        source.fire();
        assert!(token_a.is_cancelled());
        assert!(token_b.is_cancelled());
        assert!(token_a.throw_if_cancelled("test").is_err());
    }

    #[test]
    fn fire_is_idempotent() {
        let source = CancellationTokenSource::new();
        source.fire();
        source.fire();
        assert!(source.is_cancelled());
    }

    #[tokio::test]
    async fn sleep_cancellable_wakes_early_on_cancel() {
        let source = CancellationTokenSource::new();
        let token = source.token();

        let handle = tokio::spawn(async move { token.sleep_cancellable(Duration::from_secs(30), "lro poll").await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        source.fire();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sleep_cancellable should return promptly after cancellation")
            .unwrap();
        assert!(result.is_err());
    }
}
