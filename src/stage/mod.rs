//! Stage adapters.
//!
//! One adapter per pipeline stage, each wrapping one external capability
//! behind the same contract: read the task, produce the fields for the
//! stage it completes, classify failures. Adapters are stateless between
//! invocations; everything needed to resume lives on the task.

mod download;
mod render;
mod rewrite;
mod synthesize;
mod transcribe;

pub use download::DownloadAdapter;
pub use render::RenderAdapter;
pub use rewrite::RewriteAdapter;
pub use synthesize::SynthesizeAdapter;
pub use transcribe::TranscribeAdapter;

use crate::config::RetrySettings;
use crate::error::Result;
use crate::task::{Stage, StageOutput, Task};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Uniform contract for one pipeline stage.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    /// The stage this adapter completes on success.
    fn stage(&self) -> Stage;

    /// Durable preparation, run before [`StageAdapter::run`].
    ///
    /// Fields returned here are merged into the task and saved without
    /// advancing the stage, so progress that must survive a crash (a
    /// submitted remote task id, say) is on disk before the long-running
    /// part of the stage starts. Most stages have nothing to prepare.
    async fn prepare(&self, _task: &Task) -> Result<StageOutput> {
        Ok(StageOutput::default())
    }

    /// Run the stage against a read-only view of the task.
    ///
    /// On success the returned output holds only the fields belonging to
    /// [`StageAdapter::stage`]; the controller merges them and saves.
    async fn run(&self, task: &Task) -> Result<StageOutput>;
}

/// Run an operation, retrying transient failures with exponential backoff.
///
/// This implements the adapter-internal retry policy; non-transient
/// errors and exhausted attempts surface to the controller, which never
/// retries on its own.
pub async fn retry_transient<T, F, Fut>(retry: &RetrySettings, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = Duration::from_millis(retry.initial_backoff_ms);
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_attempts.max(1) => {
                warn!(
                    "Transient failure (attempt {}/{}), retrying in {:?}: {}",
                    attempt, retry.max_attempts, backoff, e
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecastError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry(max_attempts: u32) -> RetrySettings {
        RetrySettings {
            max_attempts,
            initial_backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&fast_retry(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RecastError::Transient("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient(&fast_retry(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RecastError::Transient("still flaky".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_invalid_input() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient(&fast_retry(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RecastError::InvalidInput("bad source".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
