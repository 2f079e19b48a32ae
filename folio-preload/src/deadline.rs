//! Deadline guard for speculative async work.

use std::future::Future;
use std::time::Duration;

use folio_core::PreloadError;

/// Race `operation` against a timer of `deadline`.
///
/// The operation runs as its own task and is never cancelled: when the
/// deadline wins, the task is detached and its eventual output is discarded.
/// Any shared state it mutates after the deadline still lands.
///
/// # Errors
///
/// - [`PreloadError::Timeout`] if the deadline elapses first
/// - [`PreloadError::TaskFailed`] if the operation panicked
pub async fn with_deadline<F>(operation: F, deadline: Duration) -> Result<F::Output, PreloadError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = tokio::spawn(operation);

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_error)) => Err(PreloadError::TaskFailed {
            reason: join_error.to_string(),
        }),
        Err(_) => Err(PreloadError::Timeout { after: deadline }),
    }
}
