//! Per-operation deadline for external store round trips.

use std::future::Future;
use std::time::Duration;

/// Deadline applied to each store call unless configured otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `op`, mapping an elapsed deadline to the error built by `timed_out`.
/// Nothing is retried.
pub(crate) async fn bounded<F, T, E>(
    limit: Duration,
    op: F,
    timed_out: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(timed_out()),
    }
}
