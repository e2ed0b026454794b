use std::future::Future;

use fac_schemas::FinanceResult;

/// Run `attempt`; on `Conflict` run it exactly once more.
///
/// Each attempt must re-read authoritative state, so the second run
/// re-validates against whatever the competing writer committed.
pub(crate) async fn retry_once_on_conflict<T, F, Fut>(op: &'static str, mut attempt: F) -> FinanceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FinanceResult<T>>,
{
    match attempt().await {
        Err(err) if err.is_conflict() => {
            tracing::warn!(op, "commit conflict, re-validating: {err}");
            let second = attempt().await;
            if let Err(err) = &second {
                if err.is_conflict() {
                    tracing::warn!(op, "conflict persisted after retry: {err}");
                }
            }
            second
        }
        other => other,
    }
}
