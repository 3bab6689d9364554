use std::future::Future;

use futures::future::{Either, select};
use tokio_util::sync::CancellationToken;

use crate::foundation::error::{FxError, FxResult};

/// Run `fut` unless `signal` fires first.
///
/// An already-cancelled token fails immediately without polling `fut`. When the token fires while
/// `fut` is pending, `fut` is dropped, which aborts whatever load it was driving.
pub(crate) async fn guard<T, F>(signal: Option<&CancellationToken>, what: &str, fut: F) -> FxResult<T>
where
    F: Future<Output = FxResult<T>>,
{
    let Some(token) = signal else {
        return fut.await;
    };
    if token.is_cancelled() {
        return Err(FxError::cancelled(format!("{what} aborted before start")));
    }

    let fut = std::pin::pin!(fut);
    let cancelled = std::pin::pin!(token.cancelled());
    match select(fut, cancelled).await {
        Either::Left((res, _)) => res,
        Either::Right(((), _)) => Err(FxError::cancelled(format!("{what} aborted"))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/cancel.rs"]
mod tests;
