//! Cancellation helpers shared by the loader, merge engine and controller.

use core_async::sync::CancellationToken;
use futures::future::{self, Either};
use std::future::Future;

/// Drive `fut` until it completes or `token` fires.
///
/// Returns `None` on cancellation. A token that is already cancelled wins
/// without polling `fut`.
pub(crate) async fn until_cancelled<F>(token: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        return None;
    }

    let cancelled = token.cancelled();
    futures::pin_mut!(cancelled);
    futures::pin_mut!(fut);

    match future::select(cancelled, fut).await {
        Either::Left(_) => None,
        Either::Right((output, _)) => Some(output),
    }
}
