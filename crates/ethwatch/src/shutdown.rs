//! Process-wide cancellation signal.

use tokio::sync::watch;

/// Resolve once the shutdown flag is set or its sender is gone.
pub(crate) async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Non-blocking check of the shutdown flag.
pub(crate) fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}
