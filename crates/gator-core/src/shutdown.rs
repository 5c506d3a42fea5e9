use tokio::sync::watch;

/// Resolve once `true` is published on the shutdown channel.
///
/// A dropped sender can no longer request shutdown, so in that case this
/// never resolves.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Non-blocking check of the shutdown flag
pub fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}
