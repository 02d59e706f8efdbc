//! Process-wide shutdown shared by the poll loops.

use tokio::sync::watch;

/// Creates the shutdown channel. Receivers observe `true` once shutdown is requested.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once shutdown is requested or the sender is gone.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|requested| *requested).await;
}

/// Listens for ctrl-c once and broadcasts it to every receiver.
pub fn spawn_ctrl_c_listener(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(error) => {
                tracing::warn!("failed to listen for ctrl-c: {error}");
                shutdown_tx.closed().await;
                return;
            }
        }
        let _ = shutdown_tx.send(true);
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{shutdown_channel, shutdown_requested};

    #[tokio::test]
    async fn unit_shutdown_requested_waits_for_the_flag() {
        let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
        let pending =
            tokio::time::timeout(Duration::from_millis(20), shutdown_requested(&mut shutdown_rx))
                .await;
        assert!(pending.is_err());

        shutdown_tx.send(true).expect("send");
        tokio::time::timeout(Duration::from_secs(1), shutdown_requested(&mut shutdown_rx))
            .await
            .expect("shutdown observed");
        // A late subscriber still sees the request.
        let mut late = shutdown_tx.subscribe();
        tokio::time::timeout(Duration::from_secs(1), shutdown_requested(&mut late))
            .await
            .expect("late receiver observes shutdown");
    }

    #[tokio::test]
    async fn regression_dropped_sender_releases_waiters() {
        let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(1), shutdown_requested(&mut shutdown_rx))
            .await
            .expect("closed channel ends the wait");
    }
}
