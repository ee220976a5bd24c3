// Shutdown signalling for the scheduler and other background loops

use tokio::sync::watch;

/// Receiving side; cheap to clone, one per background loop
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested, or when the sender is gone
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

/// Owned by the composition root
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Additional token for another loop
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_observes_shutdown() {
        let (tx, mut first) = shutdown_channel();
        let mut second = tx.token();
        assert!(!first.is_shutdown());

        tx.shutdown();
        tokio_test::block_on(first.wait());
        tokio_test::block_on(second.wait());
        assert!(second.is_shutdown());

        // Signal is sticky
        tokio_test::block_on(first.wait());
    }

    #[test]
    fn test_dropped_sender_releases_waiters() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);
        tokio_test::block_on(token.wait());
        assert!(!token.is_shutdown());
    }
}
