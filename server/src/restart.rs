use std::time::Duration;

use ota::Restart;
use tokio_util::sync::CancellationToken;

/// Restarts the host by cancelling its shutdown token once the delay has
/// passed.
#[derive(Debug, Clone)]
pub struct TokioRestart {
    shutdown: CancellationToken,
}

impl TokioRestart {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

impl Restart for TokioRestart {
    fn schedule(&mut self, delay: Duration) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("restarting");
            shutdown.cancel();
        });
    }
}
