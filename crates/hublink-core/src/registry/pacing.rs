//! Courtesy spacing between live requests to the Hub.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Keeps consecutive live requests at least `spacing` apart.
///
/// Only requests that were marked count; cache hits never call into the
/// pacer and so never wait.
#[derive(Debug, Clone)]
pub struct Pacer {
    spacing: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: None,
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Sleep until `spacing` has passed since the last marked request.
    pub async fn wait(&self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.spacing {
                let remaining = self.spacing - elapsed;
                trace!("Pacing next request by {:?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }
    }

    /// Record that a live request just finished.
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }
}
