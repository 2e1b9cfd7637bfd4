//! Probe rate limiting.
//!
//! A gate of width one serializes probes. A caller that arrives before the
//! minimum interval has elapsed since the previous probe sleeps out the rest
//! of the interval while holding the gate, then probes.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::application::ports::GatewayProbe;
use crate::infrastructure::metrics;

/// Serializes probes and spaces them at least `interval` apart.
#[derive(Debug)]
pub struct HealthCheckGate {
    interval: Duration,
    last_probe: Mutex<Option<Instant>>,
}

impl HealthCheckGate {
    /// Create a gate with the given minimum inter-probe interval.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_probe: Mutex::new(None),
        }
    }

    /// Minimum spacing between probes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one probe under the gate.
    pub async fn probe<P: GatewayProbe + ?Sized>(&self, probe: &P) -> bool {
        let mut last_probe = self.last_probe.lock().await;

        if let Some(last) = *last_probe {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Waiting for probe interval");
                metrics::record_probe_wait(wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last_probe = Some(Instant::now());
        let healthy = probe.probe().await;
        metrics::record_probe(healthy);
        healthy
    }
}
