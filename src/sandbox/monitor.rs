//! Periodic runtime sampling of a running container

use crate::client::{ClientError, RuntimeClient};
use crate::sandbox::violation::SecurityViolation;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a monitor task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The runtime drifted
    Violation(SecurityViolation),
    /// The monitor was stopped before any drift was seen
    Cancelled,
    /// Sampling failed
    TransportError(ClientError),
}

/// Watches one container's effective runtime
pub struct RuntimeMonitor<C> {
    client: Arc<C>,
    container_id: String,
    required_runtime: String,
    interval: Duration,
}

impl<C: RuntimeClient> RuntimeMonitor<C> {
    /// Monitor `container_id`, which must stay on `required_runtime`
    pub fn new(
        client: Arc<C>,
        container_id: impl Into<String>,
        required_runtime: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            container_id: container_id.into(),
            required_runtime: required_runtime.into(),
            interval,
        }
    }

    /// Run [`watch`](Self::watch) as its own task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<MonitorOutcome> {
        tokio::spawn(self.watch(cancel))
    }

    /// Sample every interval until drift, a failed sample, or cancellation.
    ///
    /// The first sample is taken one interval after the call.
    pub async fn watch(self, cancel: CancellationToken) -> MonitorOutcome {
        debug!(
            "Monitoring container {} every {:?}",
            self.container_id, self.interval
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let inspection = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                inspection = self.client.inspect_container(&self.container_id) => inspection,
            };

            match inspection {
                Ok(inspection)
                    if inspection.runtime.as_deref() == Some(self.required_runtime.as_str()) => {}
                Ok(inspection) => {
                    let violation = SecurityViolation::runtime_drift(
                        self.container_id.as_str(),
                        inspection.runtime,
                        self.required_runtime.as_str(),
                    );
                    warn!("{}", violation);
                    return MonitorOutcome::Violation(violation);
                }
                Err(e) => {
                    warn!("Inspection of container {} failed: {}", self.container_id, e);
                    return MonitorOutcome::TransportError(e);
                }
            }
        }

        debug!("Monitor for container {} cancelled", self.container_id);
        MonitorOutcome::Cancelled
    }
}
