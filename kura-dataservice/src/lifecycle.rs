use std::sync::Arc;
use std::time::Duration;

use kura_core::status::DbErrorCode;
use kura_core::types;

use crate::control::{DataServiceControl, ProbeStatus};
use crate::hooks::Sleeper;
use crate::metric;

/// Last known state of a data service instance this node owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum DaemonLifecycleState {
    Down,
    Starting,
    Started,
}

impl DaemonLifecycleState {
    pub fn is_up(self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }
}

/// Starts, stops and probes a data service instance this node has control over.
#[derive(Clone)]
pub struct LifecycleController {
    control: Arc<Box<dyn DataServiceControl>>,
    sleeper: Arc<Box<dyn Sleeper>>,
    settle: Duration,
}

impl LifecycleController {
    pub fn new(
        control: Arc<Box<dyn DataServiceControl>>,
        sleeper: Arc<Box<dyn Sleeper>>,
        settle: Duration,
    ) -> Self {
        Self {
            control,
            sleeper,
            settle,
        }
    }

    /// Issues a start request. `Starting` means the request went out and the
    /// settle delay elapsed, not that the service accepts connections yet.
    pub async fn start(&self, host: &str, port: u16) -> DaemonLifecycleState {
        tracing::info!("starting data service on {}:{}", host, port);

        if let Err(e) = self.control.start(host, port).await {
            metric::data_service_start_failure_metric()
                .with_label_values(&[host, &e.code().to_string()])
                .inc();

            if e.code() != DbErrorCode::OomGuard {
                tracing::error!("failed to start data service, {}", e);
                return DaemonLifecycleState::Down;
            }

            tracing::warn!("data service started without OOM protection, {}", e);
        }

        // Give the service time to at least open its ports.
        self.sleeper.sleep(self.settle).await;

        DaemonLifecycleState::Starting
    }

    /// Best effort; a failure is logged and otherwise ignored.
    pub async fn stop(&self, host: &str, port: u16) {
        tracing::info!("stopping data service on {}:{}", host, port);

        if let Err(e) = self.control.stop(host, port).await {
            tracing::error!("failed to stop data service, {}", e);
        }
    }

    pub async fn probe(&self, host: &str, port: u16) -> types::Result<ProbeStatus> {
        self.control.status(host, port).await
    }
}
